use std::path::Path;

use anyhow::{Context, Result, bail};
use infaq_runtime_config::{MonitorConfig, apply_env_overrides, parse_config};

pub use infaq_paths::{config_path, token_path};

/// Load `infaq.toml` (defaults when absent) and apply environment overrides.
pub fn load_config() -> Result<MonitorConfig> {
    let path = config_path()?;
    let mut config = load_config_from(&path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn load_config_from(path: &Path) -> Result<MonitorConfig> {
    if !path.exists() {
        return Ok(MonitorConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Failed to parse config at {}", path.display()))
}

fn read_config_doc(path: &Path) -> Result<toml::Value> {
    if !path.exists() {
        return Ok(toml::Value::Table(toml::map::Map::new()));
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config at {}", path.display()))
}

/// Parse a CLI value into the TOML type the key expects.
fn typed_value(section: &str, key: &str, raw: &str) -> Result<toml::Value> {
    let value = match (section, key) {
        ("server", "auth_url" | "edge_url" | "edge_key")
        | ("monitor", "snapshot_path")
        | ("camera", "mode" | "path") => {
            toml::Value::String(raw.to_string())
        }
        ("server", "request_timeout_secs")
        | ("monitor", "poll_interval_ms" | "snapshot_interval_ms" | "history_capacity")
        | ("camera", "index") => toml::Value::Integer(
            raw.parse()
                .with_context(|| format!("{section}.{key} expects a number, got {raw:?}"))?,
        ),
        ("capabilities", "auth_required" | "dual_base" | "start_requires_auth")
        | ("camera", "loop") => toml::Value::Boolean(
            raw.parse()
                .with_context(|| format!("{section}.{key} expects true or false, got {raw:?}"))?,
        ),
        ("capabilities", "source_modes") => toml::Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(|m| toml::Value::String(m.to_ascii_lowercase()))
                .collect(),
        ),
        _ => bail!("Unknown config key: {section}.{key}"),
    };
    Ok(value)
}

/// Set `section.key = value` in the file at `path`, keeping unrelated keys.
pub fn set_value_at(path: &Path, dotted_key: &str, raw: &str) -> Result<MonitorConfig> {
    let (section, key) = dotted_key
        .split_once('.')
        .with_context(|| format!("Expected <section>.<key>, got {dotted_key:?}"))?;
    let value = typed_value(section, key, raw)?;

    let mut doc = read_config_doc(path)?;
    let Some(root) = doc.as_table_mut() else {
        bail!("Config root at {} is not a table", path.display());
    };
    let entry = root
        .entry(section.to_string())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    let Some(table) = entry.as_table_mut() else {
        bail!("[{section}] in {} is not a table", path.display());
    };
    table.insert(key.to_string(), value);

    let content = toml::to_string_pretty(&doc).context("Failed to serialize config")?;
    // Reject edits that would leave an unreadable file behind.
    let config = parse_config(&content).context("Value is not valid for this key")?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config dir at {}", dir.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config at {}", path.display()))?;
    Ok(config)
}

/// Print the effective config.
pub fn show_config() -> Result<()> {
    let config = load_config()?;
    let path = config_path()?;
    println!("Config file: {}", path.display());
    println!();
    println!("[server]");
    println!("  auth_url = {}", config.auth_base());
    println!("  edge_url = {}", config.edge_base());
    println!(
        "  edge_key = {}",
        match config.edge_key() {
            Some(key) => format!("{}...", key.chars().take(4).collect::<String>()),
            None => "(not set)".to_string(),
        }
    );
    println!("  request_timeout_secs = {}", config.server.request_timeout_secs);
    println!();
    println!("[monitor]");
    println!("  poll_interval_ms = {}", config.monitor.poll_interval_ms);
    println!("  snapshot_interval_ms = {}", config.monitor.snapshot_interval_ms);
    println!("  history_capacity = {}", config.monitor.history_capacity);
    if !config.monitor.snapshot_path.is_empty() {
        println!("  snapshot_path = {}", config.monitor.snapshot_path);
    }
    println!();
    println!("[capabilities]");
    println!("  auth_required = {}", config.capabilities.auth_required);
    println!("  dual_base = {}", config.capabilities.dual_base);
    println!("  start_requires_auth = {}", config.capabilities.start_requires_auth);
    let modes: Vec<&str> = config
        .capabilities
        .source_modes
        .iter()
        .map(|m| m.as_str())
        .collect();
    println!("  source_modes = {}", modes.join(", "));
    println!();
    println!("[camera]");
    println!("  mode = {}", config.camera.mode);
    println!("  source = {}", config.camera.source_ref());
    println!("  loop = {}", config.camera.looped);
    Ok(())
}

pub fn set_config(key: &str, value: &str) -> Result<()> {
    let path = config_path()?;
    set_value_at(&path, key, value)?;
    println!("Configuration updated: {key} = {value}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use infaq_core::SourceMode;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("infaq.toml")).unwrap();
        assert_eq!(config.monitor.poll_interval_ms, 1_500);
    }

    #[test]
    fn set_value_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("infaq.toml");
        std::fs::write(&path, "[server]\nauth_url = \"http://akun:8000\"\n").unwrap();

        set_value_at(&path, "server.edge_url", "http://edge:8000").unwrap();
        set_value_at(&path, "capabilities.dual_base", "true").unwrap();
        let config = set_value_at(&path, "capabilities.source_modes", "webcam, IPCAM").unwrap();

        assert_eq!(config.auth_base(), "http://akun:8000");
        assert_eq!(config.edge_base(), "http://edge:8000");
        assert_eq!(
            config.capabilities.source_modes,
            vec![SourceMode::Webcam, SourceMode::Ipcam]
        );
        assert_eq!(load_config_from(&path).unwrap().edge_base(), "http://edge:8000");
    }

    #[test]
    fn bad_values_leave_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("infaq.toml");
        assert!(set_value_at(&path, "monitor.poll_interval_ms", "soon").is_err());
        assert!(set_value_at(&path, "camera.mode", "drone").is_err());
        assert!(set_value_at(&path, "server.nope", "x").is_err());
        assert!(set_value_at(&path, "nodot", "x").is_err());
        assert!(!path.exists());
    }
}
