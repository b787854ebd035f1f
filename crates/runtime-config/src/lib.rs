//! Shared monitor/CLI configuration types.
//!
//! Both the monitor library and the `infaq` CLI read `infaq.toml` through these
//! types. Every field carries a serde default so a missing or partial file is
//! always usable.

use infaq_core::SourceMode;
use serde::{Deserialize, Serialize};

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "infaq.toml";

pub const ENV_AUTH_URL: &str = "INFAQ_AUTH_URL";
pub const ENV_EDGE_URL: &str = "INFAQ_EDGE_URL";
pub const ENV_EDGE_KEY: &str = "INFAQ_EDGE_KEY";

/// Top-level configuration (persisted as `infaq.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MonitorConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub camera: CameraDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Account/auth service. Also serves the camera API unless `dual_base` is on.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Edge camera service, used when `capabilities.dual_base` is enabled.
    #[serde(default)]
    pub edge_url: String,
    /// Shared secret sent as `X-Edge-Key` to the edge service.
    #[serde(default)]
    pub edge_key: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            edge_url: String::new(),
            edge_key: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_snapshot_interval_ms")]
    pub snapshot_interval_ms: u64,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Snapshot endpoint path; empty means `/camera/snapshot`.
    #[serde(default)]
    pub snapshot_path: String,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            snapshot_interval_ms: default_snapshot_interval_ms(),
            history_capacity: default_history_capacity(),
            snapshot_path: String::new(),
        }
    }
}

/// Capability record selecting which variant of the controller is active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Capabilities {
    /// Require a held token before any operator action that talks to the server.
    #[serde(default = "default_true")]
    pub auth_required: bool,
    /// Route `/roi` and `/camera/*` to `server.edge_url`.
    #[serde(default = "default_false")]
    pub dual_base: bool,
    #[serde(default = "default_source_modes")]
    pub source_modes: Vec<SourceMode>,
    /// Whether `POST /camera/start` needs a bearer token. The service guards it
    /// in current deployments, so this defaults to true.
    #[serde(default = "default_true")]
    pub start_requires_auth: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            auth_required: true,
            dual_base: false,
            source_modes: default_source_modes(),
            start_requires_auth: true,
        }
    }
}

impl Capabilities {
    pub fn allows(&self, mode: SourceMode) -> bool {
        self.source_modes.contains(&mode)
    }
}

/// Source used by the CLI when no flags are given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDefaults {
    #[serde(default)]
    pub mode: SourceMode,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_true", rename = "loop")]
    pub looped: bool,
}

impl Default for CameraDefaults {
    fn default() -> Self {
        Self {
            mode: SourceMode::Webcam,
            index: 0,
            path: String::new(),
            looped: true,
        }
    }
}

impl CameraDefaults {
    /// Raw source reference for the configured mode.
    pub fn source_ref(&self) -> String {
        match self.mode {
            SourceMode::Webcam => self.index.to_string(),
            SourceMode::Video | SourceMode::Ipcam => self.path.clone(),
        }
    }
}

impl MonitorConfig {
    /// Base URL for `/auth/*`.
    pub fn auth_base(&self) -> &str {
        self.server.auth_url.trim_end_matches('/')
    }

    /// Base URL for `/roi` and `/camera/*`.
    pub fn edge_base(&self) -> &str {
        if self.capabilities.dual_base && !self.server.edge_url.trim().is_empty() {
            self.server.edge_url.trim_end_matches('/')
        } else {
            self.auth_base()
        }
    }

    /// Edge key to send, if one is configured.
    pub fn edge_key(&self) -> Option<&str> {
        Some(self.server.edge_key.trim()).filter(|k| !k.is_empty())
    }
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_auth_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_poll_interval_ms() -> u64 {
    1_500
}
fn default_snapshot_interval_ms() -> u64 {
    300
}
fn default_history_capacity() -> usize {
    infaq_core::HISTORY_CAPACITY
}
fn default_source_modes() -> Vec<SourceMode> {
    SourceMode::ALL.to_vec()
}

/// Apply environment overrides through `lookup` (normally `std::env::var`).
/// Returns true when any field was updated.
pub fn apply_env_overrides(
    config: &mut MonitorConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> bool {
    let mut changed = false;
    let mut set = |target: &mut String, key: &str| {
        if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
            *target = value.trim().to_string();
            changed = true;
        }
    };
    set(&mut config.server.auth_url, ENV_AUTH_URL);
    set(&mut config.server.edge_url, ENV_EDGE_URL);
    set(&mut config.server.edge_key, ENV_EDGE_KEY);
    if lookup(ENV_EDGE_URL).is_some_and(|v| !v.trim().is_empty()) {
        config.capabilities.dual_base = true;
    }
    changed
}

/// Parse `infaq.toml` content and repair unusable values.
pub fn parse_config(content: &str) -> Result<MonitorConfig, toml::de::Error> {
    let mut config: MonitorConfig = toml::from_str(content)?;
    apply_compat_fallbacks(&mut config);
    Ok(config)
}

/// Replace zero or empty values that would stall the monitor.
/// Returns true when any field was updated.
pub fn apply_compat_fallbacks(config: &mut MonitorConfig) -> bool {
    let mut changed = false;

    if config.monitor.poll_interval_ms == 0 {
        config.monitor.poll_interval_ms = default_poll_interval_ms();
        changed = true;
    }
    if config.monitor.snapshot_interval_ms == 0 {
        config.monitor.snapshot_interval_ms = default_snapshot_interval_ms();
        changed = true;
    }
    if config.monitor.history_capacity == 0 {
        config.monitor.history_capacity = default_history_capacity();
        changed = true;
    }
    if config.server.request_timeout_secs == 0 {
        config.server.request_timeout_secs = default_request_timeout();
        changed = true;
    }
    if config.capabilities.source_modes.is_empty() {
        config.capabilities.source_modes = default_source_modes();
        changed = true;
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_stable() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.monitor.poll_interval_ms, 1_500);
        assert_eq!(cfg.monitor.snapshot_interval_ms, 300);
        assert_eq!(cfg.monitor.history_capacity, 10);
        assert!(cfg.capabilities.auth_required);
        assert!(cfg.capabilities.start_requires_auth);
        assert!(!cfg.capabilities.dual_base);
        assert_eq!(cfg.capabilities.source_modes.len(), 3);
        assert_eq!(cfg.edge_key(), None);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: MonitorConfig = toml::from_str(
            r#"
[server]
auth_url = "https://akun.example.org/"

[capabilities]
source_modes = ["webcam", "ipcam"]
"#,
        )
        .expect("parse toml");
        assert_eq!(cfg.auth_base(), "https://akun.example.org");
        assert_eq!(cfg.edge_base(), "https://akun.example.org");
        assert!(cfg.capabilities.allows(SourceMode::Ipcam));
        assert!(!cfg.capabilities.allows(SourceMode::Video));
        assert_eq!(cfg.monitor.poll_interval_ms, 1_500);
        assert!(cfg.camera.looped);
    }

    #[test]
    fn dual_base_routes_camera_calls_to_edge() {
        let cfg: MonitorConfig = toml::from_str(
            r#"
[server]
auth_url = "https://akun.example.org"
edge_url = "https://edge.example.org/"
edge_key = " k3y "

[capabilities]
dual_base = true
"#,
        )
        .expect("parse toml");
        assert_eq!(cfg.edge_base(), "https://edge.example.org");
        assert_eq!(cfg.auth_base(), "https://akun.example.org");
        assert_eq!(cfg.edge_key(), Some("k3y"));
    }

    #[test]
    fn edge_url_without_dual_base_is_ignored() {
        let mut cfg = MonitorConfig::default();
        cfg.server.edge_url = "https://edge.example.org".into();
        assert_eq!(cfg.edge_base(), cfg.auth_base());
    }

    #[test]
    fn env_overrides_apply_and_enable_dual_base() {
        let mut cfg = MonitorConfig::default();
        let changed = apply_env_overrides(&mut cfg, |key| match key {
            ENV_EDGE_URL => Some("http://10.0.0.9:8000".to_string()),
            ENV_EDGE_KEY => Some("secret".to_string()),
            _ => None,
        });
        assert!(changed);
        assert!(cfg.capabilities.dual_base);
        assert_eq!(cfg.edge_base(), "http://10.0.0.9:8000");
        assert_eq!(cfg.edge_key(), Some("secret"));

        let mut untouched = MonitorConfig::default();
        assert!(!apply_env_overrides(&mut untouched, |_| Some("  ".to_string())));
    }

    #[test]
    fn compat_fallbacks_repair_zero_values() {
        let mut cfg: MonitorConfig = toml::from_str(
            r#"
[monitor]
poll_interval_ms = 0
history_capacity = 0

[capabilities]
source_modes = []
"#,
        )
        .expect("parse toml");
        assert!(apply_compat_fallbacks(&mut cfg));
        assert_eq!(cfg.monitor.poll_interval_ms, 1_500);
        assert_eq!(cfg.monitor.history_capacity, 10);
        assert_eq!(cfg.capabilities.source_modes.len(), 3);
        assert!(!apply_compat_fallbacks(&mut cfg));
    }

    #[test]
    fn parse_config_applies_fallbacks() {
        let cfg = parse_config("[monitor]\nsnapshot_interval_ms = 0\n").expect("parse");
        assert_eq!(cfg.monitor.snapshot_interval_ms, 300);
        assert!(parse_config("[monitor\n").is_err());
    }

    #[test]
    fn camera_defaults_round_trip() {
        let cfg: MonitorConfig = toml::from_str(
            r#"
[camera]
mode = "video"
path = "/srv/sample.mp4"
loop = false
"#,
        )
        .expect("parse toml");
        assert_eq!(cfg.camera.mode, SourceMode::Video);
        assert_eq!(cfg.camera.source_ref(), "/srv/sample.mp4");
        assert!(!cfg.camera.looped);

        let encoded = toml::to_string(&cfg).expect("serialize config");
        assert!(encoded.contains("loop = false"));
        assert!(encoded.contains("mode = \"video\""));
    }
}
