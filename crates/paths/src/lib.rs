//! Where the monitor keeps its config file and persisted bearer token.

use std::path::PathBuf;

use directories::ProjectDirs;
use infaq_runtime_config::CONFIG_FILE_NAME;

/// Overrides the platform config directory (tests, containers).
pub const ENV_CONFIG_DIR: &str = "INFAQ_CONFIG_DIR";

pub const TOKEN_FILE_NAME: &str = "token";

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("could not determine a config directory; set {ENV_CONFIG_DIR}")]
    NoConfigDir,
}

/// Config directory: `$INFAQ_CONFIG_DIR`, else the platform project dir.
pub fn config_dir() -> Result<PathBuf, PathError> {
    if let Some(dir) = std::env::var_os(ENV_CONFIG_DIR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    ProjectDirs::from("org", "kotak-infaq", "infaq")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(PathError::NoConfigDir)
}

pub fn config_path() -> Result<PathBuf, PathError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

pub fn token_path() -> Result<PathBuf, PathError> {
    Ok(config_dir()?.join(TOKEN_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_in_the_config_dir() {
        let dir = config_dir().expect("config dir");
        assert_eq!(config_path().unwrap(), dir.join("infaq.toml"));
        assert_eq!(token_path().unwrap(), dir.join("token"));
    }
}
