//! TOML-based configuration for the setup tool.
//!
//! Reads `AppConfig` from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\UpbSetup\config.toml`
//! - Linux:    `~/.config/upbsetup/config.toml`
//! - macOS:    `~/Library/Application Support/UpbSetup/config.toml`
//!
//! Example:
//!
//! ```toml
//! [setup]
//! validate_timeout_secs = 15
//! log_level = "info"
//!
//! [storage]
//! registry_file = "/var/lib/upb/registrations.toml"
//! ```
//!
//! Every field has a serde default, so a missing file, a missing section, or
//! a missing key all fall back to the built-in values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::validate_connection::VALIDATE_TIMEOUT;

/// File name of the registration store when `[storage] registry_file` is unset.
pub const DEFAULT_REGISTRY_FILE: &str = "registrations.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub setup: SetupConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Behaviour of the setup flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetupConfig {
    /// How long one connection attempt may take.
    #[serde(default = "default_validate_timeout_secs")]
    pub validate_timeout_secs: u64,
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Where registrations are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Registration store path.  Relative paths and the default are resolved
    /// against the directory of the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_file: Option<PathBuf>,
}

fn default_validate_timeout_secs() -> u64 {
    VALIDATE_TIMEOUT.as_secs()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            validate_timeout_secs: default_validate_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Deadline for one validation attempt.
    pub fn validate_timeout(&self) -> Duration {
        Duration::from_secs(self.setup.validate_timeout_secs)
    }

    /// Resolves the registration store path for a config loaded from
    /// `config_path`.
    pub fn registry_path(&self, config_path: &Path) -> PathBuf {
        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        match &self.storage.registry_file {
            Some(file) if file.is_absolute() => file.clone(),
            Some(file) => base.join(file),
            None => base.join(DEFAULT_REGISTRY_FILE),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Resolves the platform config directory for this tool.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("UpbSetup"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("upbsetup"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("UpbSetup")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_default_timeout_is_fifteen_seconds() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.setup.validate_timeout_secs, 15);
        assert_eq!(cfg.validate_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_default_log_level_is_info() {
        assert_eq!(SetupConfig::default().log_level, "info");
    }

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_deserialize_partial_setup_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[setup]
validate_timeout_secs = 30
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.validate_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.setup.log_level, "info");
        assert_eq!(cfg.storage.registry_file, None);
    }

    #[test]
    fn test_load_config_from_malformed_file_returns_parse_error() {
        let dir = std::env::temp_dir().join(format!("upb_config_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_registry_path_defaults_beside_config_file() {
        let cfg = AppConfig::default();
        let path = cfg.registry_path(Path::new("/etc/upbsetup/config.toml"));
        assert_eq!(path, PathBuf::from("/etc/upbsetup/registrations.toml"));
    }

    #[test]
    fn test_registry_path_resolves_relative_and_keeps_absolute() {
        let mut cfg = AppConfig::default();
        cfg.storage.registry_file = Some(PathBuf::from("data/pims.toml"));
        assert_eq!(
            cfg.registry_path(Path::new("/etc/upbsetup/config.toml")),
            PathBuf::from("/etc/upbsetup/data/pims.toml")
        );

        cfg.storage.registry_file = Some(PathBuf::from("/var/lib/upb/pims.toml"));
        assert_eq!(
            cfg.registry_path(Path::new("/etc/upbsetup/config.toml")),
            PathBuf::from("/var/lib/upb/pims.toml")
        );
    }

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");
        assert_eq!(load_config_from(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_load_config_from_temp_dir() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("upb_config_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            "[setup]\nvalidate_timeout_secs = 5\nlog_level = \"debug\"\n",
        )
        .unwrap();

        // Act
        let loaded = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(loaded.validate_timeout(), Duration::from_secs(5));
        assert_eq!(loaded.setup.log_level, "debug");

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(
                path.ends_with("config.toml"),
                "config file must be named config.toml, got {path:?}"
            );
        }
    }
}
