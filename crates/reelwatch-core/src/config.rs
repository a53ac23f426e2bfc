use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::detector::DetectorTiming;
use crate::error::ReelwatchError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub detector: DetectorConfig,
    pub ingest: IngestConfig,
    pub bridge: BridgeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    pub dwell_seconds: u64,
    pub tick_seconds: u64,
}

impl DetectorConfig {
    pub fn timing(&self) -> DetectorTiming {
        DetectorTiming {
            dwell: Duration::from_secs(self.dwell_seconds),
            tick: Duration::from_secs(self.tick_seconds),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    pub endpoint: String,
    pub timeout_seconds: u64,
}

impl IngestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub request_timeout_seconds: u64,
}

impl BridgeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` takes precedence.
    pub filter: String,
}

impl AppConfig {
    /// Load the user config file from the platform config directory.
    pub fn load() -> Result<Self, ReelwatchError> {
        Self::load_from(&Self::config_path())
    }

    /// Load config: user file at `path` (if it exists) merged over built-in defaults.
    pub fn load_from(path: &Path) -> Result<Self, ReelwatchError> {
        let mut table: toml::Table =
            toml::from_str(DEFAULT_CONFIG).map_err(|e| ReelwatchError::Config(e.to_string()))?;

        if path.exists() {
            let user_str = std::fs::read_to_string(path)?;
            let user: toml::Table =
                toml::from_str(&user_str).map_err(|e| ReelwatchError::Config(e.to_string()))?;
            merge_tables(&mut table, user);
            tracing::debug!(path = %path.display(), "Loaded user config");
        }

        let config: AppConfig = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ReelwatchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ReelwatchError> {
        if self.detector.dwell_seconds == 0 || self.detector.tick_seconds == 0 {
            return Err(ReelwatchError::Config(
                "detector.dwell_seconds and detector.tick_seconds must be positive".into(),
            ));
        }
        if self.ingest.timeout_seconds == 0 {
            return Err(ReelwatchError::Config(
                "ingest.timeout_seconds must be positive".into(),
            ));
        }
        if self.bridge.request_timeout_seconds == 0 {
            return Err(ReelwatchError::Config(
                "bridge.request_timeout_seconds must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Path to the user site database merged over the embedded one.
    pub fn sites_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("sites.toml"))
            .unwrap_or_else(|| PathBuf::from("sites.toml"))
    }

    /// Directory for rolling log files.
    pub fn log_dir() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "reelwatch")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

/// Recursively overlay `overlay` onto `base`; nested tables merge key by key.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(child) = value {
            if let Some(toml::Value::Table(base_child)) = base.get_mut(&key) {
                merge_tables(base_child, child);
                continue;
            }
            base.insert(key, toml::Value::Table(child));
        } else {
            base.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = AppConfig::default();
        assert_eq!(config.detector.dwell_seconds, 300);
        assert_eq!(config.detector.tick_seconds, 5);
        assert_eq!(
            config.ingest.endpoint,
            "https://moviemonitor-server.vercel.app/submitmovie"
        );
        assert_eq!(config.bridge.request_timeout_seconds, 10);
        assert_eq!(config.logging.filter, "reelwatch=info");
    }

    #[test]
    fn test_timing_from_config() {
        let timing = AppConfig::default().detector.timing();
        assert_eq!(timing, DetectorTiming::default());
    }

    #[test]
    fn test_missing_user_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.detector.dwell_seconds, 300);
    }

    #[test]
    fn test_partial_user_file_merges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[detector]\ndwell_seconds = 60\n\n[ingest]\nendpoint = \"http://localhost:8080/submitmovie\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.detector.dwell_seconds, 60);
        assert_eq!(config.detector.tick_seconds, 5);
        assert_eq!(config.ingest.endpoint, "http://localhost:8080/submitmovie");
        assert_eq!(config.ingest.timeout_seconds, 15);
    }

    #[test]
    fn test_zero_tick_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[detector]\ntick_seconds = 0\n").unwrap();

        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ReelwatchError::Config(_))
        ));
    }

    #[test]
    fn test_zero_ingest_timeout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[ingest]\ntimeout_seconds = 0\n").unwrap();

        match AppConfig::load_from(&path) {
            Err(ReelwatchError::Config(message)) => {
                assert!(message.contains("ingest.timeout_seconds"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
