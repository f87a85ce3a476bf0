use crate::error::{Result, RollingError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level ndbroll configuration stored as TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingConfig {
    #[serde(default)]
    pub ndbroll: RollingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingSettings {
    /// Management endpoint, e.g. `sim:/etc/ndbroll/cluster.toml`.
    #[serde(default)]
    pub connect_string: String,
    /// Poll interval, readiness timeout and reconnect backoff, in seconds.
    #[serde(default = "default_wait_seconds")]
    pub wait_seconds: u64,
    /// Wait for each node to rejoin before restarting the next one.
    /// Skipping this is faster but can take down a whole group.
    #[serde(default = "default_wait_after_restart")]
    pub wait_after_restart: bool,
    /// Attempts the connector makes per session setup.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    /// Consecutive reconnect attempts before giving up. Unset retries forever.
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,
    /// Log at debug level.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for RollingSettings {
    fn default() -> Self {
        Self {
            connect_string: String::new(),
            wait_seconds: default_wait_seconds(),
            wait_after_restart: default_wait_after_restart(),
            connect_retries: default_connect_retries(),
            max_reconnect_attempts: None,
            verbose: false,
        }
    }
}

fn default_wait_seconds() -> u64 {
    30
}

fn default_wait_after_restart() -> bool {
    true
}

fn default_connect_retries() -> u32 {
    10
}

impl RollingSettings {
    pub fn wait_interval(&self) -> Duration {
        Duration::from_secs(self.wait_seconds)
    }
}

impl RollingConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RollingError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| RollingError::TomlDe(e.to_string()))
    }

    /// Load config if the file exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(RollingError::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| RollingError::TomlSer(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the config file path: `<base_dir>/ndbroll.toml`
    pub fn default_path(base_dir: &Path) -> PathBuf {
        base_dir.join("ndbroll.toml")
    }

    /// Resolve the default ndbroll home directory: `~/.ndbroll`
    pub fn default_base_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|h| h.join(".ndbroll"))
            .ok_or_else(|| RollingError::Config("Cannot determine home directory".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn roundtrip_config() {
        let tmp = TempDir::new().unwrap();
        let path = RollingConfig::default_path(tmp.path());
        let mut config = RollingConfig::default();
        config.ndbroll.connect_string = "sim:cluster.toml".into();
        config.ndbroll.max_reconnect_attempts = Some(4);
        config.save(&path).unwrap();
        let loaded = RollingConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn defaults() {
        let settings = RollingSettings::default();
        assert_eq!(settings.wait_seconds, 30);
        assert!(settings.wait_after_restart);
        assert_eq!(settings.connect_retries, 10);
        assert!(settings.max_reconnect_attempts.is_none());
        assert_eq!(settings.wait_interval(), Duration::from_secs(30));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ndbroll.toml");
        std::fs::write(&path, "[ndbroll]\nwait_seconds = 5\n").unwrap();
        let loaded = RollingConfig::load(&path).unwrap();
        assert_eq!(loaded.ndbroll.wait_seconds, 5);
        assert!(loaded.ndbroll.wait_after_restart);
        assert!(loaded.ndbroll.connect_string.is_empty());
    }

    #[test]
    fn load_nonexistent_returns_error() {
        let result = RollingConfig::load(Path::new("/nonexistent/ndbroll.toml"));
        assert!(matches!(result, Err(RollingError::ConfigNotFound(_))));
    }

    #[test]
    fn load_or_default_without_file() {
        let loaded =
            RollingConfig::load_or_default(Path::new("/nonexistent/ndbroll.toml")).unwrap();
        assert_eq!(loaded, RollingConfig::default());
    }

    #[test]
    fn malformed_file_is_toml_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ndbroll.toml");
        std::fs::write(&path, "[ndbroll\nwait_seconds = ").unwrap();
        assert!(matches!(
            RollingConfig::load(&path),
            Err(RollingError::TomlDe(_))
        ));
    }
}
