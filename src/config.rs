use crate::error::{KuraError, Result};
use crate::locking::LockTimeout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 0;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KuraConfig {
    #[serde(default)]
    pub locking: LockingConfig,

    #[serde(default)]
    pub trash: TrashConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockingConfig {
    /// When false, lock acquisition returns a no-op sentinel.
    #[serde(default = "default_locking_enabled")]
    pub enabled: bool,

    /// Seconds to wait for a contended lock; 0 waits indefinitely.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
        }
    }
}

impl LockingConfig {
    pub fn timeout(&self) -> LockTimeout {
        LockTimeout::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrashConfig {
    /// Keep quarantined files on disk for debugging instead of reclaiming them.
    #[serde(default)]
    pub preserve: bool,
}

fn default_locking_enabled() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_LOCK_TIMEOUT_SECS
}

impl KuraConfig {
    pub fn load(kura_home: &Path) -> Result<Self> {
        let config_path = kura_home.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            log::debug!("Config file not found at {config_path:?}, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)?;
        let config: KuraConfig = toml::from_str(&contents)
            .map_err(|e| KuraError::ConfigError(format!("Failed to parse config.toml: {e}")))?;

        log::debug!("Loaded config from {config_path:?}");
        Ok(config)
    }

    pub fn save(&self, kura_home: &Path) -> Result<()> {
        let config_path = kura_home.join(CONFIG_FILE_NAME);

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| KuraError::ConfigError(format!("Failed to serialize config: {e}")))?;

        fs::write(&config_path, contents)?;
        log::debug!("Saved config to {config_path:?}");
        Ok(())
    }
}

/// Resolves the kura home directory from `$KURA_HOME` or `~/.kura`.
pub fn kura_home() -> PathBuf {
    if let Some(home) = std::env::var_os("KURA_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .map(|home| home.join(".kura"))
        .unwrap_or_else(|| PathBuf::from(".kura"))
}
