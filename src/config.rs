//! On-disk configuration
//!
//! Stored as TOML at `~/.config/sense_hat/sensehat.toml`. Every field has a
//! default, so a missing file or a partial one still yields a usable config.

use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::imu::retry::{RetryPolicy, DEFAULT_ATTEMPTS};
use crate::imu::settings::{self, GLOBAL_SETTINGS, LOCAL_SETTINGS};
use crate::stick::locator::{
    DeviceLocator, DEFAULT_DEVICE_DIR, DEFAULT_REGISTRY_DIR, SENSE_STICK_NAME,
};
use crate::stick::session::SessionOptions;

const CONFIG_FILE: &str = ".config/sense_hat/sensehat.toml";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct SenseConfig {
    pub stick: StickConfig,
    pub imu: ImuConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct StickConfig {
    /// Name the joystick registers under in the input registry
    pub device_name: String,
    pub registry_dir: PathBuf,
    pub device_dir: PathBuf,
    /// Grab the joystick so other readers (e.g. the console) don't see it
    pub exclusive: bool,
    pub open_delay_ms: u64,
}

impl Default for StickConfig {
    fn default() -> Self {
        Self {
            device_name: SENSE_STICK_NAME.to_string(),
            registry_dir: PathBuf::from(DEFAULT_REGISTRY_DIR),
            device_dir: PathBuf::from(DEFAULT_DEVICE_DIR),
            exclusive: true,
            open_delay_ms: 75,
        }
    }
}

impl StickConfig {
    pub fn locator(&self) -> DeviceLocator {
        DeviceLocator::new(&self.registry_dir, &self.device_dir)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            exclusive: self.exclusive,
            open_delay: Duration::from_millis(self.open_delay_ms),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ImuConfig {
    /// System-wide RTIMULib settings, without `.ini`
    pub global_settings: PathBuf,
    /// Per-user copy, relative to the home directory
    pub local_settings: PathBuf,
    pub retry_attempts: u32,
    /// Pause between read attempts; unset uses the driver's poll interval
    pub retry_interval_ms: Option<u64>,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            global_settings: PathBuf::from(GLOBAL_SETTINGS),
            local_settings: PathBuf::from(LOCAL_SETTINGS),
            retry_attempts: DEFAULT_ATTEMPTS,
            retry_interval_ms: None,
        }
    }
}

impl ImuConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            self.retry_interval_ms.map(Duration::from_millis),
        )
    }
}

impl SenseConfig {
    /// `~/.config/sense_hat/sensehat.toml`
    pub fn default_path() -> PathBuf {
        settings::home_dir().join(CONFIG_FILE)
    }

    /// Loads `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

        debug!("Loaded config: {:?}", config);
        Ok(config)
    }

    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_path())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize config: {}", e))?;
        fs::write(path, content).map_err(|e| eyre!("Failed to write config file: {}", e))?;

        info!("Saved config to {}", path.display());
        Ok(())
    }
}
