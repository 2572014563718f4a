//! Configuration file support for the APS controller.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/aps/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub profile: Profile,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Patient dosing profile, fixed per engine instance.
///
/// ISF/DIA/targets are configuration inputs here, never computed. The
/// per-treatment `duration` field is the canonical action window; `dia_hours`
/// only supplies the default duration for treatments logged without one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Profile {
    /// Insulin Sensitivity Factor, mg/dL drop per unit
    #[serde(default = "default_isf")]
    pub isf: f64,

    /// Duration of Insulin Action, hours
    #[serde(default = "default_dia_hours")]
    pub dia_hours: f64,

    /// Target glucose, mg/dL
    #[serde(default = "default_target_bg")]
    pub target_bg: f64,

    /// Hypoglycemia threshold, mg/dL (must sit below target)
    #[serde(default = "default_threshold_bg")]
    pub threshold_bg: f64,

    /// Baseline basal delivery rate, units/hour
    #[serde(default = "default_baseline_basal")]
    pub baseline_basal: f64,

    /// Maximum safe basal rate, units/hour
    #[serde(default = "default_max_basal")]
    pub max_basal: f64,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            isf: default_isf(),
            dia_hours: default_dia_hours(),
            target_bg: default_target_bg(),
            threshold_bg: default_threshold_bg(),
            baseline_basal: default_baseline_basal(),
            max_basal: default_max_basal(),
        }
    }
}

impl Profile {
    /// Validate the profile at engine construction time.
    ///
    /// A malformed profile must never produce a dosing decision, so this is
    /// a hard error rather than a per-call fallback.
    pub fn validate(&self) -> Result<()> {
        if !(self.isf > 0.0) {
            return Err(Error::Config(format!(
                "ISF must be strictly positive, got {}",
                self.isf
            )));
        }
        if !(self.dia_hours > 0.0) {
            return Err(Error::Config(format!(
                "DIA must be strictly positive, got {} hours",
                self.dia_hours
            )));
        }
        if !(self.threshold_bg < self.target_bg) {
            return Err(Error::Config(format!(
                "threshold BG ({}) must be below target BG ({})",
                self.threshold_bg, self.target_bg
            )));
        }
        if !(self.baseline_basal >= 0.0) {
            return Err(Error::Config(format!(
                "baseline basal must be non-negative, got {}",
                self.baseline_basal
            )));
        }
        if !(self.max_basal >= self.baseline_basal) {
            return Err(Error::Config(format!(
                "max basal ({}) must be at or above baseline basal ({})",
                self.max_basal, self.baseline_basal
            )));
        }
        Ok(())
    }

    /// Default action window for a treatment logged without a duration, minutes
    pub fn default_duration_minutes(&self) -> i64 {
        (self.dia_hours * 60.0).round() as i64
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME")
            .expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("aps")
}

fn default_isf() -> f64 {
    50.0
}

fn default_dia_hours() -> f64 {
    3.0
}

fn default_target_bg() -> f64 {
    110.0
}

fn default_threshold_bg() -> f64 {
    70.0
}

fn default_baseline_basal() -> f64 {
    1.0
}

fn default_max_basal() -> f64 {
    4.0
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME")
                .expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("aps").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
