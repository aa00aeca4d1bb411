//! Dashboard settings.
//!
//! Defaults reproduce the stock dashboard: `predictions_solv.csv` and
//! `shapsummaryplot.png` next to the working directory, comma separated, a 50%
//! starting threshold and 40 histogram bins. A TOML file can override any of them,
//! and command-line flags override the file.

use crate::decision::Threshold;
use crate::histogram::DEFAULT_BINS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("The separator must be a single ASCII character, got {0:?}.")]
    InvalidSeparator(String),
    #[error("The default threshold must lie between 0 and 100 percent, got {0}.")]
    InvalidThreshold(f64),
    #[error("The histogram needs at least one bin.")]
    NoHistogramBins,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    pub data_path: PathBuf,
    pub image_path: PathBuf,
    pub separator: String,
    pub default_threshold: f64,
    pub histogram_bins: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("predictions_solv.csv"),
            image_path: PathBuf::from("shapsummaryplot.png"),
            separator: ",".to_string(),
            default_threshold: Threshold::DEFAULT_PERCENT,
            histogram_bins: DEFAULT_BINS,
        }
    }
}

impl DashboardConfig {
    /// Loads settings from a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        config.validate()?;
        log::debug!("Configuration loaded from '{}'", path.display());
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.separator_byte()?;
        self.threshold()?;
        if self.histogram_bins == 0 {
            return Err(ConfigError::NoHistogramBins);
        }
        Ok(())
    }

    /// The separator as the single byte the CSV reader expects.
    pub fn separator_byte(&self) -> Result<u8, ConfigError> {
        match self.separator.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ if self.separator == "\\t" => Ok(b'\t'),
            _ => Err(ConfigError::InvalidSeparator(self.separator.clone())),
        }
    }

    pub fn threshold(&self) -> Result<Threshold, ConfigError> {
        Threshold::from_percent(self.default_threshold)
            .map_err(|_| ConfigError::InvalidThreshold(self.default_threshold))
    }
}
