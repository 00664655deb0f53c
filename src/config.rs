//! Application configuration.
//!
//! Loaded from an optional JSON file; every field has a default so partial
//! files are fine. Command-line flags override individual fields afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{validate_quality, ConversionSettings, DEFAULT_QUALITY};
use crate::utils::{OutputFormat, PixelshiftError, PixelshiftResult};

pub const APP_DIR: &str = "pixelshift";

/// 10 MiB, the upload limit of the web converter.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub default_format: OutputFormat,
    pub default_quality: u8,
    /// Largest accepted source file in bytes
    pub max_file_size: u64,
    /// JSON file backing the history store
    pub history_path: PathBuf,
    /// Where downloads are written
    pub output_dir: PathBuf,
    pub price_per_image_cents: u64,
    /// Simulated checkout duration
    pub checkout_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_format: OutputFormat::Jpeg,
            default_quality: DEFAULT_QUALITY,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            history_path: default_history_path(),
            output_dir: PathBuf::from("."),
            price_per_image_cents: 100,
            checkout_delay_ms: 2000,
        }
    }
}

fn default_history_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("store.json")
}

/// `<config dir>/pixelshift/config.json`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.json"))
}

impl Config {
    /// Loads the configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// tried and silently skipped when absent.
    pub fn load(path: Option<&Path>) -> PixelshiftResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> PixelshiftResult<Self> {
        let raw = std::fs::read(path).map_err(|e| {
            PixelshiftError::config(format!("Cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_slice(&raw).map_err(|e| {
            PixelshiftError::config(format!("Invalid config {}: {e}", path.display()))
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> PixelshiftResult<()> {
        validate_quality(self.default_quality)
            .map_err(|e| PixelshiftError::config(format!("defaultQuality: {e}")))?;
        if self.max_file_size == 0 {
            return Err(PixelshiftError::config("maxFileSize cannot be 0"));
        }
        Ok(())
    }

    /// Initial output settings for a new session.
    pub fn settings(&self) -> PixelshiftResult<ConversionSettings> {
        ConversionSettings::new(self.default_format, self.default_quality)
    }
}
