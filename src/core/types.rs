//! Core types for conversion settings and render views.

use serde::{Deserialize, Serialize};
use crate::utils::{OutputFormat, PixelshiftError, PixelshiftResult};

pub const DEFAULT_QUALITY: u8 = 85;

/// Process-wide output settings chosen by the user.
///
/// `quality` only affects lossy formats but is tracked for every item so that
/// a quality change re-queues converted items. Quality is always within 1-100:
/// construction and deserialization both go through [`validate_quality`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawSettings")]
pub struct ConversionSettings {
    output_format: OutputFormat,
    quality: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSettings {
    output_format: OutputFormat,
    quality: u8,
}

impl TryFrom<RawSettings> for ConversionSettings {
    type Error = PixelshiftError;

    fn try_from(raw: RawSettings) -> PixelshiftResult<Self> {
        Self::new(raw.output_format, raw.quality)
    }
}

impl ConversionSettings {
    /// Creates settings after checking the quality range.
    pub fn new(output_format: OutputFormat, quality: u8) -> PixelshiftResult<Self> {
        validate_quality(quality)?;
        Ok(Self { output_format, quality })
    }

    /// Target encoding for the next conversion
    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Same quality, different format. Always valid.
    pub fn with_format(self, output_format: OutputFormat) -> Self {
        Self { output_format, ..self }
    }

    /// True when an output produced with `format`/`quality` satisfies these settings
    pub fn matches(&self, format: OutputFormat, quality: u8) -> bool {
        self.output_format == format && self.quality == quality
    }
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Jpeg,
            quality: DEFAULT_QUALITY,
        }
    }
}

pub fn validate_quality(quality: u8) -> PixelshiftResult<()> {
    if quality == 0 || quality > 100 {
        return Err(PixelshiftError::validation(format!(
            "Invalid quality value: {}. Must be between 1 and 100",
            quality
        )));
    }
    Ok(())
}

/// Status tag exposed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTag {
    Pending,
    Converting,
    Converted,
    Error,
}

/// Read-only snapshot of one queued image, for rendering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub id: String,
    pub name: String,
    pub source_format: String,
    pub source_size: u64,
    pub preview: String,
    pub result_format: OutputFormat,
    pub result_size: Option<u64>,
    pub quality: u8,
    pub status: StatusTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
