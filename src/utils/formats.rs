use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::utils::PixelshiftError;

/// Output encodings the converter can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    Webp,
    Bmp,
}

impl OutputFormat {
    /// Every supported format, in menu order.
    pub const ALL: [OutputFormat; 4] = [Self::Jpeg, Self::Png, Self::Webp, Self::Bmp];

    /// Short tag used in file extensions and history records
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Webp => "WebP",
            Self::Bmp => "BMP",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
        }
    }

    /// Whether the quality setting has any effect on this format
    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Webp)
    }

    /// Scales a 1-100 quality to the encoder's 0.0-1.0 factor.
    ///
    /// Lossless formats always encode at full quality.
    pub fn quality_factor(&self, quality: u8) -> f32 {
        if self.is_lossy() {
            f32::from(quality.clamp(1, 100)) / 100.0
        } else {
            1.0
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for OutputFormat {
    type Err = PixelshiftError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let tag = tag.trim().to_lowercase();
        let tag = tag.strip_prefix("image/").unwrap_or(&tag);
        match tag {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            "bmp" => Ok(Self::Bmp),
            _ => Err(PixelshiftError::validation(format!(
                "Unsupported image format: {}", tag
            ))),
        }
    }
}

/// Media types accepted as conversion sources.
pub const SUPPORTED_SOURCE_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/bmp",
];

/// Derives the short format tag from a declared media type (`image/png` -> `png`).
pub fn source_format_tag(media_type: &str) -> String {
    media_type
        .trim()
        .strip_prefix("image/")
        .unwrap_or(media_type)
        .to_lowercase()
}

/// Guesses a media type from a file extension, `application/octet-stream` when unknown.
pub fn media_type_from_extension(path: &str) -> &'static str {
    let ext = std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("gif") => "image/gif",
        Some("avif") => "image/avif",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Renders a byte count the way the history panel shows it (`1.5 KB`).
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    // Two decimals at most, trailing zeros dropped
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tags_and_media_types() {
        assert_eq!("jpg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("JPEG".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("image/webp".parse::<OutputFormat>().unwrap(), OutputFormat::Webp);
        assert!("gif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn quality_factor_only_scales_lossy_formats() {
        assert_eq!(OutputFormat::Jpeg.quality_factor(85), 0.85);
        assert_eq!(OutputFormat::Webp.quality_factor(50), 0.5);
        assert_eq!(OutputFormat::Png.quality_factor(10), 1.0);
        assert_eq!(OutputFormat::Bmp.quality_factor(1), 1.0);
    }

    #[test]
    fn serde_accepts_jpg_alias() {
        let f: OutputFormat = serde_json::from_str("\"jpg\"").unwrap();
        assert_eq!(f, OutputFormat::Jpeg);
        assert_eq!(serde_json::to_string(&f).unwrap(), "\"jpeg\"");
    }

    #[test]
    fn source_tags_and_extensions() {
        assert_eq!(source_format_tag("image/png"), "png");
        assert_eq!(source_format_tag("image/JPEG"), "jpeg");
        assert_eq!(media_type_from_extension("a/b/photo.JPG"), "image/jpeg");
        assert_eq!(media_type_from_extension("notes.txt"), "application/octet-stream");
    }

    #[test]
    fn file_sizes_are_human_readable() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10 MB");
    }
}
