//! Format conversion: decode, rasterize at native size, encode.
//!
//! The CPU work runs inside `tokio::task::spawn_blocking` so the async
//! runtime is never blocked while an image is being encoded.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use image::{ImageFormat, ImageReader, RgbaImage};
use tracing::debug;

use crate::utils::{ConvertError, OutputFormat};

use super::encode::encode_surface;

/// Encoded result of one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// Declared media type, always matching the requested format
    pub fn media_type(&self) -> &'static str {
        self.format.media_type()
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[async_trait]
pub trait FormatConverter: Send + Sync {
    /// Converts `source` into `format`. `quality` (1-100) only matters for lossy formats.
    async fn convert(
        &self,
        source: Arc<[u8]>,
        source_media_type: &str,
        format: OutputFormat,
        quality: u8,
    ) -> Result<EncodedImage, ConvertError>;
}

/// Converter backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterConverter;

impl RasterConverter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FormatConverter for RasterConverter {
    async fn convert(
        &self,
        source: Arc<[u8]>,
        source_media_type: &str,
        format: OutputFormat,
        quality: u8,
    ) -> Result<EncodedImage, ConvertError> {
        let media_type = source_media_type.to_string();
        tokio::task::spawn_blocking(move || convert_blocking(&source, &media_type, format, quality))
            .await
            .map_err(|e| ConvertError::Task(format!("Task panicked: {e}")))?
    }
}

/// Converts one image synchronously.
pub fn convert_blocking(
    source: &[u8],
    source_media_type: &str,
    format: OutputFormat,
    quality: u8,
) -> Result<EncodedImage, ConvertError> {
    let surface = rasterize(source, source_media_type)?;
    let (width, height) = surface.dimensions();

    let bytes = encode_surface(&surface, format, format.quality_factor(quality))?;
    debug!(
        "Encoded {}x{} surface as {} ({} bytes, quality {})",
        width,
        height,
        format.media_type(),
        bytes.len(),
        quality
    );

    Ok(EncodedImage {
        bytes,
        format,
        width,
        height,
    })
}

/// Decodes `source` into an RGBA surface of its native dimensions.
///
/// The content sniffing result wins over the declared media type; the latter
/// is only used when the bytes carry no recognizable signature.
pub fn rasterize(source: &[u8], source_media_type: &str) -> Result<RgbaImage, ConvertError> {
    let decoded = {
        let mut reader = ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| ConvertError::decode(format!("Failed to load image: {e}")))?;

        if reader.format().is_none() {
            let declared = ImageFormat::from_mime_type(source_media_type).ok_or_else(|| {
                ConvertError::decode(format!("Unrecognized image data ({source_media_type})"))
            })?;
            reader.set_format(declared);
        }

        reader
            .decode()
            .map_err(|e| ConvertError::decode(format!("Failed to load image: {e}")))?
    };

    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(ConvertError::decode("Image has no pixels"));
    }

    Ok(decoded.to_rgba8())
}

/// Reads only the header to report pixel dimensions.
pub fn probe_dimensions(source: &[u8]) -> Result<(u32, u32), ConvertError> {
    ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(|e| ConvertError::decode(format!("Failed to get image dimensions: {e}")))?
        .into_dimensions()
        .map_err(|e| ConvertError::decode(format!("Failed to get image dimensions: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 200, 30, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn converts_png_to_each_format_at_native_size() {
        let source: Arc<[u8]> = Arc::from(png_bytes(5, 7));
        for format in OutputFormat::ALL {
            let out = RasterConverter::new()
                .convert(source.clone(), "image/png", format, 85)
                .await
                .unwrap();
            assert_eq!(out.format, format);
            assert_eq!(out.media_type(), format.media_type());
            assert_eq!((out.width, out.height), (5, 7));
            assert_eq!(probe_dimensions(&out.bytes).unwrap(), (5, 7));
        }
    }

    #[tokio::test]
    async fn corrupt_input_is_a_decode_error() {
        let garbage: Arc<[u8]> = Arc::from(b"definitely not an image".to_vec());
        let err = RasterConverter::new()
            .convert(garbage, "image/png", OutputFormat::Jpeg, 85)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Decode(_)));
    }

    #[test]
    fn truncated_png_is_a_decode_error() {
        let mut bytes = png_bytes(8, 8);
        bytes.truncate(bytes.len() / 2);
        assert!(matches!(
            convert_blocking(&bytes, "image/png", OutputFormat::Bmp, 85),
            Err(ConvertError::Decode(_))
        ));
    }

    #[test]
    fn unknown_media_type_without_signature_fails() {
        assert!(matches!(
            rasterize(b"????", "application/octet-stream"),
            Err(ConvertError::Decode(_))
        ));
    }
}
