//! Maps output settings to `image` encoder calls.
//!
//! Each function takes a rasterized RGBA surface and returns the encoded bytes.

use std::io::Cursor;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};

use crate::utils::{ConvertError, OutputFormat};

type Result<T> = std::result::Result<T, ConvertError>;

/// Encodes `surface` as `format`, consulting `quality_factor` for lossy formats.
pub fn encode_surface(surface: &RgbaImage, format: OutputFormat, quality_factor: f32) -> Result<Vec<u8>> {
    let bytes = match format {
        OutputFormat::Jpeg => encode_jpeg(surface, quality_factor)?,
        OutputFormat::Png => encode_png(surface)?,
        OutputFormat::Webp => encode_webp(surface, quality_factor)?,
        OutputFormat::Bmp => encode_bmp(surface)?,
    };

    if bytes.is_empty() {
        return Err(ConvertError::encode(format!("{} encoder returned no data", format.label())));
    }
    Ok(bytes)
}

/// Saves as baseline JPEG.
///
/// JPEG has no alpha channel: transparent pixels are composited onto black
/// before encoding.
pub fn encode_jpeg(surface: &RgbaImage, quality_factor: f32) -> Result<Vec<u8>> {
    let quality = (quality_factor * 100.0).round().clamp(1.0, 100.0) as u8;
    let flat = flatten_on_black(surface);

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .write_image(flat.as_raw(), flat.width(), flat.height(), ExtendedColorType::Rgb8)
        .map_err(|e| ConvertError::encode(format!("JPEG save failed: {e}")))?;
    Ok(buf)
}

/// Saves as PNG with the encoder's default compression.
pub fn encode_png(surface: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(surface.as_raw(), surface.width(), surface.height(), ExtendedColorType::Rgba8)
        .map_err(|e| ConvertError::encode(format!("PNG save failed: {e}")))?;
    Ok(buf)
}

/// Saves as lossy WebP through libwebp, keeping the alpha channel.
pub fn encode_webp(surface: &RgbaImage, quality_factor: f32) -> Result<Vec<u8>> {
    let quality = (quality_factor * 100.0).clamp(1.0, 100.0);
    let encoded = webp::Encoder::from_rgba(surface.as_raw(), surface.width(), surface.height())
        .encode(quality);
    Ok(encoded.to_vec())
}

/// Saves as 32-bit BMP.
pub fn encode_bmp(surface: &RgbaImage) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    BmpEncoder::new(&mut cursor)
        .write_image(surface.as_raw(), surface.width(), surface.height(), ExtendedColorType::Rgba8)
        .map_err(|e| ConvertError::encode(format!("BMP save failed: {e}")))?;
    Ok(cursor.into_inner())
}

fn flatten_on_black(surface: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(surface.width(), surface.height(), |x, y| {
        let [r, g, b, a] = surface.get_pixel(x, y).0;
        let a = u16::from(a);
        let mul = |c: u8| ((u16::from(c) * a + 127) / 255) as u8;
        image::Rgb([mul(r), mul(g), mul(b)])
    })
}
