//! Image decoding.
//!
//! Accepts raw upload bytes (PNG, JPEG, BMP, WebP) and produces an RGBA
//! raster. Opaque formats gain a fully opaque alpha channel so every
//! later stage can treat transparency uniformly.

use std::io::Cursor;

use crate::types::{Dimensions, PipelineError, RgbaImage};

/// Decode raw image bytes into RGBA.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Read the image header and return its size without decoding pixels.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the header is unreadable.
pub fn probe_dimensions(bytes: &[u8]) -> Result<Dimensions, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .into_dimensions()?;
    Ok(Dimensions::new(width, height))
}

/// Check the header of `bytes` against a pixel budget.
///
/// Only the header is read, so oversized uploads are rejected before
/// their pixel buffer is allocated.
///
/// # Errors
///
/// Returns [`PipelineError::ImageTooLarge`] when the image exceeds the
/// budget, plus everything [`probe_dimensions`] returns.
pub fn check_budget(bytes: &[u8], max_pixels: u64) -> Result<Dimensions, PipelineError> {
    let dimensions = probe_dimensions(bytes)?;
    if dimensions.pixel_count() > max_pixels {
        return Err(PipelineError::ImageTooLarge {
            dimensions,
            limit: max_pixels,
        });
    }
    Ok(dimensions)
}

/// Encode an RGBA raster as PNG bytes.
///
/// # Errors
///
/// Returns [`PipelineError::Encode`] if the encoder fails.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, PipelineError> {
    use image::ImageEncoder;

    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| PipelineError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_returns_error() {
        let result = decode_rgba(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode_rgba(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn png_round_trips_with_alpha() {
        let img = RgbaImage::from_fn(3, 2, |x, y| {
            image::Rgba([x as u8 * 80, y as u8 * 100, 9, 100 + x as u8])
        });
        let decoded = decode_rgba(&encode_png(&img).unwrap()).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn opaque_formats_gain_full_alpha() {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 30]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Bmp)
            .unwrap();
        let decoded = decode_rgba(&buf).unwrap();
        assert!(decoded.pixels().all(|p| p.0 == [10, 20, 30, 255]));
    }

    #[test]
    fn probe_reads_header_dimensions() {
        let png = encode_png(&RgbaImage::new(17, 31)).unwrap();
        assert_eq!(probe_dimensions(&png).unwrap(), Dimensions::new(17, 31));
    }

    #[test]
    fn budget_rejects_oversized_images() {
        let png = encode_png(&RgbaImage::new(10, 10)).unwrap();
        let result = check_budget(&png, 99);
        assert!(matches!(
            result,
            Err(PipelineError::ImageTooLarge { limit: 99, .. })
        ));
        assert_eq!(check_budget(&png, 100).unwrap(), Dimensions::new(10, 10));
    }
}
