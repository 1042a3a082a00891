//! 2D raster compositing with canvas-like semantics.
//!
//! [`Compositor`] and [`Surface`] are the narrow drawing API the
//! controller renders through. [`RasterCompositor`] implements them on
//! CPU `RgbaImage` buffers:
//!
//! - new canvases start fully transparent
//! - drawing uses source-over blending, and a pixel drawn onto a fully
//!   transparent destination is copied exactly
//! - a shadow pass draws the raster's alpha mask tinted with the shadow
//!   colour and blurred with sigma `blur / 2` (the HTML canvas
//!   `shadowBlur` convention), then the raster itself on top

use image::{Pixel, Rgba};

use crate::types::{
    Dimensions, ExportFormat, GrayImage, PipelineError, RasterBlob, Region, RgbaImage,
};

/// Factory for drawing surfaces plus the raster primitives the
/// controller needs outside of drawing.
pub trait Compositor {
    /// Drawing surface produced by [`new_canvas`](Self::new_canvas).
    type Surface: Surface;

    /// Decode raw upload bytes into an RGBA raster.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] or
    /// [`PipelineError::ImageDecode`] for unreadable input.
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, PipelineError>;

    /// [`decode`](Self::decode), refusing images larger than
    /// `max_pixels` before any pixels are decoded.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageTooLarge`] for oversized images,
    /// plus everything [`decode`](Self::decode) returns.
    fn decode_within(&self, bytes: &[u8], max_pixels: u64) -> Result<RgbaImage, PipelineError> {
        crate::decode::check_budget(bytes, max_pixels)?;
        self.decode(bytes)
    }

    /// Create a fully transparent canvas.
    fn new_canvas(&self, dimensions: Dimensions) -> Self::Surface;

    /// Copy `region` out of `image` as a new raster.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidRegion`] if the region is empty or
    /// extends past the image.
    fn extract(&self, image: &RgbaImage, region: Region) -> Result<RgbaImage, PipelineError>;
}

/// A canvas that rasters are drawn onto.
pub trait Surface {
    /// Draw `raster` at `(x, y)` casting a soft shadow of `color` with the
    /// given blur radius. The raster itself is drawn on top of its shadow.
    fn draw_with_shadow(&mut self, raster: &RgbaImage, x: u32, y: u32, blur: f32, color: Rgba<u8>);

    /// Draw `raster` at `(x, y)` without any effect.
    fn draw_opaque(&mut self, raster: &RgbaImage, x: u32, y: u32);

    /// Encode the current canvas contents.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Encode`] if the encoder fails.
    fn encode(&self, format: ExportFormat) -> Result<RasterBlob, PipelineError>;
}

/// CPU compositor backed by the `image` and `imageproc` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCompositor;

impl Compositor for RasterCompositor {
    type Surface = RasterSurface;

    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
        crate::decode::decode_rgba(bytes)
    }

    fn new_canvas(&self, dimensions: Dimensions) -> RasterSurface {
        RasterSurface {
            canvas: RgbaImage::new(dimensions.width, dimensions.height),
        }
    }

    fn extract(&self, image: &RgbaImage, region: Region) -> Result<RgbaImage, PipelineError> {
        let bounds = Dimensions::of(image);
        if !region.fits_within(bounds) {
            return Err(PipelineError::InvalidRegion { region, bounds });
        }
        Ok(
            image::imageops::crop_imm(image, region.x, region.y, region.width, region.height)
                .to_image(),
        )
    }
}

/// Canvas produced by [`RasterCompositor`].
#[derive(Debug, Clone)]
pub struct RasterSurface {
    canvas: RgbaImage,
}

impl RasterSurface {
    #[cfg(test)]
    const fn pixels(&self) -> &RgbaImage {
        &self.canvas
    }

    #[cfg(test)]
    fn into_pixels(self) -> RgbaImage {
        self.canvas
    }

    /// Build the blurred, colour-scaled alpha mask of `raster` placed at
    /// `(x, y)` on a canvas-sized grid.
    fn shadow_mask(&self, raster: &RgbaImage, x: u32, y: u32, blur: f32, strength: u8) -> GrayImage {
        let mut mask = GrayImage::new(self.canvas.width(), self.canvas.height());
        for (px, py, pixel) in raster.enumerate_pixels() {
            let (Some(tx), Some(ty)) = (x.checked_add(px), y.checked_add(py)) else {
                continue;
            };
            if tx < mask.width() && ty < mask.height() {
                mask.put_pixel(tx, ty, image::Luma([scale_alpha(pixel.0[3], strength)]));
            }
        }
        crate::blur::gaussian_blur(&mask, blur / 2.0)
    }
}

impl Surface for RasterSurface {
    fn draw_with_shadow(&mut self, raster: &RgbaImage, x: u32, y: u32, blur: f32, color: Rgba<u8>) {
        let mask = self.shadow_mask(raster, x, y, blur, color.0[3]);
        let [r, g, b, _] = color.0;
        for (px, py, m) in mask.enumerate_pixels() {
            let alpha = m.0[0];
            if alpha > 0 {
                blend_over(self.canvas.get_pixel_mut(px, py), Rgba([r, g, b, alpha]));
            }
        }
        self.draw_opaque(raster, x, y);
    }

    fn draw_opaque(&mut self, raster: &RgbaImage, x: u32, y: u32) {
        let (cw, ch) = self.canvas.dimensions();
        for (px, py, pixel) in raster.enumerate_pixels() {
            let (Some(tx), Some(ty)) = (x.checked_add(px), y.checked_add(py)) else {
                continue;
            };
            if tx < cw && ty < ch {
                blend_over(self.canvas.get_pixel_mut(tx, ty), *pixel);
            }
        }
    }

    fn encode(&self, format: ExportFormat) -> Result<RasterBlob, PipelineError> {
        let dimensions = Dimensions::of(&self.canvas);
        let bytes = match format {
            ExportFormat::Png => crate::decode::encode_png(&self.canvas)?,
        };
        Ok(RasterBlob::new(bytes, dimensions, format))
    }
}

/// Source-over blend of `src` onto `dst`.
///
/// Transparent sources leave `dst` alone and fully transparent
/// destinations take `src` verbatim, so drawing onto a fresh canvas
/// never perturbs pixel values.
fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    if src.0[3] == 0 {
        return;
    }
    if dst.0[3] == 0 || src.0[3] == u8::MAX {
        *dst = src;
        return;
    }
    dst.blend(&src);
}

/// `alpha * strength / 255`, rounded.
fn scale_alpha(alpha: u8, strength: u8) -> u8 {
    let scaled = (u16::from(alpha) * u16::from(strength) + 127) / 255;
    #[allow(clippy::cast_possible_truncation)]
    let scaled = scaled as u8;
    scaled
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 200])
            }
        })
    }

    #[test]
    fn new_canvas_is_transparent() {
        let surface = RasterCompositor.new_canvas(Dimensions::new(3, 2));
        assert_eq!(surface.pixels().dimensions(), (3, 2));
        assert!(surface.pixels().pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn draw_opaque_copies_onto_transparent_canvas() {
        let raster = checker(4, 3);
        let mut surface = RasterCompositor.new_canvas(Dimensions::new(8, 7));
        surface.draw_opaque(&raster, 2, 2);
        let out = surface.into_pixels();
        let inner = image::imageops::crop_imm(&out, 2, 2, 4, 3).to_image();
        assert_eq!(inner, raster);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn draw_opaque_clips_at_canvas_edge() {
        let raster = checker(4, 4);
        let mut surface = RasterCompositor.new_canvas(Dimensions::new(3, 3));
        surface.draw_opaque(&raster, 1, 1);
        let out = surface.into_pixels();
        assert_eq!(out.get_pixel(2, 2), raster.get_pixel(1, 1));
    }

    #[test]
    fn opaque_source_replaces_destination() {
        let mut dst = Rgba([10, 20, 30, 100]);
        blend_over(&mut dst, Rgba([1, 2, 3, 255]));
        assert_eq!(dst, Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn transparent_source_is_ignored() {
        let mut dst = Rgba([10, 20, 30, 100]);
        blend_over(&mut dst, Rgba([1, 2, 3, 0]));
        assert_eq!(dst, Rgba([10, 20, 30, 100]));
    }

    #[test]
    fn translucent_over_translucent_increases_coverage() {
        let mut dst = Rgba([0, 0, 255, 128]);
        blend_over(&mut dst, Rgba([255, 0, 0, 128]));
        assert!(dst.0[3] > 128);
        assert!(dst.0[0] > 0);
    }

    #[test]
    fn zero_blur_shadow_sits_under_the_raster() {
        let raster = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        let mut surface = RasterCompositor.new_canvas(Dimensions::new(6, 6));
        surface.draw_with_shadow(&raster, 2, 2, 0.0, Rgba([0, 0, 0, 255]));
        let out = surface.into_pixels();
        // No blur means the shadow is exactly covered by the raster.
        assert_eq!(out.get_pixel(1, 1).0[3], 0);
        assert_eq!(*out.get_pixel(2, 2), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn blurred_shadow_extends_beyond_the_raster() {
        let raster = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let mut surface = RasterCompositor.new_canvas(Dimensions::new(16, 16));
        surface.draw_with_shadow(&raster, 6, 6, 6.0, Rgba([0, 0, 0, 255]));
        let out = surface.into_pixels();
        let halo = out.get_pixel(5, 7);
        assert!(halo.0[3] > 0);
        assert_eq!(halo.0[..3], [0, 0, 0]);
    }

    #[test]
    fn extract_copies_region() {
        let raster = checker(5, 5);
        let cut = RasterCompositor
            .extract(&raster, Region::new(1, 2, 3, 2))
            .unwrap();
        assert_eq!(cut.dimensions(), (3, 2));
        assert_eq!(cut.get_pixel(0, 0), raster.get_pixel(1, 2));
    }

    #[test]
    fn extract_rejects_out_of_bounds_region() {
        let raster = checker(5, 5);
        let result = RasterCompositor.extract(&raster, Region::new(3, 3, 3, 3));
        assert!(matches!(result, Err(PipelineError::InvalidRegion { .. })));
    }

    #[test]
    fn encode_is_deterministic() {
        let mut surface = RasterCompositor.new_canvas(Dimensions::new(5, 5));
        surface.draw_with_shadow(&checker(3, 3), 1, 1, 2.0, Rgba([0, 0, 0, 140]));
        let a = surface.encode(ExportFormat::Png).unwrap();
        let b = surface.encode(ExportFormat::Png).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.decode().unwrap(), *surface.pixels());
    }

    #[test]
    fn decode_within_checks_the_budget_first() {
        let png = crate::decode::encode_png(&checker(4, 4)).unwrap();
        assert!(matches!(
            RasterCompositor.decode_within(&png, 15),
            Err(PipelineError::ImageTooLarge { limit: 15, .. })
        ));
        assert_eq!(RasterCompositor.decode_within(&png, 16).unwrap(), checker(4, 4));
    }

    #[test]
    fn scale_alpha_rounds() {
        assert_eq!(scale_alpha(255, 255), 255);
        assert_eq!(scale_alpha(255, 0), 0);
        assert_eq!(scale_alpha(255, 140), 140);
        assert_eq!(scale_alpha(128, 128), 64);
    }
}
