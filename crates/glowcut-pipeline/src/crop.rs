//! Crop session seam and the default rectangle cropper.
//!
//! The controller never does selection math itself: it opens a
//! [`CropSession`] against the current working image, forwards aspect
//! ratio and selection changes to it, and asks it for the selected
//! [`Region`] when a crop is committed. Each session is tied to exactly
//! one working image and must be [`close`](CropSession::close)d before a
//! new one is opened.

use std::sync::Arc;

use crate::types::{AspectRatio, Dimensions, Region, RgbaImage};

/// Opens crop sessions on images.
pub trait Cropper {
    /// Session type holding per-image selection state.
    type Session: CropSession;

    /// Start a session on `image`.
    fn open(&self, image: Arc<RgbaImage>) -> Self::Session;
}

/// An interactive selection over one image.
pub trait CropSession {
    /// Lock the selection to `ratio` (or release it with
    /// [`AspectRatio::Free`]). Re-initialises the selection.
    fn set_aspect_ratio(&mut self, ratio: AspectRatio);

    /// The current aspect-ratio constraint.
    fn aspect_ratio(&self) -> AspectRatio;

    /// The currently selected region, always inside the image.
    fn selection(&self) -> Region;

    /// Move or resize the selection. The session clamps it into the
    /// image and applies the aspect-ratio constraint.
    fn select(&mut self, region: Region);

    /// Restore the default selection.
    fn reset(&mut self);

    /// Tear the session down and release its resources.
    fn close(self);
}

/// Cropper with a rectangular selection box.
///
/// New sessions start with a centred box covering
/// [`auto_crop_area`](Self::auto_crop_area) of each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectCropper {
    /// Fraction (0, 1] of each image axis the default box covers.
    pub auto_crop_area: f64,
}

impl RectCropper {
    /// Create a cropper with the given default box coverage.
    ///
    /// Values outside `(0, 1]` fall back to covering the whole image.
    #[must_use]
    pub fn new(auto_crop_area: f64) -> Self {
        let auto_crop_area = if auto_crop_area.is_finite() && auto_crop_area > 0.0 {
            auto_crop_area.min(1.0)
        } else {
            1.0
        };
        Self { auto_crop_area }
    }
}

impl Default for RectCropper {
    fn default() -> Self {
        Self::new(crate::ControllerConfig::DEFAULT_AUTO_CROP_AREA)
    }
}

impl Cropper for RectCropper {
    type Session = RectSession;

    fn open(&self, image: Arc<RgbaImage>) -> RectSession {
        let bounds = Dimensions::of(&image);
        let ratio = AspectRatio::Free;
        RectSession {
            selection: default_selection(bounds, ratio, self.auto_crop_area),
            bounds,
            ratio,
            auto_crop_area: self.auto_crop_area,
        }
    }
}

/// Session produced by [`RectCropper`].
#[derive(Debug, Clone)]
pub struct RectSession {
    bounds: Dimensions,
    selection: Region,
    ratio: AspectRatio,
    auto_crop_area: f64,
}

impl CropSession for RectSession {
    fn set_aspect_ratio(&mut self, ratio: AspectRatio) {
        self.ratio = ratio;
        self.reset();
    }

    fn aspect_ratio(&self) -> AspectRatio {
        self.ratio
    }

    fn selection(&self) -> Region {
        self.selection
    }

    fn select(&mut self, region: Region) {
        self.selection = constrain(region, self.bounds, self.ratio);
    }

    fn reset(&mut self) {
        self.selection = default_selection(self.bounds, self.ratio, self.auto_crop_area);
    }

    fn close(self) {
        tracing::trace!(bounds = %self.bounds, "crop session closed");
    }
}

/// Largest `(width, height)` with the given ratio that fits `bounds`.
fn fit_ratio(bounds: Dimensions, ratio: Option<f64>) -> (f64, f64) {
    let (w, h) = (f64::from(bounds.width), f64::from(bounds.height));
    match ratio {
        None => (w, h),
        Some(r) if w / h > r => (h * r, h),
        Some(r) => (w, w / r),
    }
}

/// Round a float side length into `1..=max`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn side(value: f64, max: u32) -> u32 {
    (value.round() as u32).clamp(1, max.max(1))
}

/// Centred box of the given ratio covering `area` of each axis.
fn default_selection(bounds: Dimensions, ratio: AspectRatio, area: f64) -> Region {
    if bounds.is_empty() {
        return Region::full(bounds);
    }
    let (w, h) = fit_ratio(bounds, ratio.ratio());
    let width = side(w * area, bounds.width);
    let height = side(h * area, bounds.height);
    Region::new(
        (bounds.width - width) / 2,
        (bounds.height - height) / 2,
        width,
        height,
    )
}

/// Clamp `region` into `bounds` and shrink it to the locked ratio,
/// keeping its top-left corner.
fn constrain(region: Region, bounds: Dimensions, ratio: AspectRatio) -> Region {
    if bounds.is_empty() {
        return Region::full(bounds);
    }
    let x = region.x.min(bounds.width - 1);
    let y = region.y.min(bounds.height - 1);
    let mut width = region.width.clamp(1, bounds.width - x);
    let mut height = region.height.clamp(1, bounds.height - y);

    if let Some(r) = ratio.ratio() {
        let (w, h) = (f64::from(width), f64::from(height));
        if w / h > r {
            width = side(h * r, width);
        } else {
            height = side(w / r, height);
        }
    }

    Region::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(width: u32, height: u32) -> RectSession {
        RectCropper::default().open(Arc::new(RgbaImage::new(width, height)))
    }

    #[test]
    fn opens_with_centred_auto_crop_box() {
        let s = session(400, 300);
        assert_eq!(s.aspect_ratio(), AspectRatio::Free);
        assert_eq!(s.selection(), Region::new(20, 15, 360, 270));
    }

    #[test]
    fn invalid_auto_crop_area_covers_whole_image() {
        let cropper = RectCropper::new(f64::NAN);
        let s = cropper.open(Arc::new(RgbaImage::new(10, 8)));
        assert_eq!(s.selection(), Region::new(0, 0, 10, 8));
    }

    #[test]
    fn square_ratio_on_landscape_image() {
        let mut s = session(400, 300);
        s.set_aspect_ratio(AspectRatio::SQUARE);
        // 300x300 fits, 90% of that is 270x270, centred.
        assert_eq!(s.selection(), Region::new(65, 15, 270, 270));
    }

    #[test]
    fn portrait_ratio_on_landscape_image() {
        let mut s = session(400, 300);
        s.set_aspect_ratio(AspectRatio::PORTRAIT);
        let sel = s.selection();
        assert_eq!(sel.height, 270);
        assert_eq!(sel.width, 216);
        assert!(sel.fits_within(Dimensions::new(400, 300)));
    }

    #[test]
    fn free_selection_is_clamped_into_the_image() {
        let mut s = session(100, 50);
        s.select(Region::new(90, 40, 50, 50));
        assert_eq!(s.selection(), Region::new(90, 40, 10, 10));
    }

    #[test]
    fn selection_past_the_edge_starts_on_the_last_pixel() {
        let mut s = session(100, 50);
        s.select(Region::new(500, 500, 0, 0));
        assert_eq!(s.selection(), Region::new(99, 49, 1, 1));
    }

    #[test]
    fn locked_selection_shrinks_to_ratio() {
        let mut s = session(100, 100);
        s.set_aspect_ratio(AspectRatio::SQUARE);
        s.select(Region::new(0, 0, 80, 40));
        assert_eq!(s.selection(), Region::new(0, 0, 40, 40));
    }

    #[test]
    fn full_image_selection_is_kept_when_free() {
        let mut s = session(64, 48);
        s.select(Region::full(Dimensions::new(64, 48)));
        assert_eq!(s.selection(), Region::new(0, 0, 64, 48));
    }

    #[test]
    fn reset_restores_default_box() {
        let mut s = session(400, 300);
        s.select(Region::new(1, 1, 5, 5));
        s.reset();
        assert_eq!(s.selection(), Region::new(20, 15, 360, 270));
    }

    #[test]
    fn tiny_images_still_get_a_pixel() {
        let s = session(1, 1);
        assert_eq!(s.selection(), Region::new(0, 0, 1, 1));
    }
}
