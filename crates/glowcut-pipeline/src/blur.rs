//! Gaussian blur for soft shadow and glow masks.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`], which operates on a
//! single channel. Shadow passes only need the blurred alpha mask, so a
//! single grayscale blur per pass is enough.

use crate::types::GrayImage;

/// Apply Gaussian blur to a single-channel mask.
///
/// Higher `sigma` values produce softer edges. Non-positive or
/// non-finite sigma values return the mask unchanged, since
/// `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred mask"]
pub fn gaussian_blur(mask: &GrayImage, sigma: f32) -> GrayImage {
    if !sigma.is_finite() || sigma <= 0.0 {
        return mask.clone();
    }

    imageproc::filter::gaussian_blur_f32(mask, sigma)
}
