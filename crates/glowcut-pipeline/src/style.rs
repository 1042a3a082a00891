//! Style parameters and the fixed padding/shadow/glow compositing recipe.
//!
//! Style is never baked into the working image: [`stylize`] always draws
//! the unstyled raster onto a fresh surface, so moving a slider back to
//! zero restores the original pixels exactly.

use serde::{Deserialize, Serialize};

use crate::composite::{Compositor, Surface};
use crate::types::{Dimensions, PipelineError, RasterBlob, RgbaImage};

/// Colour used for the drop shadow pass.
pub const SHADOW_COLOR: image::Rgba<u8> = image::Rgba([0, 0, 0, 140]);

/// Colours used for the three glow passes, drawn in this order.
pub const GLOW_COLORS: [image::Rgba<u8>; 3] = [
    image::Rgba([168, 85, 247, 140]),
    image::Rgba([34, 211, 238, 115]),
    image::Rgba([34, 197, 94, 90]),
];

/// Cosmetic effects applied on top of the working image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleParams {
    /// Transparent border added on every side, in pixels.
    pub padding: u32,
    /// Blur radius of the drop shadow. Zero disables the shadow.
    pub shadow_blur: f32,
    /// Blur radius of the neon glow. Zero disables the glow.
    pub glow_blur: f32,
}

impl StyleParams {
    /// Default for [`padding`](Self::padding).
    pub const DEFAULT_PADDING: u32 = 40;

    /// Default for [`shadow_blur`](Self::shadow_blur).
    pub const DEFAULT_SHADOW_BLUR: f32 = 20.0;

    /// Default for [`glow_blur`](Self::glow_blur).
    pub const DEFAULT_GLOW_BLUR: f32 = 0.0;

    /// No padding, no shadow, no glow.
    pub const PLAIN: Self = Self {
        padding: 0,
        shadow_blur: 0.0,
        glow_blur: 0.0,
    };

    /// Merge a partial update, clamping each present field into `limits`.
    ///
    /// Non-finite and negative values become 0; values above the slider
    /// maximum become the maximum. Fields absent from `patch` are kept.
    #[must_use]
    pub fn merged(self, patch: StylePatch, limits: &StyleLimits) -> Self {
        Self {
            padding: patch.padding.map_or(self.padding, |v| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let px = clamp_value(v, f64::from(limits.max_padding)).round() as u32;
                px
            }),
            shadow_blur: patch.shadow_blur.map_or(self.shadow_blur, |v| {
                #[allow(clippy::cast_possible_truncation)]
                let blur = clamp_value(v, f64::from(limits.max_shadow_blur)) as f32;
                blur
            }),
            glow_blur: patch.glow_blur.map_or(self.glow_blur, |v| {
                #[allow(clippy::cast_possible_truncation)]
                let blur = clamp_value(v, f64::from(limits.max_glow_blur)) as f32;
                blur
            }),
        }
    }

    /// Size of the canvas this style produces around an image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the padded size does
    /// not fit in `u32`.
    pub fn canvas_dimensions(&self, image: Dimensions) -> Result<Dimensions, PipelineError> {
        let border = self.padding.checked_mul(2);
        let grow = |side: u32| border.and_then(|b| side.checked_add(b));
        match (grow(image.width), grow(image.height)) {
            (Some(width), Some(height)) => Ok(Dimensions::new(width, height)),
            _ => Err(PipelineError::InvalidConfig(format!(
                "padding {} overflows the canvas for a {image} image",
                self.padding
            ))),
        }
    }
}

impl Default for StyleParams {
    fn default() -> Self {
        Self {
            padding: Self::DEFAULT_PADDING,
            shadow_blur: Self::DEFAULT_SHADOW_BLUR,
            glow_blur: Self::DEFAULT_GLOW_BLUR,
        }
    }
}

/// A partial style update, as produced by a single slider change.
///
/// Values arrive as raw `f64` from the UI and are validated by
/// [`StyleParams::merged`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StylePatch {
    /// New padding in pixels.
    pub padding: Option<f64>,
    /// New shadow blur radius.
    pub shadow_blur: Option<f64>,
    /// New glow blur radius.
    pub glow_blur: Option<f64>,
}

impl StylePatch {
    /// Patch that only sets the padding.
    #[must_use]
    pub const fn padding(value: f64) -> Self {
        Self {
            padding: Some(value),
            shadow_blur: None,
            glow_blur: None,
        }
    }

    /// Patch that only sets the shadow blur.
    #[must_use]
    pub const fn shadow_blur(value: f64) -> Self {
        Self {
            padding: None,
            shadow_blur: Some(value),
            glow_blur: None,
        }
    }

    /// Patch that only sets the glow blur.
    #[must_use]
    pub const fn glow_blur(value: f64) -> Self {
        Self {
            padding: None,
            shadow_blur: None,
            glow_blur: Some(value),
        }
    }

    /// Patch that sets every field from `style`.
    #[must_use]
    pub fn from_style(style: StyleParams) -> Self {
        Self {
            padding: Some(f64::from(style.padding)),
            shadow_blur: Some(f64::from(style.shadow_blur)),
            glow_blur: Some(f64::from(style.glow_blur)),
        }
    }
}

/// Upper bounds of the style sliders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleLimits {
    /// Largest padding in pixels.
    pub max_padding: u32,
    /// Largest shadow blur radius.
    pub max_shadow_blur: f32,
    /// Largest glow blur radius.
    pub max_glow_blur: f32,
}

impl Default for StyleLimits {
    fn default() -> Self {
        Self {
            max_padding: 200,
            max_shadow_blur: 80.0,
            max_glow_blur: 80.0,
        }
    }
}

fn clamp_value(value: f64, max: f64) -> f64 {
    if !value.is_finite() || value < 0.0 {
        0.0
    } else {
        value.min(max)
    }
}

/// Render `image` with `style` into an encoded blob.
///
/// Compositing order is fixed:
///
/// 1. shadow pass (only when `shadow_blur > 0`)
/// 2. three glow passes in [`GLOW_COLORS`] order (only when `glow_blur > 0`)
/// 3. one crisp pass of the image itself
///
/// The crisp pass must come last or it would be hidden under the blurred
/// layers.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the padded canvas is too
/// large and [`PipelineError::Encode`] if encoding fails.
pub fn stylize<C: Compositor>(
    compositor: &C,
    image: &RgbaImage,
    style: &StyleParams,
    format: crate::types::ExportFormat,
) -> Result<RasterBlob, PipelineError> {
    let canvas = style.canvas_dimensions(Dimensions::of(image))?;
    let mut surface = compositor.new_canvas(canvas);
    let offset = style.padding;

    if style.shadow_blur > 0.0 {
        surface.draw_with_shadow(image, offset, offset, style.shadow_blur, SHADOW_COLOR);
    }
    if style.glow_blur > 0.0 {
        for color in GLOW_COLORS {
            surface.draw_with_shadow(image, offset, offset, style.glow_blur, color);
        }
    }
    surface.draw_opaque(image, offset, offset);

    surface.encode(format)
}
