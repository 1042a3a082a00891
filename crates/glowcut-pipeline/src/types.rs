//! Shared types for the glowcut image pipeline.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::segment::SegmentError;
use crate::style::{StyleLimits, StyleParams};

/// Re-export `RgbaImage` so downstream crates can hold working images
/// without depending on `image` directly.
pub use image::RgbaImage;

/// Re-export `GrayImage` for shadow masks.
pub use image::GrayImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new dimensions value.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of an RGBA raster.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned rectangle in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    /// Left edge (pixels from the left of the image).
    pub x: u32,
    /// Top edge (pixels from the top of the image).
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Region {
    /// Create a new region.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The region covering an entire image of the given size.
    #[must_use]
    pub const fn full(dimensions: Dimensions) -> Self {
        Self::new(0, 0, dimensions.width, dimensions.height)
    }

    /// Size of the region.
    #[must_use]
    pub const fn dimensions(self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Returns `true` if the region has non-zero area and lies entirely
    /// inside an image of the given size.
    #[must_use]
    pub fn fits_within(self, bounds: Dimensions) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let right = u64::from(self.x) + u64::from(self.width);
        let bottom = u64::from(self.y) + u64::from(self.height);
        right <= u64::from(bounds.width) && bottom <= u64::from(bounds.height)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Parses `x,y,width,height`.
impl FromStr for Region {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [x, y, w, h] = parts.as_slice() else {
            return Err(PipelineError::InvalidConfig(format!(
                "expected region as x,y,width,height, got {s:?}"
            )));
        };
        let parse = |v: &str| {
            v.parse::<u32>().map_err(|e| {
                PipelineError::InvalidConfig(format!("invalid region component {v:?}: {e}"))
            })
        };
        Ok(Self::new(parse(x)?, parse(y)?, parse(w)?, parse(h)?))
    }
}

/// Crop box aspect-ratio constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// Any width and height.
    #[default]
    Free,
    /// Width and height locked to `width:height`.
    Locked {
        /// Horizontal term of the ratio.
        width: u32,
        /// Vertical term of the ratio.
        height: u32,
    },
}

impl AspectRatio {
    /// Square crop.
    pub const SQUARE: Self = Self::Locked {
        width: 1,
        height: 1,
    };

    /// Portrait 4:5 crop (social media post).
    pub const PORTRAIT: Self = Self::Locked {
        width: 4,
        height: 5,
    };

    /// Widescreen 16:9 crop.
    pub const WIDE: Self = Self::Locked {
        width: 16,
        height: 9,
    };

    /// Width divided by height, or `None` for a free-form box.
    #[must_use]
    pub fn ratio(self) -> Option<f64> {
        match self {
            Self::Free => None,
            Self::Locked { width, height } => Some(f64::from(width) / f64::from(height)),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => f.write_str("free"),
            Self::Locked { width, height } => write!(f, "{width}:{height}"),
        }
    }
}

/// Parses `free` or `W:H` (also accepts `W/H`).
impl FromStr for AspectRatio {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("free") {
            return Ok(Self::Free);
        }
        let invalid =
            || PipelineError::InvalidConfig(format!("expected aspect ratio W:H or free, got {s:?}"));
        let (w, h) = s.split_once([':', '/']).ok_or_else(invalid)?;
        let width = w.trim().parse::<u32>().map_err(|_| invalid())?;
        let height = h.trim().parse::<u32>().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self::Locked { width, height })
    }
}

/// Encoded output format for export artifacts and segmenter results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExportFormat {
    /// Lossless PNG with alpha.
    #[default]
    Png,
}

impl ExportFormat {
    /// MIME type used for Blobs and downloads.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
        }
    }

    /// File extension without the leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
        }
    }
}

/// An encoded raster: the bytes of a PNG plus the size they decode to.
///
/// Bytes are shared behind an `Arc` so handing the export artifact to
/// the UI or a download does not copy it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBlob {
    bytes: Arc<[u8]>,
    dimensions: Dimensions,
    format: ExportFormat,
}

impl RasterBlob {
    /// Wrap already-encoded bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>, dimensions: Dimensions, format: ExportFormat) -> Self {
        Self {
            bytes: bytes.into(),
            dimensions,
            format,
        }
    }

    /// The encoded bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size of the encoded raster.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Encoding of [`bytes`](Self::bytes).
    #[must_use]
    pub const fn format(&self) -> ExportFormat {
        self.format
    }

    /// Decode the blob back into pixels.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageDecode`] if the bytes are corrupt.
    pub fn decode(&self) -> Result<RgbaImage, PipelineError> {
        Ok(image::load_from_memory(&self.bytes)?.to_rgba8())
    }
}

/// User-facing state of the pipeline, mirrored to the status line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    /// Nothing loaded.
    #[default]
    Idle,
    /// A source image is being decoded.
    Loading,
    /// A working image is loaded and a crop session is open.
    Cropping,
    /// Background removal is in flight.
    Segmenting,
    /// The last operation failed; the message is shown to the user.
    Error(String),
}

impl Status {
    /// Returns `true` for [`Status::Error`].
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Waiting for image."),
            Self::Loading => f.write_str("Loading image…"),
            Self::Cropping => f.write_str("Image ready. Adjust the crop box or style."),
            Self::Segmenting => f.write_str("Removing background…"),
            Self::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// Configuration for the [`Controller`](crate::Controller).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Fraction of each image axis the default crop box covers.
    pub auto_crop_area: f64,

    /// Slider ranges that style values are clamped into.
    pub style_limits: StyleLimits,

    /// Style applied before the user touches any slider.
    pub initial_style: StyleParams,

    /// Largest source image accepted by `load` (`width * height`).
    pub max_source_pixels: u64,

    /// Encoding of the export artifact.
    pub export_format: ExportFormat,

    /// File name offered for downloads.
    pub download_filename: String,
}

impl ControllerConfig {
    /// Default for [`auto_crop_area`](Self::auto_crop_area).
    pub const DEFAULT_AUTO_CROP_AREA: f64 = 0.9;

    /// Default for [`max_source_pixels`](Self::max_source_pixels).
    pub const DEFAULT_MAX_SOURCE_PIXELS: u64 = 40_000_000;

    /// Default for [`download_filename`](Self::download_filename).
    pub const DEFAULT_DOWNLOAD_FILENAME: &'static str = "glowcut.png";
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            auto_crop_area: Self::DEFAULT_AUTO_CROP_AREA,
            style_limits: StyleLimits::default(),
            initial_style: StyleParams::default(),
            max_source_pixels: Self::DEFAULT_MAX_SOURCE_PIXELS,
            export_format: ExportFormat::default(),
            download_filename: Self::DEFAULT_DOWNLOAD_FILENAME.to_owned(),
        }
    }
}

/// Errors surfaced by pipeline operations.
///
/// Every variant leaves the controller in a consistent, retryable state.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The decoded image exceeds the configured pixel budget.
    #[error("image is too large: {dimensions} exceeds {limit} pixels")]
    ImageTooLarge {
        /// Size of the rejected image.
        dimensions: Dimensions,
        /// Configured pixel limit.
        limit: u64,
    },

    /// A crop or background removal was requested with nothing loaded.
    #[error("no image is loaded")]
    NoActiveSession,

    /// Background removal is already running.
    #[error("background removal is already in progress")]
    OperationInProgress,

    /// The background segmenter failed.
    #[error("background removal failed: {0}")]
    Segmentation(#[from] SegmentError),

    /// Download requested before anything was rendered.
    #[error("nothing to export")]
    NothingToExport,

    /// The crop selection does not lie inside the working image.
    #[error("crop region {region} is outside the {bounds} image")]
    InvalidRegion {
        /// The rejected selection.
        region: Region,
        /// Size of the working image.
        bounds: Dimensions,
    },

    /// The working image changed while the operation was in flight, so
    /// its result was discarded.
    #[error("the image changed while the operation was running; result discarded")]
    Superseded,

    /// Encoding the rendered raster failed.
    #[error("failed to encode image: {0}")]
    Encode(String),

    /// A configuration or input value is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    /// Returns `true` for errors caused by an unreadable upload.
    #[must_use]
    pub const fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::ImageDecode(_) | Self::EmptyInput | Self::ImageTooLarge { .. }
        )
    }
}
