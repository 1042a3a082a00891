//! glowcut-pipeline: Image pipeline controller (sans-IO).
//!
//! Turns an uploaded photo into a styled, downloadable PNG through:
//! decode -> crop -> optional background removal -> pad -> drop shadow
//! -> three-colour glow -> encode.
//!
//! The [`Controller`] owns all pipeline state and is the only thing UI
//! layers talk to. Its collaborators sit behind traits:
//!
//! - [`Cropper`] opens interactive selection sessions
//!   ([`RectCropper`] by default).
//! - [`Segmenter`] removes backgrounds asynchronously. The model is
//!   always supplied by the caller.
//! - [`Compositor`] decodes, crops, and draws rasters
//!   ([`RasterCompositor`] by default).
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and returns encoded blobs. All browser/filesystem
//! interaction lives in `glowcut-io` and `glowcut-cli`.

pub mod blur;
pub mod composite;
pub mod controller;
pub mod crop;
pub mod decode;
pub mod segment;
pub mod style;
pub mod types;

pub use composite::{Compositor, RasterCompositor, RasterSurface, Surface};
pub use controller::{Controller, Phase};
pub use crop::{CropSession, Cropper, RectCropper, RectSession};
pub use segment::{SegmentError, SegmentOptions, Segmenter, WithTimeout, segmenter_fn};
pub use style::{StyleLimits, StyleParams, StylePatch, stylize};
pub use types::{
    AspectRatio, ControllerConfig, Dimensions, ExportFormat, GrayImage, PipelineError,
    RasterBlob, Region, RgbaImage, Status,
};
