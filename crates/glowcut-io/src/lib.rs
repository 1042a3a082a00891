//! glowcut-io: Browser I/O and Dioxus component library.
//!
//! Handles file uploads, Blob downloads, Blob URL creation for previews,
//! the bridge to a page-provided background remover, and provides the
//! UI components for the glowcut web application.

pub mod components;
pub mod download;
pub mod raster;
pub mod segmenter;
pub mod status;

pub use components::{
    CropControls, CropEditor, ExportPanel, FileUpload, Preview, StatusLine, StyleControls,
};
pub use segmenter::JsSegmenter;
