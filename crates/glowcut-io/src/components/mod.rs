//! Dioxus UI components for glowcut.
//!
//! Provides the upload zone, crop editor and toolbar, style sliders,
//! result preview, export panel, and status line.

mod crop_controls;
mod crop_editor;
mod export;
mod preview;
mod status_line;
mod style_controls;
mod upload;

pub use crop_controls::{ASPECT_CHOICES, CropControls};
pub use crop_editor::CropEditor;
pub use export::ExportPanel;
pub use preview::Preview;
pub use status_line::StatusLine;
pub use style_controls::StyleControls;
pub use upload::FileUpload;
