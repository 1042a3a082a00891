//! Saving the export artifact to the user's disk.
//!
//! The browser offers no direct "save file" call, so the artifact is
//! exposed through an object URL and a throwaway `<a download>` element
//! is clicked on the user's behalf. Browser-only.

use glowcut_pipeline::RasterBlob;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;

use crate::raster::{self, RasterError};

/// Errors that can occur when triggering a file download.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// A browser API call returned an error.
    #[error("browser API error: {0}")]
    JsError(String),

    /// The artifact could not be wrapped in a `Blob`.
    #[error(transparent)]
    Raster(#[from] RasterError),
}

impl From<JsValue> for DownloadError {
    fn from(value: JsValue) -> Self {
        Self::JsError(format!("{value:?}"))
    }
}

/// Offer `raster` to the user as a file named `filename`.
///
/// The object URL lives only for the duration of the click.
///
/// # Errors
///
/// Returns [`DownloadError`] when the page has no document or body, or
/// when wrapping the bytes or creating the anchor fails.
pub fn trigger_download(raster: &RasterBlob, filename: &str) -> Result<(), DownloadError> {
    let window =
        web_sys::window().ok_or_else(|| DownloadError::JsError("no global window".into()))?;
    let document = window
        .document()
        .ok_or_else(|| DownloadError::JsError("no document".into()))?;

    let url = raster::raster_to_blob_url(raster)?;

    let anchor: web_sys::HtmlAnchorElement = document
        .create_element("a")?
        .dyn_into::<web_sys::HtmlAnchorElement>()
        .map_err(|e| DownloadError::JsError(format!("failed to cast element: {e:?}")))?;

    anchor.set_href(&url);
    anchor.set_download(filename);

    let body = document
        .body()
        .ok_or_else(|| DownloadError::JsError("no document body".into()))?;
    body.append_child(&anchor)?;
    anchor.click();

    // The download has started; cleanup failures are not download failures.
    let _ = body.remove_child(&anchor);
    raster::revoke_blob_url(&url);

    tracing::info!(filename, bytes = raster.bytes().len(), "download triggered");
    Ok(())
}
