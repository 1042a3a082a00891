//! Conversions between encoded rasters and browser `Blob`s.
//!
//! The pipeline works on byte slices; the browser wants `Blob`s for
//! `<img src>`, downloads, and the page's segmentation function. This
//! module is the only place the two meet.

use glowcut_pipeline::{RasterBlob, RgbaImage};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::BlobPropertyBag;

/// Errors that can occur while moving bytes in or out of a `Blob`.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// A browser API call returned an error.
    #[error("browser API error: {0}")]
    JsError(String),

    /// The raster could not be encoded.
    #[error("encoding failed: {0}")]
    Encode(String),

    /// A JS value was not the type we expected.
    #[error("expected {expected}, got {actual}")]
    UnexpectedType {
        /// What we wanted.
        expected: &'static str,
        /// `typeof` / debug rendering of what we got.
        actual: String,
    },
}

impl From<JsValue> for RasterError {
    fn from(value: JsValue) -> Self {
        Self::JsError(format!("{value:?}"))
    }
}

/// Wrap `bytes` in a `Blob` of the given MIME type.
///
/// # Errors
///
/// Returns [`RasterError::JsError`] if `Blob` construction fails.
pub fn bytes_to_blob(bytes: &[u8], mime_type: &str) -> Result<web_sys::Blob, RasterError> {
    let uint8_array = js_sys::Uint8Array::from(bytes);
    let parts = js_sys::Array::new();
    parts.push(&uint8_array);

    let opts = BlobPropertyBag::new();
    opts.set_type(mime_type);
    Ok(web_sys::Blob::new_with_u8_array_sequence_and_options(
        &parts, &opts,
    )?)
}

/// Wrap an encoded pipeline artifact in a `Blob`.
///
/// # Errors
///
/// Returns [`RasterError::JsError`] if `Blob` construction fails.
pub fn raster_to_blob(raster: &RasterBlob) -> Result<web_sys::Blob, RasterError> {
    bytes_to_blob(raster.bytes(), raster.format().mime_type())
}

/// Create an object URL for `raster`, for use as an `<img src>`.
///
/// The blob stays alive until the URL is passed to [`revoke_blob_url`].
///
/// # Errors
///
/// Returns [`RasterError::JsError`] if Blob or URL creation fails.
pub fn raster_to_blob_url(raster: &RasterBlob) -> Result<String, RasterError> {
    let blob = raster_to_blob(raster)?;
    Ok(web_sys::Url::create_object_url_with_blob(&blob)?)
}

/// Encode an unstyled raster as PNG and create an object URL for it.
///
/// The returned URL must be revoked via [`revoke_blob_url`].
///
/// # Errors
///
/// Returns [`RasterError::Encode`] if PNG encoding fails.
/// Returns [`RasterError::JsError`] if Blob or URL creation fails.
pub fn rgba_to_blob_url(image: &RgbaImage) -> Result<String, RasterError> {
    let png = glowcut_pipeline::decode::encode_png(image)
        .map_err(|e| RasterError::Encode(e.to_string()))?;
    let blob = bytes_to_blob(&png, "image/png")?;
    Ok(web_sys::Url::create_object_url_with_blob(&blob)?)
}

/// Read a `Blob`'s contents into memory.
///
/// # Errors
///
/// Returns [`RasterError::JsError`] if the read is rejected.
pub async fn blob_to_bytes(blob: &web_sys::Blob) -> Result<Vec<u8>, RasterError> {
    let buffer = JsFuture::from(blob.array_buffer()).await?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

/// Interpret a JS value as a `Blob`.
///
/// # Errors
///
/// Returns [`RasterError::UnexpectedType`] for anything that is not a
/// `Blob` (or `File`).
pub fn expect_blob(value: JsValue) -> Result<web_sys::Blob, RasterError> {
    value
        .dyn_into::<web_sys::Blob>()
        .map_err(|other| RasterError::UnexpectedType {
            expected: "Blob",
            actual: other.js_typeof().as_string().unwrap_or_default(),
        })
}

/// Revoke a Blob URL previously created by [`raster_to_blob_url`].
///
/// Errors are ignored; revoking an unknown URL is a no-op anyway.
pub fn revoke_blob_url(url: &str) {
    let _ = web_sys::Url::revoke_object_url(url);
}
