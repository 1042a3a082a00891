//! Background removal through a page-provided JavaScript function.
//!
//! The model is not bundled. The hosting page defines a global
//! function (by default `glowcutRemoveBackground`) that takes an image
//! `Blob` plus the wanted output MIME type and returns a `Promise<Blob>`
//! of the cut-out, e.g. a thin wrapper around an in-browser
//! segmentation library.

use std::sync::Arc;

use glowcut_pipeline::{ExportFormat, RgbaImage, SegmentError, SegmentOptions, Segmenter};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use crate::raster;

/// Global function looked up when none is configured.
pub const DEFAULT_FUNCTION: &str = "glowcutRemoveBackground";

/// [`Segmenter`] that calls a global JS function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsSegmenter {
    function: String,
}

impl Default for JsSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_FUNCTION)
    }
}

impl JsSegmenter {
    /// Segmenter calling `window[function]`.
    #[must_use]
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
        }
    }

    /// Name of the global function.
    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Whether the page defines the function.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.lookup().is_ok()
    }

    fn lookup(&self) -> Result<js_sys::Function, SegmentError> {
        let window = web_sys::window()
            .ok_or_else(|| SegmentError::Failed("no global window".to_owned()))?;
        let value = js_sys::Reflect::get(&window, &JsValue::from_str(&self.function))
            .map_err(|e| js_failure("lookup failed", &e))?;
        if !value.is_function() {
            return Err(SegmentError::Failed(format!(
                "no background remover: window.{} is not defined",
                self.function
            )));
        }
        Ok(value.unchecked_into())
    }
}

impl Segmenter for JsSegmenter {
    async fn segment(
        &self,
        image: Arc<RgbaImage>,
        options: SegmentOptions,
    ) -> Result<RgbaImage, SegmentError> {
        let function = self.lookup()?;

        let png = glowcut_pipeline::decode::encode_png(&image)
            .map_err(|e| SegmentError::Failed(e.to_string()))?;
        let input = raster::bytes_to_blob(&png, ExportFormat::Png.mime_type())
            .map_err(|e| SegmentError::Failed(e.to_string()))?;
        let output_type = JsValue::from_str(options.output_format.mime_type());

        let returned = function
            .call2(&JsValue::NULL, &input, &output_type)
            .map_err(|e| js_failure("background remover threw", &e))?;
        let promise = returned.dyn_into::<js_sys::Promise>().map_err(|_| {
            SegmentError::InvalidOutput(format!("{} did not return a Promise", self.function))
        })?;
        let resolved = JsFuture::from(promise)
            .await
            .map_err(|e| js_failure("background remover rejected", &e))?;

        let blob = raster::expect_blob(resolved)
            .map_err(|e| SegmentError::InvalidOutput(e.to_string()))?;
        let bytes = raster::blob_to_bytes(&blob)
            .await
            .map_err(|e| SegmentError::Failed(e.to_string()))?;
        tracing::debug!(bytes = bytes.len(), "background remover returned");

        glowcut_pipeline::decode::decode_rgba(&bytes)
            .map_err(|e| SegmentError::InvalidOutput(e.to_string()))
    }
}

/// Turn a thrown/rejected JS value into a readable failure.
fn js_failure(context: &str, value: &JsValue) -> SegmentError {
    let message = value
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"));
    SegmentError::Failed(format!("{context}: {message}"))
}
