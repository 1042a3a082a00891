//! Mirrors pipeline status changes to the browser console.

use glowcut_pipeline::Status;

/// Log `status` to the console: errors via `console.error`, the rest
/// via `console.log`.
pub fn mirror_to_console(status: &Status) {
    let line = wasm_bindgen::JsValue::from_str(&format!("[glowcut] {status}"));
    if status.is_error() {
        web_sys::console::error_1(&line);
    } else {
        web_sys::console::log_1(&line);
    }
}
