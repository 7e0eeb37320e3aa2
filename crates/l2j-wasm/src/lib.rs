//! WASM bindings for the Liquid → Jinja2 converter.
//!
//! Exposes `convert()` to JavaScript via wasm-bindgen. Returns a JS object
//! `{ success: true, jinja_code }` on success or
//! `{ success: false, error }` on failure — the same shape the browser
//! client already consumes, so failures render as messages rather than
//! thrown exceptions.

use serde::Serialize;
use wasm_bindgen::prelude::*;

/// The response shape handed back to JavaScript.
#[derive(Serialize)]
struct ConvertResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    jinja_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Convert Liquid template source to Jinja2 source.
#[wasm_bindgen]
pub fn convert(source: &str) -> Result<JsValue, JsError> {
    let result = match l2j_codegen::convert(source) {
        Ok(code) => ConvertResult {
            success: true,
            jinja_code: Some(code),
            error: None,
        },
        Err(e) => ConvertResult {
            success: false,
            jinja_code: None,
            error: Some(e.summary()),
        },
    };

    serde_wasm_bindgen::to_value(&result).map_err(|e| JsError::new(&e.to_string()))
}

/// Get the converter version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
