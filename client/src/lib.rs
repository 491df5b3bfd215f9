pub mod coalesce;
pub mod controller;
pub mod engine;
pub mod gesture;
pub mod reconnect;

#[cfg(target_arch = "wasm32")]
mod display;
#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod gesture_surface;
#[cfg(target_arch = "wasm32")]
mod net;
#[cfg(target_arch = "wasm32")]
mod remote;
#[cfg(target_arch = "wasm32")]
mod ws;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Entry point. The page picks its role with `<body data-role="...">`:
/// `display` (default), `remote` or `gesture`.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("Missing window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("Missing document"))?;
    let role = document
        .body()
        .and_then(|body| body.get_attribute("data-role"))
        .unwrap_or_default();

    match role.as_str() {
        "remote" => remote::start(window, document),
        "gesture" => gesture_surface::start(window, document),
        _ => display::start(window, document),
    }
}
