use wasm_bindgen::JsValue;
use web_sys::Window;

use prompterlink_shared::Role;

/// `false` when the page was opened straight from disk; there is no relay
/// to talk to and the display runs standalone.
pub fn is_served(window: &Window) -> bool {
    window
        .location()
        .protocol()
        .map(|protocol| protocol != "file:")
        .unwrap_or(false)
}

pub fn websocket_url(window: &Window, role: Role) -> Result<String, JsValue> {
    let location = window.location();
    let protocol = location.protocol()?;
    let host = location.host()?;
    let scheme = if protocol == "https:" { "wss" } else { "ws" };
    Ok(format!("{scheme}://{host}/ws?type={}", role.as_query()))
}
