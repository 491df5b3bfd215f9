pub mod error;
pub mod handlers;
pub mod logic;
pub mod qr;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;

use crate::handlers::{qrcode_handler, ws_handler};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let public_dir = state.config.public_dir.clone();
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/qrcode", get(qrcode_handler))
        .fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        .with_state(state)
}
