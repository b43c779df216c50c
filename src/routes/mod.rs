pub mod api;
pub mod ws;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Combine the HTTP and WebSocket routes into the application router.
pub fn create_app(app_state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(ws::create_ws_router())
        .with_state(app_state)
}
