use axum::routing::{any, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all judoc endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route(
            "/io/:namespace/*key",
            post(handler::put_object)
                .put(handler::put_object)
                .get(handler::get_object)
                .delete(handler::delete_object)
                .fallback(handler::unknown_method),
        )
        .route("/io/:namespace", any(handler::missing_key))
        .route("/set/*key", any(handler::set_unscoped))
        .route("/get/*key", any(handler::get_unscoped))
        .route("/delete/*key", any(handler::delete_unscoped))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
