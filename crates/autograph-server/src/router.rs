//! Axum router setup for the document store

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::{
    handlers::{
        compare_versions, create_diagram, delete_diagram, get_diagram, get_version, health_check,
        update_diagram,
    },
    ServerState,
};

/// Create the axum router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route(
            "/diagrams/:id",
            get(get_diagram)
                .post(create_diagram)
                .put(update_diagram)
                .delete(delete_diagram),
        )
        .route("/diagrams/:id/versions/:version", get(get_version))
        .route("/diagrams/:id/compare", get(compare_versions))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
