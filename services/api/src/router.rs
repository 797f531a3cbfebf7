//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the relay, including the
//! agent directory API, the WebSocket channel endpoint, static widget files,
//! and OpenAPI documentation.

use crate::{
    handlers,
    models::{AgentConfig, AgentRecord, Bootstrap, ErrorResponse},
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::get_agent, handlers::connect_agent),
    components(schemas(AgentRecord, AgentConfig, Bootstrap, ErrorResponse)),
    tags(
        (name = "Voice Widget Relay", description = "Agent directory and channel bootstrap for the voice widget")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let public_dir = app_state.config.public_dir.clone();

    let api_router = Router::new()
        .route("/api/agent/{agent_id}", get(handlers::get_agent))
        .route(
            "/api/agent/{agent_id}/connect",
            post(handlers::connect_agent),
        )
        .route("/ws/{agent_id}", get(ws_handler))
        .with_state(app_state);

    // Anything else is a static file: the widget script and the demo host page.
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .fallback_service(ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http())
}
