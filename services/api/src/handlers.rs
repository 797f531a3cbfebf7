//! Axum Handlers for the Agent Directory
//!
//! This module answers agent lookup and connect-bootstrap requests. It uses
//! `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, info};
use voicewidget_core::DirectoryError;

use crate::{
    config::Config,
    models::{AGENT_NOT_FOUND, AgentRecord, Bootstrap, ErrorResponse},
    state::AppState,
};

pub enum ApiError {
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message))).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new("An internal server error occurred.")),
                )
                    .into_response()
            }
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(_) => Self::NotFound(AGENT_NOT_FOUND.to_string()),
            other => Self::InternalServerError(other.into()),
        }
    }
}

/// Builds the `ws://host` prefix the widget should dial.
///
/// A configured public URL wins; otherwise the request's `Host` header is used,
/// with `wss` when a proxy reports the original request was HTTPS.
pub fn endpoint_base(config: &Config, headers: &HeaderMap) -> String {
    if let Some(base) = &config.public_ws_url {
        return base.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| config.bind_address.to_string());
    let scheme = match headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
    {
        Some(proto) if proto.eq_ignore_ascii_case("https") => "wss",
        _ => "ws",
    };
    format!("{}://{}", scheme, host)
}

/// Get the configuration of an agent.
#[utoipa::path(
    get,
    path = "/api/agent/{agent_id}",
    responses(
        (status = 200, description = "Agent configuration", body = AgentRecord),
        (status = 404, description = "Agent not found", body = ErrorResponse)
    ),
    params(
        ("agent_id" = String, Path, description = "Agent ID")
    )
)]
pub async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<AgentRecord>, ApiError> {
    let agent = state.directory.lookup(&agent_id)?;
    Ok(Json(agent.clone()))
}

/// Resolve the channel endpoint a widget should dial for an agent.
#[utoipa::path(
    post,
    path = "/api/agent/{agent_id}/connect",
    responses(
        (status = 200, description = "Channel endpoint and agent configuration", body = Bootstrap),
        (status = 404, description = "Agent not found", body = ErrorResponse)
    ),
    params(
        ("agent_id" = String, Path, description = "Agent ID")
    )
)]
pub async fn connect_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let base = endpoint_base(&state.config, &headers);
    let bootstrap = state.directory.connect_bootstrap(&agent_id, &base)?;
    info!(%agent_id, ws_url = %bootstrap.ws_url, "Issued channel endpoint");
    Ok((StatusCode::OK, Json(bootstrap)))
}
