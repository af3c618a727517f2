//! REST API handlers for the document store

use std::sync::Arc;

use autograph_core::CanvasDocument;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::versions::VersionError;
use crate::ServerState;

/// Header clients set to make a write safe to deliver twice.
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// Body of create and update requests
#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    pub document: CanvasDocument,
    /// Version the edit was made against; checked on update only
    #[serde(default)]
    pub base_version: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub diagram_id: String,
    pub version: u64,
}

#[derive(Debug, Serialize)]
pub struct DiagramResponse {
    pub diagram_id: String,
    pub version: u64,
    pub document: CanvasDocument,
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub from: u64,
    pub to: u64,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub diagrams: usize,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
}

impl From<VersionError> for ApiError {
    fn from(err: VersionError) -> Self {
        match err {
            VersionError::NotFound(_) | VersionError::VersionNotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            VersionError::AlreadyExists(_) | VersionError::Stale { .. } => {
                ApiError::Conflict(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn parse_write(body: &[u8]) -> Result<WriteRequest, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("malformed body: {}", e)))
}

fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

fn respond(status: StatusCode, body: Value) -> Response {
    if body.is_null() {
        status.into_response()
    } else {
        (status, Json(body)).into_response()
    }
}

/// Run a write once per idempotency key. Only successful outcomes are
/// remembered, so a refused write can be retried with the same key.
fn once(
    state: &ServerState,
    headers: &HeaderMap,
    write: impl FnOnce() -> Result<(StatusCode, Value), ApiError>,
) -> Result<Response, ApiError> {
    let Some(key) = idempotency_key(headers) else {
        let (status, body) = write()?;
        return Ok(respond(status, body));
    };

    let ((status, body), replayed) = state.idempotency.run(&key, write)?;
    if replayed {
        debug!("Replayed request {} answered from record", key);
    }
    Ok(respond(status, body))
}

/// Create version 1 of a diagram
pub async fn create_diagram(
    State(state): State<Arc<ServerState>>,
    Path(diagram_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    once(&state, &headers, || {
        let request = parse_write(&body)?;
        let version = state.diagrams.create(&diagram_id, request.document)?;
        info!("Created diagram {}", diagram_id);
        Ok((
            StatusCode::CREATED,
            json!(VersionResponse { diagram_id: diagram_id.clone(), version }),
        ))
    })
}

/// Append a version to a diagram
pub async fn update_diagram(
    State(state): State<Arc<ServerState>>,
    Path(diagram_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    once(&state, &headers, || {
        let request = parse_write(&body)?;
        let version = state
            .diagrams
            .update(&diagram_id, request.document, request.base_version)
            .inspect_err(|e| warn!("Update of {} refused: {}", diagram_id, e))?;
        debug!("Diagram {} is now at version {}", diagram_id, version);
        Ok((
            StatusCode::OK,
            json!(VersionResponse { diagram_id: diagram_id.clone(), version }),
        ))
    })
}

/// Remove a diagram. Deleting an unknown diagram succeeds.
pub async fn delete_diagram(
    State(state): State<Arc<ServerState>>,
    Path(diagram_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    once(&state, &headers, || {
        if state.diagrams.delete(&diagram_id) {
            info!("Deleted diagram {}", diagram_id);
        }
        Ok((StatusCode::NO_CONTENT, Value::Null))
    })
}

/// Latest version of a diagram
pub async fn get_diagram(
    State(state): State<Arc<ServerState>>,
    Path(diagram_id): Path<String>,
) -> Result<Json<DiagramResponse>, ApiError> {
    let (version, document) = state.diagrams.latest(&diagram_id)?;
    Ok(Json(DiagramResponse {
        diagram_id,
        version,
        document,
    }))
}

/// One version of a diagram, as a bare document
pub async fn get_version(
    State(state): State<Arc<ServerState>>,
    Path((diagram_id, version)): Path<(String, u64)>,
) -> Result<Json<CanvasDocument>, ApiError> {
    Ok(Json(state.diagrams.version(&diagram_id, version)?))
}

/// Diff between two versions of a diagram
pub async fn compare_versions(
    State(state): State<Arc<ServerState>>,
    Path(diagram_id): Path<String>,
    Query(query): Query<CompareQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let v1 = state.diagrams.version(&diagram_id, query.from)?;
    let v2 = state.diagrams.version(&diagram_id, query.to)?;
    let diff = state.engine.compare(&v1, &v2);
    debug!(
        "Compared {} v{}..v{}: {} changes",
        diagram_id,
        query.from,
        query.to,
        diff.summary().total_changes
    );
    Ok(Json(diff))
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let health = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        diagrams: state.diagrams.diagram_count(),
    };
    Json(health)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_errors_map_to_status() {
        let status = |err: VersionError| ApiError::from(err).into_response().status();

        assert_eq!(status(VersionError::NotFound("d".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status(VersionError::Stale { base: 1, latest: 2 }),
            StatusCode::CONFLICT
        );
        assert_eq!(status(VersionError::AlreadyExists("d".into())), StatusCode::CONFLICT);
    }

    #[test]
    fn test_idempotency_key_ignores_blank_values() {
        let mut headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers), None);

        headers.insert(IDEMPOTENCY_HEADER, "".parse().unwrap());
        assert_eq!(idempotency_key(&headers), None);

        headers.insert(IDEMPOTENCY_HEADER, "d1-1-abcd".parse().unwrap());
        assert_eq!(idempotency_key(&headers).as_deref(), Some("d1-1-abcd"));
    }

    #[test]
    fn test_malformed_body_is_bad_request() {
        assert!(matches!(parse_write(b"{not json"), Err(ApiError::BadRequest(_))));
        assert!(matches!(
            parse_write(br#"{"document": {"elements": {"a": {"id": "b", "type": "rect"}}}}"#),
            Err(ApiError::BadRequest(_))
        ));
        let request = parse_write(br#"{"document": {"elements": {}}, "base_version": 2}"#).unwrap();
        assert_eq!(request.base_version, Some(2));
    }
}
