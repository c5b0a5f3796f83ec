//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{ExportResponse, HealthResponse, ImportRequest, ImportResponse, StatusResponse},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use rowbridge_core::{BridgeError, primitives::DEFAULT_EXPORT_DEPTH};
use serde::Deserialize;

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Get stored record counts.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let bridge = state.bridge.read().await;
    match bridge.status() {
        Ok(status) => (
            StatusCode::OK,
            Json(StatusResponse {
                types: status.types,
                total: status.total,
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ImportResponse::error(format!("Status failed: {}", e))),
        )
            .into_response(),
    }
}

// =============================================================================
// IMPORT HANDLER
// =============================================================================

/// Import a document.
pub async fn import_handler(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> impl IntoResponse {
    let mut bridge = state.bridge.write().await;
    match bridge.import_element(&request.document) {
        Ok(summary) => {
            for event in &summary.audit {
                if event.is_warning() {
                    tracing::warn!("{}", event);
                } else {
                    tracing::debug!("{}", event);
                }
            }
            (StatusCode::OK, Json(ImportResponse::success(&summary)))
        }
        Err(e) => (
            error_status(&e),
            Json(ImportResponse::error(format!("Import failed: {}", e))),
        ),
    }
}

// =============================================================================
// EXPORT HANDLER
// =============================================================================

/// Export query parameters.
#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub depth: Option<usize>,
}

/// Export an entity graph as a flat row document.
pub async fn export_handler(
    State(state): State<AppState>,
    Path((target, key)): Path<(String, String)>,
    Query(params): Query<ExportParams>,
) -> impl IntoResponse {
    let depth = params.depth.unwrap_or(DEFAULT_EXPORT_DEPTH);
    let bridge = state.bridge.read().await;
    match bridge.export(&target, &key, depth) {
        Ok(export) => (
            StatusCode::OK,
            Json(ExportResponse {
                success: true,
                rows: export.nodes.len(),
                xml: export.xml,
                error: None,
            }),
        ),
        Err(e) => (
            error_status(&e),
            Json(ExportResponse::error(format!("Export failed: {}", e))),
        ),
    }
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Map engine errors onto HTTP status codes.
fn error_status(error: &BridgeError) -> StatusCode {
    match error {
        BridgeError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
        BridgeError::Resolution { .. } | BridgeError::Configuration(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        BridgeError::Persistence(_) | BridgeError::Serialization(_) | BridgeError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
