//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use rowbridge_core::{Element, ImportSummary, TypeCounts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Stored record counts per type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub types: BTreeMap<String, usize>,
    pub total: usize,
}

// =============================================================================
// IMPORT REQUEST/RESPONSE
// =============================================================================

/// Document import request: the element tree a markup parser produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub document: Element,
}

/// Document import response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    pub success: bool,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub warnings: usize,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub counts: BTreeMap<String, TypeCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportResponse {
    #[must_use]
    pub fn success(summary: &ImportSummary) -> Self {
        Self {
            success: true,
            created: summary.total_created(),
            updated: summary.total_updated(),
            removed: summary.total_removed(),
            warnings: summary.warning_count(),
            counts: summary.counts.clone(),
            error: None,
        }
    }

    #[must_use]
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            created: 0,
            updated: 0,
            removed: 0,
            warnings: 0,
            counts: BTreeMap::new(),
            error: Some(message),
        }
    }
}

// =============================================================================
// EXPORT RESPONSE
// =============================================================================

/// Export response: the rendered document plus its row count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub rows: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub xml: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportResponse {
    #[must_use]
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            rows: 0,
            xml: String::new(),
            error: Some(message),
        }
    }
}
