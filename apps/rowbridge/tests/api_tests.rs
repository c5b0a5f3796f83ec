//! Integration tests for the Rowbridge HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum_test::TestServer;
use rowbridge::api::{
    AppState, ExportResponse, HealthResponse, ImportRequest, ImportResponse, StatusResponse,
    create_router,
};
use rowbridge::config::registry_from_str;
use rowbridge_core::{Bridge, Element};
use serde_json::json;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

const SCHEMA: &str = r#"
[types.User]
primary_key = "id"
unique = ["login"]

[[types.User.relations]]
field = "groups"
target = "Group"
cardinality = "many"

[types.Group]
primary_key = "id"
unique = ["name"]
"#;

/// Create a test server with a fresh in-memory bridge.
fn create_test_server() -> TestServer {
    let registry = registry_from_str(SCHEMA).unwrap();
    let state = AppState::new(Bridge::new(registry));
    TestServer::new(create_router(state)).unwrap()
}

/// A document creating one group and one user referencing it.
fn sample_document() -> Element {
    Element::new("schema")
        .child(
            Element::new("InsertUpdate")
                .attr("target", "Group")
                .child(Element::new("row").child(Element::new("name").text("admins"))),
        )
        .child(
            Element::new("InsertUpdate")
                .attr("target", "User")
                .child(
                    Element::new("row")
                        .child(Element::new("login").text("alice"))
                        .child(
                            Element::new("groups")
                                .attr("key", "name")
                                .child(Element::new("row").text("admins")),
                        ),
                ),
        )
}

// =============================================================================
// HEALTH & STATUS
// =============================================================================

#[tokio::test]
async fn health_returns_ok() {
    let server = create_test_server();

    let response = server.get("/health").await;
    response.assert_status_ok();

    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn status_starts_empty() {
    let server = create_test_server();

    let response = server.get("/status").await;
    response.assert_status_ok();

    let status: StatusResponse = response.json();
    assert_eq!(status.total, 0);
    assert!(status.types.is_empty());
}

// =============================================================================
// IMPORT
// =============================================================================

#[tokio::test]
async fn import_creates_records() {
    let server = create_test_server();

    let response = server
        .post("/import")
        .json(&ImportRequest {
            document: sample_document(),
        })
        .await;
    response.assert_status_ok();

    let result: ImportResponse = response.json();
    assert!(result.success);
    assert_eq!(result.created, 2);
    assert_eq!(result.updated, 0);

    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.total, 2);
}

#[tokio::test]
async fn import_is_idempotent_over_http() {
    let server = create_test_server();
    let request = ImportRequest {
        document: sample_document(),
    };

    server.post("/import").json(&request).await.assert_status_ok();
    let second: ImportResponse = server.post("/import").json(&request).await.json();

    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 2);
}

#[tokio::test]
async fn malformed_document_is_a_bad_request() {
    let server = create_test_server();

    let response = server
        .post("/import")
        .json(&json!({
            "document": { "name": "not-a-schema" }
        }))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);

    let result: ImportResponse = response.json();
    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn dangling_reference_is_unprocessable() {
    let server = create_test_server();

    let document = Element::new("schema").child(
        Element::new("InsertUpdate").attr("target", "User").child(
            Element::new("row")
                .child(Element::new("login").text("bob"))
                .child(
                    Element::new("groups")
                        .attr("key", "name")
                        .child(Element::new("row").text("ghost")),
                ),
        ),
    );

    let response = server
        .post("/import")
        .json(&ImportRequest { document })
        .await;
    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
}

// =============================================================================
// EXPORT
// =============================================================================

#[tokio::test]
async fn export_returns_rendered_document() {
    let server = create_test_server();
    server
        .post("/import")
        .json(&ImportRequest {
            document: sample_document(),
        })
        .await
        .assert_status_ok();

    let response = server.get("/export/User/alice").await;
    response.assert_status_ok();

    let export: ExportResponse = response.json();
    assert!(export.success);
    assert_eq!(export.rows, 2);
    assert!(export.xml.contains("<groups key=\"name\">"));
}

#[tokio::test]
async fn export_honors_depth_parameter() {
    let server = create_test_server();
    server
        .post("/import")
        .json(&ImportRequest {
            document: sample_document(),
        })
        .await
        .assert_status_ok();

    let export: ExportResponse = server
        .get("/export/User/alice")
        .add_query_param("depth", 0)
        .await
        .json();
    // Depth 0 exports the root alone.
    assert_eq!(export.rows, 1);
}

#[tokio::test]
async fn export_of_unknown_key_is_unprocessable() {
    let server = create_test_server();

    let response = server.get("/export/User/nobody").await;
    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);

    let export: ExportResponse = response.json();
    assert!(!export.success);
}
