//! Integration tests for schema loading from disk.

#![allow(clippy::unwrap_used, clippy::panic)]

use rowbridge::config::{load_schema, starter_schema};
use rowbridge_core::{BridgeError, MetaProvider};
use std::io::Write;

#[test]
fn loads_schema_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(starter_schema().as_bytes()).unwrap();

    let registry = load_schema(file.path()).unwrap();
    assert!(registry.lookup("User").is_some());
    assert!(registry.lookup("Group").is_some());
}

#[test]
fn missing_schema_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    assert!(matches!(load_schema(&path), Err(BridgeError::Io(_))));
}

#[test]
fn invalid_toml_is_a_configuration_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"types = \"nope\"").unwrap();

    assert!(matches!(
        load_schema(file.path()),
        Err(BridgeError::Configuration(_))
    ));
}
