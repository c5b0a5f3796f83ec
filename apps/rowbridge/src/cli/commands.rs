//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use crate::config;
use rowbridge_core::{Bridge, BridgeError, Element};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for document import (100 MB).
///
/// This prevents memory exhaustion from malicious or accidental large files.
const MAX_IMPORT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), BridgeError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| BridgeError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(BridgeError::InvalidDocument(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate file path for security.
///
/// Canonicalizes the path to resolve symlinks and "..", ensures it exists
/// and is a regular file. Prevents path traversal via inputs like
/// "../../../etc/passwd".
fn validate_file_path(path: &Path) -> Result<PathBuf, BridgeError> {
    let canonical = path
        .canonicalize()
        .map_err(|e| BridgeError::Io(format!("Invalid file path '{}': {}", path.display(), e)))?;

    if !canonical.is_file() {
        return Err(BridgeError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate output path for security.
///
/// For output files, the parent directory must exist and resolve cleanly.
fn validate_output_path(path: &Path) -> Result<PathBuf, BridgeError> {
    let parent = path.parent().unwrap_or(Path::new("."));

    let canonical_parent = parent.canonicalize().map_err(|e| {
        BridgeError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(BridgeError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| BridgeError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    db_path: &PathBuf,
    backend: &str,
    schema: &Path,
    host: &str,
    port: u16,
) -> Result<(), BridgeError> {
    let bridge = load_bridge(db_path, backend, schema)?;

    println!("Rowbridge Data Bridge Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", backend);
    println!("  Database: {:?}", db_path);
    println!("  Schema:   {:?}", schema);
    println!();
    println!("Endpoints:");
    println!("  POST /import               - Import a document");
    println!("  GET  /export/{{type}}/{{key}}  - Export an entity graph");
    println!("  GET  /status               - Get stored record counts");
    println!("  GET  /health               - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, bridge).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show stored record counts per type.
pub fn cmd_status(
    db_path: &PathBuf,
    backend: &str,
    schema: &Path,
    json_mode: bool,
) -> Result<(), BridgeError> {
    let bridge = load_bridge(db_path, backend, schema)?;
    let status = bridge.status()?;

    if json_mode {
        let output = serde_json::json!({
            "database": db_path.to_string_lossy(),
            "backend": backend,
            "types": status.types,
            "total": status.total
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Rowbridge Status");
    println!("================");
    println!("Database: {:?}", db_path);
    println!("Backend:  {}", backend);
    println!();
    if status.types.is_empty() {
        println!("No records stored.");
    } else {
        for (type_name, count) in &status.types {
            println!("{:24} {}", type_name, count);
        }
        println!();
        println!("Total: {} records", status.total);
    }

    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Import a document file (element tree as JSON).
pub fn cmd_import(
    db_path: &PathBuf,
    backend: &str,
    schema: &Path,
    json_mode: bool,
    file: &Path,
) -> Result<(), BridgeError> {
    tracing::info!("Importing from {:?}", file);

    let mut bridge = load_bridge(db_path, backend, schema)?;

    // Validate path and size before reading (path traversal, memory limits)
    let validated_path = validate_file_path(file)?;
    validate_file_size(&validated_path, MAX_IMPORT_FILE_SIZE)?;

    let contents = std::fs::read(&validated_path)
        .map_err(|e| BridgeError::Io(format!("Read file: {}", e)))?;

    let root: Element = serde_json::from_slice(&contents)
        .map_err(|e| BridgeError::InvalidDocument(format!("Parse document: {}", e)))?;

    let summary = bridge.import_element(&root)?;

    // Replay the audit trail through tracing; the core itself never logs.
    for event in &summary.audit {
        if event.is_warning() {
            tracing::warn!("{}", event);
        } else {
            tracing::debug!("{}", event);
        }
    }

    if json_mode {
        let output = serde_json::json!({
            "created": summary.total_created(),
            "updated": summary.total_updated(),
            "removed": summary.total_removed(),
            "warnings": summary.warning_count(),
            "counts": summary.counts
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!(
        "Imported: {} created, {} updated, {} removed ({} warnings)",
        summary.total_created(),
        summary.total_updated(),
        summary.total_removed(),
        summary.warning_count()
    );
    for (type_name, counts) in &summary.counts {
        println!(
            "  {:20} +{} ~{} -{}",
            type_name, counts.created, counts.updated, counts.removed
        );
    }

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export an entity graph as a flat row document.
pub fn cmd_export(
    db_path: &PathBuf,
    backend: &str,
    schema: &Path,
    target: &str,
    key: &str,
    depth: usize,
    output: Option<&Path>,
) -> Result<(), BridgeError> {
    let bridge = load_bridge(db_path, backend, schema)?;
    let export = bridge.export(target, key, depth)?;

    tracing::info!(
        "Exported {} rows for {} '{}' (depth {})",
        export.nodes.len(),
        target,
        key,
        depth
    );

    match output {
        Some(path) => {
            let validated_output = validate_output_path(path)?;
            std::fs::write(&validated_output, export.xml.as_bytes())
                .map_err(|e| BridgeError::Io(format!("Write file: {}", e)))?;
            println!(
                "Exported {} rows to {:?}",
                export.nodes.len(),
                validated_output
            );
        }
        None => print!("{}", export.xml),
    }

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database and starter schema.
pub fn cmd_init(
    db_path: &PathBuf,
    backend: &str,
    schema: &Path,
    force: bool,
) -> Result<(), BridgeError> {
    if db_path.exists() && !force {
        return Err(BridgeError::Configuration(
            "Database already exists. Use --force to overwrite.".to_string(),
        ));
    }

    if !schema.exists() || force {
        std::fs::write(schema, config::starter_schema())
            .map_err(|e| BridgeError::Io(format!("Write schema: {}", e)))?;
        println!("Wrote starter schema to {:?}", schema);
    }

    match backend {
        "redb" => {
            let registry = config::load_schema(schema)?;
            let _bridge = Bridge::with_redb(db_path, registry)?;
            println!("Initialized new redb database at {:?}", db_path);
        }
        _ => {
            println!("Memory backend holds no files; nothing else to initialize.");
        }
    }

    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Load a bridge from a database path with the specified backend and schema.
pub fn load_bridge(db_path: &PathBuf, backend: &str, schema: &Path) -> Result<Bridge, BridgeError> {
    let registry = config::load_schema(schema)?;
    match backend {
        "redb" => Bridge::with_redb(db_path, registry),
        "memory" => Ok(Bridge::new(registry)),
        other => Err(BridgeError::Configuration(format!(
            "Unknown backend '{}'. Use: memory, redb",
            other
        ))),
    }
}
