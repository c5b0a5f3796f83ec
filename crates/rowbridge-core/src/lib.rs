//! # rowbridge-core
//!
//! The entity graph (de)composition engine for Rowbridge - THE LOGIC.
//!
//! This crate moves typed entity data between two shapes: flat XML-style
//! row documents (the wire format) and live object graphs (the working
//! format). Importing upserts rows by natural or unique keys; exporting
//! walks a graph into ordered flat records whose cross-references travel
//! as `path#keyField:keyValue` tokens.
//!
//! ## Collaborators
//!
//! Type metadata and persistence are injected, never owned:
//! - `MetaProvider` answers what a type's keys and relations are
//! - `EntityStore` finds, saves and deletes flat records
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Parses no markup; it works on an already-built element tree
//! - Has NO async, NO network dependencies (pure Rust)
//! - Never logs; import produces an audit trail as plain values

// =============================================================================
// MODULES
// =============================================================================

pub mod bridge;
pub mod decompose;
pub mod entity;
pub mod formats;
pub mod hydrate;
pub mod import;
pub mod meta;
pub mod primitives;
pub mod reassemble;
pub mod store;
pub mod storage;
pub mod token;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Action, ActionKind, AuditEvent, BridgeError, DecomposedNode, ImportSummary, Row, RowValue,
    Scalar, StoredValue, TypeCounts,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use bridge::{Bridge, BridgeStatus, ExportResult, StorageBackend};
pub use decompose::decompose;
pub use entity::{Entity, EntityId, ObjectGraph, Value};
pub use hydrate::hydrate;
pub use import::{AssetSink, Importer, NullAssets};
pub use meta::{Cardinality, MetaProvider, RelationMeta, TypeMeta, TypeRegistry};
pub use reassemble::{actions_from_nodes, reassemble};
pub use store::{EntityStore, MemStore, Record};
pub use storage::RedbStore;
pub use token::{ReferenceToken, encode_token};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{Element, decode_document, render_export};
pub use primitives::ROOT_MARKER;
