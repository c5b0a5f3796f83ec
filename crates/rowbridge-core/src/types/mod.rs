//! # Core Type Definitions
//!
//! This module contains all core types for the RowBridge (de)composition
//! engine:
//! - Scalar values and their stable stringification (`Scalar`)
//! - The flat row representation of an import document (`Row`, `RowValue`,
//!   `Action`, `ActionKind`)
//! - Persisted field slots (`StoredValue`)
//! - Export output (`DecomposedNode`)
//! - Import accounting (`ImportSummary`, `TypeCounts`, `AuditEvent`)
//! - Error types (`BridgeError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point numbers)
//! - Implement `Ord` where they serve as `BTreeMap`/`BTreeSet` keys
//! - Preserve document order: rows inside actions and fields inside rows are
//!   ordered sequences, never hash maps

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// =============================================================================
// SCALAR
// =============================================================================

/// A scalar value carried by a row field or a persisted record field.
///
/// Numbers are integers only; the engine performs no numeric coercion
/// beyond the literal rules in [`Scalar::coerce_literal`] (column metadata
/// upstream owns numeric typing).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scalar {
    /// The absent value.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer number.
    Int(i64),
    /// A text value.
    Text(String),
    /// A point in time; stringified as RFC 3339 / ISO-8601.
    Date(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
}

impl Scalar {
    /// Whether this value is a "primitive" in the key-selection sense:
    /// a string or a number, i.e. something usable as a natural key.
    #[must_use]
    pub const fn is_primitive(&self) -> bool {
        matches!(self, Self::Text(_) | Self::Int(_))
    }

    /// Stable stringification used in tokens, filters and storage keys.
    ///
    /// Dates render as RFC 3339; a date outside the representable range
    /// renders empty rather than panicking.
    #[must_use]
    pub fn to_literal(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Text(s) => s.clone(),
            Self::Date(d) => d.format(&Rfc3339).unwrap_or_else(|_| String::new()),
        }
    }

    /// Apply the literal coercion rules to a text value.
    ///
    /// The exact strings `"true"`, `"false"` and `"null"` become their
    /// non-string equivalents; everything else stays text. Non-text values
    /// pass through unchanged.
    #[must_use]
    pub fn coerce_literal(self) -> Self {
        match self {
            Self::Text(s) => match s.as_str() {
                "true" => Self::Bool(true),
                "false" => Self::Bool(false),
                "null" => Self::Null,
                _ => Self::Text(s),
            },
            other => other,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}

// =============================================================================
// STORED VALUE
// =============================================================================

/// A persisted field slot.
///
/// Relation fields persist the related record's key value(s), never a live
/// reference; there are no surrogate foreign keys in the wire format, only in
/// storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredValue {
    /// A single value (scalar column or to-one relation key).
    One(Scalar),
    /// A list of values (to-many relation keys).
    Many(Vec<Scalar>),
}

impl StoredValue {
    /// The single scalar carried by this slot, if it is a `One`.
    #[must_use]
    pub const fn as_one(&self) -> Option<&Scalar> {
        match self {
            Self::One(s) => Some(s),
            Self::Many(_) => None,
        }
    }
}

// =============================================================================
// ROW & ROW VALUES
// =============================================================================

/// One field value inside a parsed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowValue {
    /// A plain scalar.
    Scalar(Scalar),
    /// A single reference: resolved by `keyField = keyValue` lookup on the
    /// relation's target type.
    Ref {
        key_field: String,
        key_value: String,
    },
    /// A list reference: resolved by a `keyField IN keyValues` lookup.
    RefList {
        key_field: String,
        key_values: Vec<String>,
    },
}

/// A flat, ordered mapping from field name to [`RowValue`].
///
/// Produced by decoding one `<row>` element; consumed once to build or patch
/// one entity instance. Field order is significant and preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub fields: Vec<(String, RowValue)>,
}

impl Row {
    /// Create an empty row.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a field (builder style).
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: RowValue) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    /// Append a scalar field (builder style).
    #[must_use]
    pub fn scalar(self, name: impl Into<String>, value: Scalar) -> Self {
        self.field(name, RowValue::Scalar(value))
    }

    /// Look up a field by name (first occurrence).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RowValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// The text of a scalar field, if present and textual.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(RowValue::Scalar(Scalar::Text(s))) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// =============================================================================
// ACTIONS
// =============================================================================

/// The kind of one import action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Upsert rows against the target type by natural-key filter.
    InsertUpdate,
    /// Remove rows matching an equality filter built from every row field.
    Remove,
    /// Delegate to the media collaborator's upsert-by-code operation.
    Media,
    /// Delegate to the file collaborator's upsert-by-code operation.
    File,
}

/// One action of an import document.
///
/// An ordered sequence of actions forms an import document; action order and
/// row order are significant (later rows may reference entities created by
/// earlier ones) and must be preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub target: String,
    pub rows: Vec<Row>,
}

impl Action {
    /// Create an action with no rows.
    #[must_use]
    pub fn new(kind: ActionKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            rows: Vec::new(),
        }
    }

    /// Append a row (builder style).
    #[must_use]
    pub fn row(mut self, row: Row) -> Self {
        self.rows.push(row);
        self
    }
}

// =============================================================================
// DECOMPOSED NODE
// =============================================================================

/// One flattened entity instance emitted by the decomposer.
///
/// `path` is the `/`-joined field chain at which the entity was first
/// discovered during the graph walk, rooted at the `@root` marker. Relation
/// slots in `data` carry encoded reference tokens as text; no live reference
/// ever reaches the serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecomposedNode {
    pub type_name: String,
    pub field_name: String,
    pub path: String,
    pub data: Vec<(String, StoredValue)>,
}

impl DecomposedNode {
    /// Look up a data slot by field name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&StoredValue> {
        self.data.iter().find(|(n, _)| n == field).map(|(_, v)| v)
    }
}

// =============================================================================
// IMPORT SUMMARY & AUDIT TRAIL
// =============================================================================

/// Per-target-type import counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

/// One entry of the import audit trail.
///
/// Every upsert and removal decision is recorded with the target type, the
/// primary key and the filter that drove it, so a bad document can be
/// root-caused without replaying it. The core stays logging-framework free;
/// the app layer replays these events through its tracing setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEvent {
    Created {
        target: String,
        key: String,
        filter: String,
    },
    Updated {
        target: String,
        key: String,
        filter: String,
    },
    Removed {
        target: String,
        filter: String,
    },
    /// A remove row produced no filter; nothing was deleted.
    RemoveSkipped { target: String },
    /// A remove filter matched nothing; not an error.
    RemoveMissed {
        target: String,
        filter: String,
    },
    /// A media/file row was handed to its collaborator.
    AssetUpserted {
        target: String,
        code: Option<String>,
    },
}

impl AuditEvent {
    /// Whether the event should surface at warning level.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(self, Self::RemoveSkipped { .. } | Self::RemoveMissed { .. })
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created {
                target,
                key,
                filter,
            } => write!(f, "created {target}[{key}] (filter: {filter})"),
            Self::Updated {
                target,
                key,
                filter,
            } => write!(f, "updated {target}[{key}] (filter: {filter})"),
            Self::Removed { target, filter } => {
                write!(f, "removed {target} (filter: {filter})")
            }
            Self::RemoveSkipped { target } => write!(
                f,
                "remove on {target} skipped: no resolvable fields, refusing unconditioned delete"
            ),
            Self::RemoveMissed { target, filter } => {
                write!(f, "remove on {target} matched nothing (filter: {filter})")
            }
            Self::AssetUpserted { target, code } => match code {
                Some(code) => write!(f, "{target} asset upserted (code: {code})"),
                None => write!(f, "{target} asset upserted (no code)"),
            },
        }
    }
}

/// The result of one import call: counters per target type plus the audit
/// trail, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub counts: BTreeMap<String, TypeCounts>,
    pub audit: Vec<AuditEvent>,
}

impl ImportSummary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, target: &str) -> &mut TypeCounts {
        self.counts.entry(target.to_string()).or_default()
    }

    pub fn record_created(&mut self, target: &str, key: String, filter: String) {
        self.entry(target).created += 1;
        self.audit.push(AuditEvent::Created {
            target: target.to_string(),
            key,
            filter,
        });
    }

    pub fn record_updated(&mut self, target: &str, key: String, filter: String) {
        self.entry(target).updated += 1;
        self.audit.push(AuditEvent::Updated {
            target: target.to_string(),
            key,
            filter,
        });
    }

    pub fn record_removed(&mut self, target: &str, filter: String) {
        self.entry(target).removed += 1;
        self.audit.push(AuditEvent::Removed {
            target: target.to_string(),
            filter,
        });
    }

    pub fn record_asset(&mut self, target: &str, code: Option<String>) {
        self.entry(target).created += 1;
        self.audit.push(AuditEvent::AssetUpserted {
            target: target.to_string(),
            code,
        });
    }

    pub fn warn(&mut self, event: AuditEvent) {
        self.audit.push(event);
    }

    /// Total records created across all target types.
    #[must_use]
    pub fn total_created(&self) -> usize {
        self.counts.values().map(|c| c.created).sum()
    }

    /// Total records updated across all target types.
    #[must_use]
    pub fn total_updated(&self) -> usize {
        self.counts.values().map(|c| c.updated).sum()
    }

    /// Total records removed across all target types.
    #[must_use]
    pub fn total_removed(&self) -> usize {
        self.counts.values().map(|c| c.removed).sum()
    }

    /// Number of warning-level audit events.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.audit.iter().filter(|e| e.is_warning()).count()
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors surfaced by the bridge engine.
///
/// - `Configuration` and `Resolution` abort the whole import call: a dangling
///   relation or inconsistent metadata would silently corrupt data.
/// - Not-found-on-remove is NOT an error; it is a warning-level
///   [`AuditEvent`].
/// - Persistence failures propagate unchanged, no retry: retries on
///   non-idempotent creates could duplicate records whose unique key was not
///   yet established.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Metadata inconsistency, e.g. no primary column for a type. Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A reference token or row relation did not resolve to an existing
    /// record. Fatal for import; export degrades to leaf instead.
    #[error("unresolved reference into '{target}': {detail}")]
    Resolution { target: String, detail: String },

    /// The injected persistence provider failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The import document violates the expected element grammar.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn scalar_literal_coercion() {
        assert_eq!(
            Scalar::Text("true".into()).coerce_literal(),
            Scalar::Bool(true)
        );
        assert_eq!(
            Scalar::Text("false".into()).coerce_literal(),
            Scalar::Bool(false)
        );
        assert_eq!(Scalar::Text("null".into()).coerce_literal(), Scalar::Null);
        assert_eq!(
            Scalar::Text("42".into()).coerce_literal(),
            Scalar::Text("42".into())
        );
        assert_eq!(Scalar::Int(7).coerce_literal(), Scalar::Int(7));
    }

    #[test]
    fn scalar_date_renders_rfc3339() {
        let d = Scalar::Date(datetime!(2024-03-01 12:30:00 UTC));
        assert_eq!(d.to_literal(), "2024-03-01T12:30:00Z");
    }

    #[test]
    fn primitive_scalars() {
        assert!(Scalar::Text("x".into()).is_primitive());
        assert!(Scalar::Int(1).is_primitive());
        assert!(!Scalar::Null.is_primitive());
        assert!(!Scalar::Bool(true).is_primitive());
    }

    #[test]
    fn row_preserves_field_order() {
        let row = Row::new()
            .scalar("b", Scalar::Int(1))
            .scalar("a", Scalar::Int(2));
        let names: Vec<_> = row.fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn summary_counts_and_warnings() {
        let mut summary = ImportSummary::new();
        summary.record_created("Category", "1".into(), "code=a".into());
        summary.record_updated("Category", "1".into(), "code=a".into());
        summary.warn(AuditEvent::RemoveSkipped {
            target: "Category".into(),
        });

        assert_eq!(summary.total_created(), 1);
        assert_eq!(summary.total_updated(), 1);
        assert_eq!(summary.warning_count(), 1);
    }
}
