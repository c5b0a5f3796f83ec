//! # Entity Metadata
//!
//! The metadata provider is an external collaborator: given a type name it
//! answers which column is the primary key, which columns are unique, and
//! which columns are relations (target type and cardinality). The engine
//! calls this to decide which fields identify a record; it never implements
//! the upstream metadata/ORM layer itself.
//!
//! [`TypeRegistry`] is the explicit type-registry replacement for dynamic
//! runtime-type dispatch: every entity instance carries a type tag resolved
//! here, no reflection involved.

use crate::types::BridgeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cardinality of a relation column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    One,
    Many,
}

/// One relation column of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMeta {
    /// The field name on the owning type.
    pub field: String,
    /// The referenced type name.
    pub target: String,
    pub cardinality: Cardinality,
}

/// Metadata for one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMeta {
    pub name: String,
    /// The primary key column. Must be non-empty; an empty primary key is a
    /// fatal configuration error.
    pub primary_key: String,
    /// Columns marked unique, in declaration order. The first one doubles as
    /// the preferred natural key during export.
    pub unique: Vec<String>,
    pub relations: Vec<RelationMeta>,
}

impl TypeMeta {
    /// Create metadata with no unique columns or relations.
    #[must_use]
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            unique: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Mark a column unique (builder style).
    #[must_use]
    pub fn with_unique(mut self, column: impl Into<String>) -> Self {
        self.unique.push(column.into());
        self
    }

    /// Declare a relation column (builder style).
    #[must_use]
    pub fn with_relation(
        mut self,
        field: impl Into<String>,
        target: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        self.relations.push(RelationMeta {
            field: field.into(),
            target: target.into(),
            cardinality,
        });
        self
    }

    /// Whether a column is marked unique.
    #[must_use]
    pub fn is_unique(&self, column: &str) -> bool {
        self.unique.iter().any(|u| u == column)
    }

    /// Look up the relation declared on a field, if any.
    #[must_use]
    pub fn relation(&self, field: &str) -> Option<&RelationMeta> {
        self.relations.iter().find(|r| r.field == field)
    }

    /// Check metadata consistency. No resolvable primary column is fatal.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.primary_key.is_empty() {
            return Err(BridgeError::Configuration(format!(
                "type '{}' declares no primary key column",
                self.name
            )));
        }
        Ok(())
    }
}

/// The injected metadata capability.
pub trait MetaProvider {
    /// Non-erroring lookup. `None` means the type is unknown; the decomposer
    /// treats such nodes as leaves rather than failing the export.
    fn lookup(&self, name: &str) -> Option<&TypeMeta>;

    /// Erroring lookup for contexts where missing metadata is fatal.
    fn type_meta(&self, name: &str) -> Result<&TypeMeta, BridgeError> {
        self.lookup(name).ok_or_else(|| {
            BridgeError::Configuration(format!("no metadata registered for type '{name}'"))
        })
    }
}

/// A `BTreeMap`-backed metadata registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeMeta>,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, validating its metadata. Re-registering a name
    /// replaces the previous entry.
    pub fn register(&mut self, meta: TypeMeta) -> Result<(), BridgeError> {
        meta.validate()?;
        self.types.insert(meta.name.clone(), meta);
        Ok(())
    }

    /// Registered type names, sorted.
    #[must_use]
    pub fn type_names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl MetaProvider for TypeRegistry {
    fn lookup(&self, name: &str) -> Option<&TypeMeta> {
        self.types.get(name)
    }
}

// =============================================================================
// TESTS
// =============================================================================
