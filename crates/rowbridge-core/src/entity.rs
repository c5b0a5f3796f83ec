//! # Object Graph
//!
//! The in-memory, possibly cyclic entity graph the decomposer walks and the
//! hydrator builds.
//!
//! Every entity carries an explicit type tag resolvable without reflection;
//! relations are arena handles ([`EntityId`]), so the same logical entity can
//! be shared by many fields and self-referential relations are representable
//! without ownership cycles.

use crate::types::Scalar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Handle to an entity inside an [`ObjectGraph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// One field value of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// A scalar leaf.
    Scalar(Scalar),
    /// A to-one relation.
    Object(EntityId),
    /// A to-many relation. Arrays are transparent in the path grammar.
    List(Vec<EntityId>),
}

/// A typed entity instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Explicit runtime type tag; used to pick metadata and build tokens.
    pub type_name: String,
    /// Field values, deterministically ordered.
    pub fields: BTreeMap<String, Value>,
}

impl Entity {
    /// Create an empty entity of the given type.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a scalar field (builder style).
    #[must_use]
    pub fn scalar(mut self, field: impl Into<String>, value: Scalar) -> Self {
        self.fields.insert(field.into(), Value::Scalar(value));
        self
    }

    /// Set a to-one relation field (builder style).
    #[must_use]
    pub fn object(mut self, field: impl Into<String>, target: EntityId) -> Self {
        self.fields.insert(field.into(), Value::Object(target));
        self
    }

    /// Set a to-many relation field (builder style).
    #[must_use]
    pub fn list(mut self, field: impl Into<String>, targets: Vec<EntityId>) -> Self {
        self.fields.insert(field.into(), Value::List(targets));
        self
    }

    /// The scalar value of a field, if the field is scalar.
    #[must_use]
    pub fn scalar_field(&self, field: &str) -> Option<&Scalar> {
        match self.fields.get(field) {
            Some(Value::Scalar(s)) => Some(s),
            _ => None,
        }
    }
}

/// Arena of entities, supporting cycles and shared references.
///
/// Walks over the graph perform no I/O; the graph must already be hydrated
/// (see [`crate::hydrate`]) before decomposition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectGraph {
    entities: BTreeMap<u64, Entity>,
    next_id: u64,
}

impl ObjectGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity, returning its handle.
    pub fn insert(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.insert(id.0, entity);
        id
    }

    /// Look up an entity by handle.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id.0)
    }

    /// Mutable lookup, used by the decomposer's synthesized-key fallback.
    #[must_use]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id.0)
    }

    /// Overwrite one field of an entity. No-op if the handle is stale.
    pub fn set_field(&mut self, id: EntityId, field: impl Into<String>, value: Value) {
        if let Some(entity) = self.entities.get_mut(&id.0) {
            entity.fields.insert(field.into(), value);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
