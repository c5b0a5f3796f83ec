//! # Hydration
//!
//! Loads a stored record and its relation closure into a live `ObjectGraph`,
//! depth-limited and cycle-safe. Hydration is the inverse seam of
//! decomposition: the graph it produces is what `decompose` walks.
//!
//! Visited bookkeeping is keyed by (type, primary key literal) and entries
//! are registered BEFORE their relations are loaded, so mutually-referencing
//! records come back as a cycle of shared handles rather than an infinite
//! recursion.

use crate::entity::{Entity, EntityId, ObjectGraph, Value};
use crate::meta::MetaProvider;
use crate::store::{EntityStore, Record};
use crate::types::{BridgeError, Scalar, StoredValue};
use std::collections::BTreeMap;

/// Load the entity identified by `key_field = key` and its relation closure
/// up to `depth` hops. Returns the populated graph and the root handle.
///
/// Relations beyond the depth limit are dropped from the entity, never
/// surfaced as raw stored key scalars. Stored references whose target record
/// no longer exists are likewise dropped; hydration is best-effort on
/// dangling data but hard-fails on metadata gaps.
pub fn hydrate<S: EntityStore, M: MetaProvider>(
    store: &S,
    meta: &M,
    target: &str,
    key_field: &str,
    key: &Scalar,
    depth: usize,
) -> Result<(ObjectGraph, EntityId), BridgeError> {
    let mut filter = BTreeMap::new();
    filter.insert(key_field.to_string(), key.clone());
    let record = store
        .find_one(target, &filter)?
        .ok_or_else(|| BridgeError::Resolution {
            target: target.to_string(),
            detail: format!("{key_field}={}", key.to_literal()),
        })?;

    let mut graph = ObjectGraph::new();
    let mut visited = BTreeMap::new();
    let root = load_entity(store, meta, &mut graph, &mut visited, &record, depth)?;
    Ok((graph, root))
}

type Visited = BTreeMap<(String, String), EntityId>;

fn load_entity<S: EntityStore, M: MetaProvider>(
    store: &S,
    meta: &M,
    graph: &mut ObjectGraph,
    visited: &mut Visited,
    record: &Record,
    depth: usize,
) -> Result<EntityId, BridgeError> {
    let tmeta = meta.type_meta(&record.type_name)?;

    let identity = record
        .scalar(&tmeta.primary_key)
        .map(|pk| (record.type_name.clone(), pk.to_literal()));
    if let Some(identity) = &identity {
        if let Some(id) = visited.get(identity) {
            return Ok(*id);
        }
    }

    // Register the handle before descending so back-references land on it.
    let id = graph.insert(Entity::new(&record.type_name));
    if let Some(identity) = identity {
        visited.insert(identity, id);
    }

    for (field, stored) in &record.fields {
        match tmeta.relation(field) {
            None => {
                if let StoredValue::One(scalar) = stored {
                    graph.set_field(id, field, Value::Scalar(scalar.clone()));
                }
            }
            Some(relation) => {
                if depth == 0 {
                    continue;
                }
                let target_meta = meta.type_meta(&relation.target)?;
                match stored {
                    StoredValue::One(pk) => {
                        let mut filter = BTreeMap::new();
                        filter.insert(target_meta.primary_key.clone(), pk.clone());
                        if let Some(related) = store.find_one(&relation.target, &filter)? {
                            let child =
                                load_entity(store, meta, graph, visited, &related, depth - 1)?;
                            graph.set_field(id, field, Value::Object(child));
                        }
                    }
                    StoredValue::Many(pks) => {
                        let related =
                            store.find_many(&relation.target, &target_meta.primary_key, pks)?;
                        let mut children = Vec::with_capacity(related.len());
                        for record in &related {
                            children
                                .push(load_entity(store, meta, graph, visited, record, depth - 1)?);
                        }
                        graph.set_field(id, field, Value::List(children));
                    }
                }
            }
        }
    }
    Ok(id)
}

// =============================================================================
// TESTS
// =============================================================================
