//! # Persistence Provider
//!
//! The persistence capability is injected, never implemented as an ORM: the
//! engine only needs find-one by field-equality, find-many by field-IN-list,
//! persist and delete. [`MemStore`] is the volatile in-memory implementation
//! (also the test double); the disk-backed implementation lives in
//! [`crate::storage`].

use crate::types::{BridgeError, Scalar, StoredValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// RECORD
// =============================================================================

/// One persisted record of some entity type.
///
/// Relation fields hold the related record's key value(s) as scalars; live
/// references exist only inside an [`crate::entity::ObjectGraph`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub type_name: String,
    pub fields: BTreeMap<String, StoredValue>,
}

impl Record {
    /// Create an empty record of the given type.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a single-valued field (builder style).
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: Scalar) -> Self {
        self.fields.insert(field.into(), StoredValue::One(value));
        self
    }

    /// The scalar in a single-valued field, if present.
    #[must_use]
    pub fn scalar(&self, field: &str) -> Option<&Scalar> {
        self.fields.get(field).and_then(StoredValue::as_one)
    }

    /// Merge another field set into this record: every incoming field
    /// overwrites; fields absent from the incoming set are left untouched.
    /// This is a patch, not a replace.
    pub fn merge(&mut self, fields: impl IntoIterator<Item = (String, StoredValue)>) {
        for (name, value) in fields {
            self.fields.insert(name, value);
        }
    }

    /// Whether the record matches an equality filter (logical AND over every
    /// filter field, compared against single-valued slots).
    #[must_use]
    pub fn matches(&self, filter: &BTreeMap<String, Scalar>) -> bool {
        filter
            .iter()
            .all(|(field, expected)| self.scalar(field) == Some(expected))
    }
}

/// Deterministic rendering of an equality filter, for audit events and
/// error messages.
#[must_use]
pub fn filter_literal(filter: &BTreeMap<String, Scalar>) -> String {
    let parts: Vec<String> = filter
        .iter()
        .map(|(field, value)| format!("{field}={}", value.to_literal()))
        .collect();
    parts.join(", ")
}

// =============================================================================
// ENTITY STORE
// =============================================================================

/// The injected persistence capability.
///
/// Individual operations may block on I/O; the engine calls them strictly in
/// document order and never overlaps writes to the same target type within
/// one import call.
pub trait EntityStore {
    /// Find one record by an equality filter (logical AND on every field).
    fn find_one(
        &self,
        type_name: &str,
        filter: &BTreeMap<String, Scalar>,
    ) -> Result<Option<Record>, BridgeError>;

    /// Find records whose `field` equals any of `values`.
    ///
    /// The result is ordered to match `values`; values that matched nothing
    /// are simply absent from the result.
    fn find_many(
        &self,
        type_name: &str,
        field: &str,
        values: &[Scalar],
    ) -> Result<Vec<Record>, BridgeError>;

    /// Persist a record (create or update), keyed by `key_field`.
    ///
    /// When the record carries no value under `key_field`, the store assigns
    /// a sequential integer key. Returns the record as persisted.
    fn save(&mut self, record: Record, key_field: &str) -> Result<Record, BridgeError>;

    /// Delete the record whose `key_field` equals `key`. Returns whether a
    /// record existed.
    fn delete(&mut self, type_name: &str, key_field: &str, key: &Scalar)
    -> Result<bool, BridgeError>;

    /// Number of records stored for a type.
    fn count(&self, type_name: &str) -> Result<usize, BridgeError>;

    /// Type names with at least one stored record, sorted.
    fn type_names(&self) -> Result<Vec<String>, BridgeError>;
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// In-memory `EntityStore`: per-type tables keyed by the key value's stable
/// literal, plus per-type counters for assigned keys.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    tables: BTreeMap<String, BTreeMap<String, Record>>,
    counters: BTreeMap<String, i64>,
}

impl MemStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records across all types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.values().all(BTreeMap::is_empty)
    }
}

impl EntityStore for MemStore {
    fn find_one(
        &self,
        type_name: &str,
        filter: &BTreeMap<String, Scalar>,
    ) -> Result<Option<Record>, BridgeError> {
        let Some(table) = self.tables.get(type_name) else {
            return Ok(None);
        };
        Ok(table.values().find(|r| r.matches(filter)).cloned())
    }

    fn find_many(
        &self,
        type_name: &str,
        field: &str,
        values: &[Scalar],
    ) -> Result<Vec<Record>, BridgeError> {
        let Some(table) = self.tables.get(type_name) else {
            return Ok(Vec::new());
        };
        let mut found = Vec::new();
        for value in values {
            if let Some(record) = table
                .values()
                .find(|r| r.scalar(field) == Some(value))
                .cloned()
            {
                found.push(record);
            }
        }
        Ok(found)
    }

    fn save(&mut self, mut record: Record, key_field: &str) -> Result<Record, BridgeError> {
        let key = match record.scalar(key_field) {
            Some(key) => key.clone(),
            None => {
                let counter = self.counters.entry(record.type_name.clone()).or_insert(0);
                *counter += 1;
                let key = Scalar::Int(*counter);
                record
                    .fields
                    .insert(key_field.to_string(), StoredValue::One(key.clone()));
                key
            }
        };
        self.tables
            .entry(record.type_name.clone())
            .or_default()
            .insert(key.to_literal(), record.clone());
        Ok(record)
    }

    fn delete(
        &mut self,
        type_name: &str,
        _key_field: &str,
        key: &Scalar,
    ) -> Result<bool, BridgeError> {
        Ok(self
            .tables
            .get_mut(type_name)
            .is_some_and(|table| table.remove(&key.to_literal()).is_some()))
    }

    fn count(&self, type_name: &str) -> Result<usize, BridgeError> {
        Ok(self.tables.get(type_name).map_or(0, BTreeMap::len))
    }

    fn type_names(&self) -> Result<Vec<String>, BridgeError> {
        Ok(self
            .tables
            .iter()
            .filter(|(_, table)| !table.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn category(code: &str, name: &str) -> Record {
        Record::new("Category")
            .with("code", Scalar::Text(code.into()))
            .with("name", Scalar::Text(name.into()))
    }

    #[test]
    fn save_assigns_key_when_absent() {
        let mut store = MemStore::new();
        let saved = store.save(category("a", "Alpha"), "id").expect("save");
        assert_eq!(saved.scalar("id"), Some(&Scalar::Int(1)));

        let saved = store.save(category("b", "Beta"), "id").expect("save");
        assert_eq!(saved.scalar("id"), Some(&Scalar::Int(2)));
    }

    #[test]
    fn save_with_key_upserts_in_place() {
        let mut store = MemStore::new();
        let first = store.save(category("a", "Alpha"), "id").expect("save");
        let key = first.scalar("id").expect("key").clone();

        let mut patched = first.clone();
        patched
            .fields
            .insert("name".into(), StoredValue::One(Scalar::Text("Alpha2".into())));
        store.save(patched, "id").expect("save");

        assert_eq!(store.count("Category").expect("count"), 1);
        let mut filter = BTreeMap::new();
        filter.insert("id".to_string(), key);
        let found = store.find_one("Category", &filter).expect("find").expect("record");
        assert_eq!(found.scalar("name"), Some(&Scalar::Text("Alpha2".into())));
    }

    #[test]
    fn find_one_requires_every_filter_field() {
        let mut store = MemStore::new();
        store.save(category("a", "Alpha"), "id").expect("save");

        let mut filter = BTreeMap::new();
        filter.insert("code".to_string(), Scalar::Text("a".into()));
        filter.insert("name".to_string(), Scalar::Text("WRONG".into()));
        assert!(store.find_one("Category", &filter).expect("find").is_none());

        filter.insert("name".to_string(), Scalar::Text("Alpha".into()));
        assert!(store.find_one("Category", &filter).expect("find").is_some());
    }

    #[test]
    fn find_many_preserves_request_order() {
        let mut store = MemStore::new();
        store.save(category("a", "Alpha"), "id").expect("save");
        store.save(category("b", "Beta"), "id").expect("save");

        let values = vec![Scalar::Text("b".into()), Scalar::Text("a".into())];
        let found = store.find_many("Category", "code", &values).expect("find");
        let codes: Vec<_> = found
            .iter()
            .map(|r| r.scalar("code").expect("code").to_literal())
            .collect();
        assert_eq!(codes, vec!["b", "a"]);
    }

    #[test]
    fn delete_reports_existence() {
        let mut store = MemStore::new();
        let saved = store.save(category("a", "Alpha"), "id").expect("save");
        let key = saved.scalar("id").expect("key").clone();

        assert!(store.delete("Category", "id", &key).expect("delete"));
        assert!(!store.delete("Category", "id", &key).expect("delete"));
        assert_eq!(store.count("Category").expect("count"), 0);
    }

    #[test]
    fn merge_is_a_patch_not_a_replace() {
        let mut record = category("a", "Alpha");
        record.merge(vec![(
            "name".to_string(),
            StoredValue::One(Scalar::Text("Alpha2".into())),
        )]);
        assert_eq!(record.scalar("name"), Some(&Scalar::Text("Alpha2".into())));
        // Untouched field survives.
        assert_eq!(record.scalar("code"), Some(&Scalar::Text("a".into())));
    }
}
