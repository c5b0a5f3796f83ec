//! # redb-backed Entity Store
//!
//! A disk-backed [`EntityStore`] using the redb embedded database:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! Records are postcard-serialized and keyed by `(type name, key literal)`;
//! per-type counters for store-assigned keys live in a separate table.

use crate::store::{EntityStore, Record};
use crate::types::{BridgeError, Scalar};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::BTreeMap;
use std::path::Path;

/// Table for records: (type name, key literal) -> postcard Record bytes.
const RECORDS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("records");

/// Table for store-assigned key counters: type name -> last assigned key.
const COUNTERS: TableDefinition<&str, i64> = TableDefinition::new("counters");

fn db_err(e: impl std::fmt::Display) -> BridgeError {
    BridgeError::Persistence(e.to_string())
}

/// A disk-backed entity store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let db = Database::create(path.as_ref()).map_err(db_err)?;

        // Initialize tables so later read transactions never miss them.
        {
            let write_txn = db.begin_write().map_err(db_err)?;
            let _ = write_txn.open_table(RECORDS).map_err(db_err)?;
            let _ = write_txn.open_table(COUNTERS).map_err(db_err)?;
            write_txn.commit().map_err(db_err)?;
        }

        Ok(Self { db })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), BridgeError> {
        self.db.compact().map_err(db_err)?;
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Record, BridgeError> {
        postcard::from_bytes(bytes).map_err(|e| BridgeError::Serialization(e.to_string()))
    }

    fn encode(record: &Record) -> Result<Vec<u8>, BridgeError> {
        postcard::to_allocvec(record).map_err(|e| BridgeError::Serialization(e.to_string()))
    }

    /// Scan all records of one type, in key-literal order.
    fn scan(&self, type_name: &str) -> Result<Vec<Record>, BridgeError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(RECORDS).map_err(db_err)?;

        let mut records = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (key, value) = entry.map_err(db_err)?;
            if key.value().0 == type_name {
                records.push(Self::decode(value.value())?);
            }
        }
        Ok(records)
    }
}

impl EntityStore for RedbStore {
    fn find_one(
        &self,
        type_name: &str,
        filter: &BTreeMap<String, Scalar>,
    ) -> Result<Option<Record>, BridgeError> {
        Ok(self
            .scan(type_name)?
            .into_iter()
            .find(|r| r.matches(filter)))
    }

    fn find_many(
        &self,
        type_name: &str,
        field: &str,
        values: &[Scalar],
    ) -> Result<Vec<Record>, BridgeError> {
        let records = self.scan(type_name)?;
        let mut found = Vec::new();
        for value in values {
            if let Some(record) = records.iter().find(|r| r.scalar(field) == Some(value)) {
                found.push(record.clone());
            }
        }
        Ok(found)
    }

    fn save(&mut self, mut record: Record, key_field: &str) -> Result<Record, BridgeError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        {
            let key = match record.scalar(key_field) {
                Some(key) => key.clone(),
                None => {
                    let mut counters = write_txn.open_table(COUNTERS).map_err(db_err)?;
                    let next = counters
                        .get(record.type_name.as_str())
                        .map_err(db_err)?
                        .map_or(0, |v| v.value())
                        + 1;
                    counters
                        .insert(record.type_name.as_str(), next)
                        .map_err(db_err)?;
                    let key = Scalar::Int(next);
                    record.fields.insert(
                        key_field.to_string(),
                        crate::types::StoredValue::One(key.clone()),
                    );
                    key
                }
            };

            let mut records = write_txn.open_table(RECORDS).map_err(db_err)?;
            let bytes = Self::encode(&record)?;
            records
                .insert(
                    (record.type_name.as_str(), key.to_literal().as_str()),
                    bytes.as_slice(),
                )
                .map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;
        Ok(record)
    }

    fn delete(
        &mut self,
        type_name: &str,
        _key_field: &str,
        key: &Scalar,
    ) -> Result<bool, BridgeError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut records = write_txn.open_table(RECORDS).map_err(db_err)?;
            records
                .remove((type_name, key.to_literal().as_str()))
                .map_err(db_err)?
                .is_some()
        };
        write_txn.commit().map_err(db_err)?;
        Ok(removed)
    }

    fn count(&self, type_name: &str) -> Result<usize, BridgeError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(RECORDS).map_err(db_err)?;

        let mut count = 0;
        for entry in table.iter().map_err(db_err)? {
            let (key, _) = entry.map_err(db_err)?;
            if key.value().0 == type_name {
                count += 1;
            }
        }
        Ok(count)
    }

    fn type_names(&self) -> Result<Vec<String>, BridgeError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(RECORDS).map_err(db_err)?;

        let mut names: Vec<String> = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (key, _) = entry.map_err(db_err)?;
            let type_name = key.value().0.to_string();
            // Keys iterate sorted, so duplicates are adjacent.
            if names.last() != Some(&type_name) {
                names.push(type_name);
            }
        }
        Ok(names)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, RedbStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RedbStore::open(dir.path().join("bridge.redb")).expect("open");
        (dir, store)
    }

    #[test]
    fn save_and_find_round_trip() {
        let (_dir, mut store) = temp_store();
        let record = Record::new("Category")
            .with("code", Scalar::Text("a".into()))
            .with("name", Scalar::Text("Alpha".into()));
        let saved = store.save(record, "id").expect("save");
        assert_eq!(saved.scalar("id"), Some(&Scalar::Int(1)));

        let mut filter = BTreeMap::new();
        filter.insert("code".to_string(), Scalar::Text("a".into()));
        let found = store
            .find_one("Category", &filter)
            .expect("find")
            .expect("record");
        assert_eq!(found, saved);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bridge.redb");

        {
            let mut store = RedbStore::open(&path).expect("open");
            store
                .save(Record::new("User").with("login", Scalar::Text("bob".into())), "id")
                .expect("save");
        }

        let store = RedbStore::open(&path).expect("reopen");
        assert_eq!(store.count("User").expect("count"), 1);
        assert_eq!(store.type_names().expect("names"), vec!["User".to_string()]);
    }

    #[test]
    fn assigned_keys_continue_after_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bridge.redb");

        {
            let mut store = RedbStore::open(&path).expect("open");
            store.save(Record::new("User"), "id").expect("save");
        }

        let mut store = RedbStore::open(&path).expect("reopen");
        let second = store.save(Record::new("User"), "id").expect("save");
        assert_eq!(second.scalar("id"), Some(&Scalar::Int(2)));
    }

    #[test]
    fn delete_removes_record() {
        let (_dir, mut store) = temp_store();
        let saved = store
            .save(Record::new("User").with("login", Scalar::Text("bob".into())), "id")
            .expect("save");
        let key = saved.scalar("id").expect("key").clone();

        assert!(store.delete("User", "id", &key).expect("delete"));
        assert!(!store.delete("User", "id", &key).expect("delete"));
        assert_eq!(store.count("User").expect("count"), 0);
    }
}
