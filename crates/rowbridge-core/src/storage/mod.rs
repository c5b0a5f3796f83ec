//! # Persistent Storage Backends
//!
//! Disk-backed implementations of [`crate::store::EntityStore`].

mod redb_store;

pub use redb_store::RedbStore;
