//! # Bridge Facade
//!
//! The top-level entry point tying metadata, storage, the importer and the
//! decomposer together behind one session-like handle. Callers pick a
//! storage backend once; every operation then dispatches through it.

use crate::decompose::decompose;
use crate::formats::{Element, decode_document, render_export};
use crate::hydrate::hydrate;
use crate::import::{AssetSink, Importer, NullAssets};
use crate::meta::{MetaProvider, TypeMeta, TypeRegistry};
use crate::primitives::MAX_EXPORT_DEPTH;
use crate::store::{EntityStore, MemStore, Record};
use crate::storage::RedbStore;
use crate::types::{Action, BridgeError, DecomposedNode, ImportSummary, Scalar};
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Where the bridge keeps its records.
#[derive(Debug)]
pub enum StorageBackend {
    /// Volatile store, gone when the bridge is dropped.
    InMemory(MemStore),
    /// Durable redb-backed store.
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemStore::new())
    }
}

impl EntityStore for StorageBackend {
    fn find_one(
        &self,
        type_name: &str,
        filter: &BTreeMap<String, Scalar>,
    ) -> Result<Option<Record>, BridgeError> {
        match self {
            Self::InMemory(store) => store.find_one(type_name, filter),
            Self::Persistent(store) => store.find_one(type_name, filter),
        }
    }

    fn find_many(
        &self,
        type_name: &str,
        field: &str,
        values: &[Scalar],
    ) -> Result<Vec<Record>, BridgeError> {
        match self {
            Self::InMemory(store) => store.find_many(type_name, field, values),
            Self::Persistent(store) => store.find_many(type_name, field, values),
        }
    }

    fn save(&mut self, record: Record, key_field: &str) -> Result<Record, BridgeError> {
        match self {
            Self::InMemory(store) => store.save(record, key_field),
            Self::Persistent(store) => store.save(record, key_field),
        }
    }

    fn delete(
        &mut self,
        type_name: &str,
        key_field: &str,
        key: &Scalar,
    ) -> Result<bool, BridgeError> {
        match self {
            Self::InMemory(store) => store.delete(type_name, key_field, key),
            Self::Persistent(store) => store.delete(type_name, key_field, key),
        }
    }

    fn count(&self, type_name: &str) -> Result<usize, BridgeError> {
        match self {
            Self::InMemory(store) => store.count(type_name),
            Self::Persistent(store) => store.count(type_name),
        }
    }

    fn type_names(&self) -> Result<Vec<String>, BridgeError> {
        match self {
            Self::InMemory(store) => store.type_names(),
            Self::Persistent(store) => store.type_names(),
        }
    }
}

// =============================================================================
// RESULT TYPES
// =============================================================================

/// One successful export: the ordered node list and its rendered document.
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub nodes: Vec<DecomposedNode>,
    pub xml: String,
}

/// Per-type record counts for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeStatus {
    pub types: BTreeMap<String, usize>,
    pub total: usize,
}

// =============================================================================
// BRIDGE
// =============================================================================

/// A configured bridge instance.
pub struct Bridge {
    backend: StorageBackend,
    registry: TypeRegistry,
}

impl Bridge {
    /// In-memory bridge over the given type registry.
    #[must_use]
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            backend: StorageBackend::default(),
            registry,
        }
    }

    /// Durable bridge backed by a redb file at `path`.
    pub fn with_redb(path: impl AsRef<Path>, registry: TypeRegistry) -> Result<Self, BridgeError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbStore::open(path)?),
            registry,
        })
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    // =========================================================================
    // IMPORT
    // =========================================================================

    /// Apply an action list with the default (counting) asset collaborator.
    pub fn import_document(&mut self, actions: &[Action]) -> Result<ImportSummary, BridgeError> {
        let mut assets = NullAssets::default();
        self.import_with_assets(actions, &mut assets)
    }

    /// Apply an action list, delegating media/file rows to `assets`.
    pub fn import_with_assets(
        &mut self,
        actions: &[Action],
        assets: &mut dyn AssetSink,
    ) -> Result<ImportSummary, BridgeError> {
        Importer::import_document(&mut self.backend, &self.registry, assets, actions)
    }

    /// Decode a document tree and apply it.
    pub fn import_element(&mut self, root: &Element) -> Result<ImportSummary, BridgeError> {
        let actions = decode_document(root)?;
        self.import_document(&actions)
    }

    // =========================================================================
    // EXPORT
    // =========================================================================

    /// Hydrate the entity identified by `key`, decompose it and render the
    /// result. `key` is matched against the type's first unique column and
    /// falls back to the primary key, textual then numeric.
    pub fn export(
        &self,
        target: &str,
        key: &str,
        depth: usize,
    ) -> Result<ExportResult, BridgeError> {
        let depth = depth.min(MAX_EXPORT_DEPTH);
        let tmeta = self.registry.type_meta(target)?;
        let (key_field, key_scalar) = self.resolve_export_key(tmeta, key)?;

        let (mut graph, root) = hydrate(
            &self.backend,
            &self.registry,
            target,
            &key_field,
            &key_scalar,
            depth,
        )?;
        let nodes = decompose(&mut graph, root, &self.registry)?;
        let xml = render_export(&nodes);
        Ok(ExportResult { nodes, xml })
    }

    fn resolve_export_key(
        &self,
        tmeta: &TypeMeta,
        key: &str,
    ) -> Result<(String, Scalar), BridgeError> {
        let mut probes: Vec<(String, Scalar)> = Vec::new();
        if let Some(unique) = tmeta.unique.first() {
            probes.push((unique.clone(), Scalar::Text(key.to_string())));
        }
        probes.push((tmeta.primary_key.clone(), Scalar::Text(key.to_string())));
        if let Ok(int) = key.parse::<i64>() {
            probes.push((tmeta.primary_key.clone(), Scalar::Int(int)));
        }

        for (field, scalar) in &probes {
            let mut filter = BTreeMap::new();
            filter.insert(field.clone(), scalar.clone());
            if self.backend.find_one(&tmeta.name, &filter)?.is_some() {
                return Ok((field.clone(), scalar.clone()));
            }
        }
        Err(BridgeError::Resolution {
            target: tmeta.name.clone(),
            detail: format!("key={key}"),
        })
    }

    // =========================================================================
    // STATUS
    // =========================================================================

    pub fn status(&self) -> Result<BridgeStatus, BridgeError> {
        let mut types = BTreeMap::new();
        let mut total = 0;
        for type_name in self.backend.type_names()? {
            let count = self.backend.count(&type_name)?;
            total += count;
            types.insert(type_name, count);
        }
        Ok(BridgeStatus { types, total })
    }
}

// =============================================================================
// TESTS
// =============================================================================
