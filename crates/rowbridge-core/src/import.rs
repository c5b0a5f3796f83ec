//! # Importer
//!
//! Applies a parsed action list against the persistence provider, resolving
//! rows by natural/unique keys rather than surrogate IDs.
//!
//! Actions are applied strictly in document order, and rows within an action
//! strictly in document order: later rows may reference entities created by
//! earlier ones. There is no retry state; a persistence or resolution
//! failure aborts the whole call, since a partial import would leave
//! referential relations half-resolved.

use crate::meta::{MetaProvider, TypeMeta};
use crate::primitives::{MAX_ACTION_ROWS, MAX_DOCUMENT_ACTIONS};
use crate::store::{EntityStore, Record, filter_literal};
use crate::types::{
    Action, ActionKind, AuditEvent, BridgeError, ImportSummary, Row, RowValue, Scalar, StoredValue,
};
use std::collections::BTreeMap;

// =============================================================================
// ASSET COLLABORATORS
// =============================================================================

/// External collaborator for media/file rows.
///
/// The bridge never stores binary payloads itself; it delegates to the
/// collaborator's create-or-update operation keyed by an optional natural
/// `code`, passing the row's payload path and localized-name pairs.
pub trait AssetSink {
    fn upsert_media(
        &mut self,
        code: Option<&str>,
        payload: &str,
        names: &[(String, String)],
    ) -> Result<(), BridgeError>;

    fn upsert_file(
        &mut self,
        code: Option<&str>,
        payload: &str,
        names: &[(String, String)],
    ) -> Result<(), BridgeError>;
}

/// Counting no-op collaborator, used by tests and the CLI default wiring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullAssets {
    pub media: usize,
    pub files: usize,
}

impl AssetSink for NullAssets {
    fn upsert_media(
        &mut self,
        _code: Option<&str>,
        _payload: &str,
        _names: &[(String, String)],
    ) -> Result<(), BridgeError> {
        self.media += 1;
        Ok(())
    }

    fn upsert_file(
        &mut self,
        _code: Option<&str>,
        _payload: &str,
        _names: &[(String, String)],
    ) -> Result<(), BridgeError> {
        self.files += 1;
        Ok(())
    }
}

// =============================================================================
// IMPORTER
// =============================================================================

/// The importer applies upserts, removals and asset delegation.
pub struct Importer;

impl Importer {
    /// Apply an import document. Returns counters plus the audit trail; any
    /// error means a prefix of the actions may have been applied and the
    /// call must be treated as a hard failure.
    pub fn import_document<S: EntityStore, M: MetaProvider>(
        store: &mut S,
        meta: &M,
        assets: &mut dyn AssetSink,
        actions: &[Action],
    ) -> Result<ImportSummary, BridgeError> {
        if actions.len() > MAX_DOCUMENT_ACTIONS {
            return Err(BridgeError::InvalidDocument(format!(
                "document holds {} actions, limit is {MAX_DOCUMENT_ACTIONS}",
                actions.len()
            )));
        }

        let mut summary = ImportSummary::new();
        for action in actions {
            if action.rows.len() > MAX_ACTION_ROWS {
                return Err(BridgeError::InvalidDocument(format!(
                    "action on '{}' holds {} rows, limit is {MAX_ACTION_ROWS}",
                    action.target,
                    action.rows.len()
                )));
            }
            match action.kind {
                ActionKind::InsertUpdate => {
                    Self::apply_insert_update(store, meta, action, &mut summary)?;
                }
                ActionKind::Remove => Self::apply_remove(store, meta, action, &mut summary)?,
                ActionKind::Media | ActionKind::File => {
                    Self::apply_asset(assets, action, &mut summary)?;
                }
            }
        }
        Ok(summary)
    }

    // =========================================================================
    // INSERT / UPDATE
    // =========================================================================

    fn apply_insert_update<S: EntityStore, M: MetaProvider>(
        store: &mut S,
        meta: &M,
        action: &Action,
        summary: &mut ImportSummary,
    ) -> Result<(), BridgeError> {
        let tmeta = meta.type_meta(&action.target)?;
        tmeta.validate()?;

        for row in &action.rows {
            let resolved = Self::resolve_row(store, meta, tmeta, row)?;

            // Unique-key filter: the subset of the row's fields whose column
            // is marked unique (fields absent from the row are skipped).
            let mut filter = BTreeMap::new();
            for (field, value) in &resolved {
                if tmeta.is_unique(field) {
                    if let StoredValue::One(scalar) = value {
                        filter.insert(field.clone(), scalar.clone());
                    }
                }
            }

            let existing = if filter.is_empty() {
                None
            } else {
                store.find_one(&action.target, &filter)?
            };

            match existing {
                Some(mut record) => {
                    // Patch, not replace: only fields present in the row
                    // overwrite the existing record.
                    record.merge(resolved);
                    let saved = store.save(record, &tmeta.primary_key)?;
                    summary.record_updated(
                        &action.target,
                        Self::key_literal(&saved, tmeta),
                        filter_literal(&filter),
                    );
                }
                None => {
                    let mut record = Record::new(&action.target);
                    record.merge(resolved);
                    let saved = store.save(record, &tmeta.primary_key)?;
                    summary.record_created(
                        &action.target,
                        Self::key_literal(&saved, tmeta),
                        filter_literal(&filter),
                    );
                }
            }
        }
        Ok(())
    }

    fn key_literal(record: &Record, tmeta: &TypeMeta) -> String {
        record
            .scalar(&tmeta.primary_key)
            .map_or_else(|| "?".to_string(), Scalar::to_literal)
    }

    // =========================================================================
    // REMOVE
    // =========================================================================

    fn apply_remove<S: EntityStore, M: MetaProvider>(
        store: &mut S,
        meta: &M,
        action: &Action,
        summary: &mut ImportSummary,
    ) -> Result<(), BridgeError> {
        let tmeta = meta.type_meta(&action.target)?;
        tmeta.validate()?;

        for row in &action.rows {
            // Equality filter from EVERY resolvable field present in the row,
            // not limited to unique columns.
            let mut filter = BTreeMap::new();
            for (field, value) in Self::resolve_row(store, meta, tmeta, row)? {
                if let StoredValue::One(scalar) = value {
                    filter.insert(field, scalar);
                }
            }

            if filter.is_empty() {
                // Never attempt an unconditioned delete.
                summary.warn(AuditEvent::RemoveSkipped {
                    target: action.target.clone(),
                });
                continue;
            }

            match store.find_one(&action.target, &filter)? {
                Some(record) => {
                    let key = record.scalar(&tmeta.primary_key).cloned().ok_or_else(|| {
                        BridgeError::Configuration(format!(
                            "stored '{}' record lacks primary key '{}'",
                            action.target, tmeta.primary_key
                        ))
                    })?;
                    store.delete(&action.target, &tmeta.primary_key, &key)?;
                    summary.record_removed(&action.target, filter_literal(&filter));
                }
                None => {
                    // Removal of a non-existent record is not an error.
                    summary.warn(AuditEvent::RemoveMissed {
                        target: action.target.clone(),
                        filter: filter_literal(&filter),
                    });
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // MEDIA / FILE
    // =========================================================================

    fn apply_asset(
        assets: &mut dyn AssetSink,
        action: &Action,
        summary: &mut ImportSummary,
    ) -> Result<(), BridgeError> {
        for row in &action.rows {
            let payload = row.text("path").ok_or_else(|| {
                BridgeError::InvalidDocument(format!(
                    "{} row is missing its 'path' payload field",
                    action.target
                ))
            })?;
            let code = row.text("code");
            let names: Vec<(String, String)> = row
                .fields
                .iter()
                .filter(|(name, _)| name != "path" && name != "code")
                .filter_map(|(name, value)| match value {
                    RowValue::Scalar(Scalar::Text(text)) => Some((name.clone(), text.clone())),
                    _ => None,
                })
                .collect();

            match action.kind {
                ActionKind::Media => assets.upsert_media(code, payload, &names)?,
                _ => assets.upsert_file(code, payload, &names)?,
            }
            summary.record_asset(&action.target, code.map(str::to_string));
        }
        Ok(())
    }

    // =========================================================================
    // ROW RESOLUTION
    // =========================================================================

    /// Resolve every field of a row into its persisted form: scalars are
    /// literal-coerced, references become the related record's primary key.
    fn resolve_row<S: EntityStore, M: MetaProvider>(
        store: &S,
        meta: &M,
        tmeta: &TypeMeta,
        row: &Row,
    ) -> Result<Vec<(String, StoredValue)>, BridgeError> {
        let mut resolved = Vec::with_capacity(row.len());
        for (field, value) in &row.fields {
            let stored = match value {
                RowValue::Scalar(scalar) => StoredValue::One(scalar.clone().coerce_literal()),
                RowValue::Ref {
                    key_field,
                    key_value,
                } => {
                    let relation = tmeta.relation(field).ok_or_else(|| {
                        BridgeError::Configuration(format!(
                            "field '{field}' on '{}' carries a reference but is not a relation",
                            tmeta.name
                        ))
                    })?;
                    let target_meta = meta.type_meta(&relation.target)?;
                    let record =
                        Self::lookup_by_key(store, &relation.target, key_field, key_value)?
                            .ok_or_else(|| BridgeError::Resolution {
                                target: relation.target.clone(),
                                detail: format!("{key_field}={key_value}"),
                            })?;
                    StoredValue::One(Self::primary_key_of(&record, target_meta)?)
                }
                RowValue::RefList {
                    key_field,
                    key_values,
                } => {
                    let relation = tmeta.relation(field).ok_or_else(|| {
                        BridgeError::Configuration(format!(
                            "field '{field}' on '{}' carries references but is not a relation",
                            tmeta.name
                        ))
                    })?;
                    let target_meta = meta.type_meta(&relation.target)?;
                    let records = Self::lookup_many_by_key(
                        store,
                        &relation.target,
                        key_field,
                        key_values,
                    )?;
                    let mut keys = Vec::with_capacity(records.len());
                    for record in &records {
                        keys.push(Self::primary_key_of(record, target_meta)?);
                    }
                    StoredValue::Many(keys)
                }
            };
            resolved.push((field.clone(), stored));
        }
        Ok(resolved)
    }

    fn primary_key_of(record: &Record, tmeta: &TypeMeta) -> Result<Scalar, BridgeError> {
        record
            .scalar(&tmeta.primary_key)
            .cloned()
            .ok_or_else(|| {
                BridgeError::Configuration(format!(
                    "stored '{}' record lacks primary key '{}'",
                    tmeta.name, tmeta.primary_key
                ))
            })
    }

    /// Equality lookup by a textual key value. Key values travel as text in
    /// the wire format, so an integer-keyed column is retried with the
    /// parsed integer.
    fn lookup_by_key<S: EntityStore>(
        store: &S,
        target: &str,
        key_field: &str,
        key_value: &str,
    ) -> Result<Option<Record>, BridgeError> {
        let mut filter = BTreeMap::new();
        filter.insert(key_field.to_string(), Scalar::Text(key_value.to_string()));
        if let Some(record) = store.find_one(target, &filter)? {
            return Ok(Some(record));
        }
        if let Ok(int) = key_value.parse::<i64>() {
            filter.insert(key_field.to_string(), Scalar::Int(int));
            return store.find_one(target, &filter);
        }
        Ok(None)
    }

    /// IN-list lookup; every requested value must resolve.
    fn lookup_many_by_key<S: EntityStore>(
        store: &S,
        target: &str,
        key_field: &str,
        key_values: &[String],
    ) -> Result<Vec<Record>, BridgeError> {
        let text_values: Vec<Scalar> = key_values
            .iter()
            .map(|v| Scalar::Text(v.clone()))
            .collect();
        let found = store.find_many(target, key_field, &text_values)?;
        let mut by_literal: BTreeMap<String, Record> = found
            .into_iter()
            .filter_map(|r| {
                r.scalar(key_field)
                    .map(|k| (k.to_literal(), r.clone()))
            })
            .collect();

        let mut records = Vec::with_capacity(key_values.len());
        for key_value in key_values {
            match by_literal.remove(key_value) {
                Some(record) => records.push(record),
                None => {
                    // Retry the stragglers individually (integer-keyed
                    // columns don't match textual IN values).
                    let record = Self::lookup_by_key(store, target, key_field, key_value)?
                        .ok_or_else(|| BridgeError::Resolution {
                            target: target.to_string(),
                            detail: format!("{key_field}={key_value}"),
                        })?;
                    records.push(record);
                }
            }
        }
        Ok(records)
    }
}

// =============================================================================
// TESTS
// =============================================================================
