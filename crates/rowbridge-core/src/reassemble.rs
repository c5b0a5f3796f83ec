//! # Reassembly
//!
//! Turns a decomposed node list back into an import document and feeds it
//! through the importer. Because decomposition emits nodes in topological
//! order (children before parents), reassembly resolves every reference
//! token against a record that an earlier action already created.

use crate::import::{Importer, NullAssets};
use crate::meta::MetaProvider;
use crate::store::EntityStore;
use crate::token::ReferenceToken;
use crate::types::{
    Action, ActionKind, BridgeError, DecomposedNode, ImportSummary, Row, RowValue, Scalar,
    StoredValue,
};

/// Convert decomposed nodes into upsert actions, decoding reference tokens
/// back into key-based references.
///
/// Consecutive nodes of the same type share one action; the grouping never
/// reorders nodes, so topological ordering survives the conversion.
#[must_use]
pub fn actions_from_nodes(nodes: &[DecomposedNode]) -> Vec<Action> {
    let mut actions: Vec<Action> = Vec::new();
    for node in nodes {
        let row = row_from_node(node);
        match actions.last_mut() {
            Some(last) if last.target == node.type_name => last.rows.push(row),
            _ => actions.push(Action::new(ActionKind::InsertUpdate, &node.type_name).row(row)),
        }
    }
    actions
}

fn row_from_node(node: &DecomposedNode) -> Row {
    let mut row = Row::new();
    for (field, stored) in &node.data {
        let value = match stored {
            StoredValue::One(scalar) => match token_of(scalar) {
                Some(token) => RowValue::Ref {
                    key_field: token.key_field,
                    key_value: token.key_value,
                },
                None => RowValue::Scalar(scalar.clone()),
            },
            StoredValue::Many(scalars) => {
                let tokens: Vec<ReferenceToken> =
                    scalars.iter().filter_map(token_of).collect();
                match tokens.first() {
                    Some(first) => RowValue::RefList {
                        key_field: first.key_field.clone(),
                        key_values: tokens.iter().map(|t| t.key_value.clone()).collect(),
                    },
                    // A value list without a single decodable token has no
                    // flat-row representation; drop the field.
                    None => continue,
                }
            }
        };
        row = row.field(field, value);
    }
    row
}

fn token_of(scalar: &Scalar) -> Option<ReferenceToken> {
    match scalar {
        Scalar::Text(text) => ReferenceToken::decode(text),
        _ => None,
    }
}

/// Round-trip entry point: import a decomposed export into a store.
pub fn reassemble<S: EntityStore, M: MetaProvider>(
    store: &mut S,
    meta: &M,
    nodes: &[DecomposedNode],
) -> Result<ImportSummary, BridgeError> {
    let actions = actions_from_nodes(nodes);
    Importer::import_document(store, meta, &mut NullAssets::default(), &actions)
}

// =============================================================================
// TESTS
// =============================================================================
