//! # Decomposer (Export)
//!
//! Flattens an object graph rooted at one entity into an ordered,
//! deduplicated, cycle-free sequence of [`DecomposedNode`]s. Relations are
//! rewritten into reference tokens; no live reference survives into the
//! output, which is what makes the flattened stream replayable.
//!
//! Guarantees over the returned sequence:
//! - children are emitted before the parents that reference them; the root
//!   occupies the last position
//! - no two entries share both type and identity-key value
//! - a non-root node never carries a back-reference to the root: the field
//!   is elided outright rather than tokenized
//!
//! The walk is a pure, synchronous, single pass over an already-hydrated
//! graph; it performs no I/O. Export is best-effort inspection: a node whose
//! type has no metadata is treated as a leaf rather than failing the call.

use crate::entity::{EntityId, ObjectGraph, Value};
use crate::meta::MetaProvider;
use crate::primitives::ROOT_MARKER;
use crate::token::encode_token;
use crate::types::{BridgeError, DecomposedNode, Scalar, StoredValue};
use std::collections::{BTreeMap, BTreeSet};

/// One entry of the walk stack, before reference substitution.
struct WalkEntry {
    type_name: String,
    field_name: String,
    path: String,
    entity: EntityId,
}

/// Identity of an entity for deduplication: (type name, primary key literal).
///
/// Keyed by value, never by object identity: the same logical entity may be
/// reached through multiple live instances.
type Identity = (String, String);

/// Selected natural key of an entity: (key field, stringified key value).
type NaturalKey = (String, String);

/// A rendered node together with the reference edges it carries, kept
/// around until the final ordering pass.
struct Rendered {
    node: DecomposedNode,
    identity: Option<Identity>,
    refs: BTreeSet<Identity>,
}

fn identity_of<M: MetaProvider>(
    graph: &ObjectGraph,
    meta: &M,
    id: EntityId,
) -> Option<Identity> {
    let entity = graph.get(id)?;
    let tmeta = meta.lookup(&entity.type_name)?;
    let pk = entity.scalar_field(&tmeta.primary_key)?;
    Some((entity.type_name.clone(), pk.to_literal()))
}

/// Decompose the graph rooted at `root` into the flattened node sequence.
///
/// Takes the graph mutably because the synthesized-key fallback writes the
/// invented key value back onto the referenced entity, so the emitted token
/// stays resolvable even when no natural key exists.
pub fn decompose<M: MetaProvider>(
    graph: &mut ObjectGraph,
    root: EntityId,
    meta: &M,
) -> Result<Vec<DecomposedNode>, BridgeError> {
    let root_entity = graph
        .get(root)
        .ok_or_else(|| BridgeError::Configuration("export root is not present in the graph".into()))?;
    let root_meta = meta.type_meta(&root_entity.type_name)?;
    root_meta.validate()?;
    let root_identity = identity_of(graph, meta, root);

    // 1. Walk: pre-order, arrays transparent, cycle-safe via the visited set.
    let mut entries = Vec::new();
    let mut visited = BTreeSet::new();
    let mut seen_ids = BTreeSet::new();
    walk(
        graph,
        meta,
        root,
        ROOT_MARKER,
        ROOT_MARKER.to_string(),
        &mut visited,
        &mut seen_ids,
        &mut entries,
    );

    // 2. Root back-reference dedup: drop non-root entries that ARE the root.
    entries.retain(|e| {
        e.entity == root
            || root_identity.is_none()
            || identity_of(graph, meta, e.entity) != root_identity
    });

    // 3. Global structural dedup; the first occurrence's path is canonical.
    let mut seen = BTreeSet::new();
    entries.retain(|e| match identity_of(graph, meta, e.entity) {
        Some(identity) => seen.insert(identity),
        None => true,
    });

    // Resolve (and, where needed, synthesize) every entry's natural key
    // before any node data is rendered, so back-references to entities that
    // render earlier still see the synthesized column.
    let mut keys: BTreeMap<Identity, NaturalKey> = BTreeMap::new();
    for entry in &entries {
        let _ = natural_key(graph, meta, entry.entity, &mut keys);
    }

    // 5./6. Reference substitution, parents first so paths stay canonical.
    let mut rendered = Vec::with_capacity(entries.len());
    for entry in &entries {
        rendered.push(render_entry(graph, meta, entry, root, &root_identity, &mut keys));
    }

    // 4. Order inversion: children strictly before the parents referencing
    // them, root last. Reversing the walk handles tree edges, but a shared
    // reference can point across branches at a node first reached elsewhere,
    // so a stable children-first pass over the actual token edges finishes
    // the job. A streaming writer can then emit rows as it reads.
    rendered.reverse();
    Ok(order_children_first(rendered))
}

/// Stable children-first ordering over the rendered reference edges.
///
/// Repeatedly emits the earliest pending node whose referenced nodes have
/// all been emitted already. References to nodes outside the sequence never
/// constrain the order. A reference cycle that survived root elision cannot
/// be ordered; its nodes keep the incoming order.
fn order_children_first(mut pending: Vec<Rendered>) -> Vec<DecomposedNode> {
    let present: BTreeSet<Identity> = pending
        .iter()
        .filter_map(|r| r.identity.clone())
        .collect();
    let mut emitted: BTreeSet<Identity> = BTreeSet::new();
    let mut out = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready = pending.iter().position(|r| {
            r.refs
                .iter()
                .all(|target| emitted.contains(target) || !present.contains(target))
        });
        let entry = pending.remove(ready.unwrap_or(0));
        if let Some(identity) = entry.identity {
            emitted.insert(identity);
        }
        out.push(entry.node);
    }
    out
}

fn walk<M: MetaProvider>(
    graph: &ObjectGraph,
    meta: &M,
    id: EntityId,
    field_name: &str,
    path: String,
    visited: &mut BTreeSet<Identity>,
    seen_ids: &mut BTreeSet<EntityId>,
    out: &mut Vec<WalkEntry>,
) {
    let Some(entity) = graph.get(id) else {
        return;
    };
    // Undeterminable type: leaf, not failure. Partial export beats none.
    let Some(tmeta) = meta.lookup(&entity.type_name) else {
        return;
    };

    match entity.scalar_field(&tmeta.primary_key) {
        Some(pk) => {
            if !visited.insert((entity.type_name.clone(), pk.to_literal())) {
                return;
            }
        }
        // No primary key value to dedup on; guard by handle so a cyclic
        // graph of key-less entities still terminates.
        None => {
            if !seen_ids.insert(id) {
                return;
            }
        }
    }

    out.push(WalkEntry {
        type_name: entity.type_name.clone(),
        field_name: field_name.to_string(),
        path: path.clone(),
        entity: id,
    });

    for (field, value) in &entity.fields {
        // Arrays do not add a path segment: every element shares the
        // field's own path.
        let child_path = format!("{path}/{field}");
        match value {
            Value::Scalar(_) => {}
            Value::Object(child) => {
                walk(graph, meta, *child, field, child_path, visited, seen_ids, out);
            }
            Value::List(children) => {
                for child in children {
                    walk(
                        graph,
                        meta,
                        *child,
                        field,
                        child_path.clone(),
                        visited,
                        seen_ids,
                        out,
                    );
                }
            }
        }
    }
}

fn render_entry<M: MetaProvider>(
    graph: &mut ObjectGraph,
    meta: &M,
    entry: &WalkEntry,
    root: EntityId,
    root_identity: &Option<Identity>,
    keys: &mut BTreeMap<Identity, NaturalKey>,
) -> Rendered {
    let fields: Vec<(String, Value)> = graph
        .get(entry.entity)
        .map(|e| e.fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    let identity = identity_of(graph, meta, entry.entity);

    let mut data = Vec::new();
    let mut refs = BTreeSet::new();
    for (field, value) in fields {
        match value {
            Value::Scalar(s) => data.push((field, StoredValue::One(s))),
            Value::Object(target) => {
                // Any reference back at the root is elided outright: this
                // removes mirrored back-references without reintroducing a
                // cycle (root self-references included).
                if is_root_ref(graph, meta, target, root, root_identity) {
                    continue;
                }
                let field_path = format!("{}/{}", entry.path, field);
                if let Some((key_field, key_value)) = natural_key(graph, meta, target, keys) {
                    let token = encode_token(&field_path, &key_field, &key_value);
                    data.push((field, StoredValue::One(Scalar::Text(token))));
                    record_edge(graph, meta, target, &identity, &mut refs);
                }
                // Unresolvable target degrades to leaf: field elided.
            }
            Value::List(targets) => {
                let field_path = format!("{}/{}", entry.path, field);
                let mut tokens = Vec::new();
                for target in targets {
                    if is_root_ref(graph, meta, target, root, root_identity) {
                        continue;
                    }
                    if let Some((key_field, key_value)) = natural_key(graph, meta, target, keys) {
                        tokens.push(Scalar::Text(encode_token(
                            &field_path,
                            &key_field,
                            &key_value,
                        )));
                        record_edge(graph, meta, target, &identity, &mut refs);
                    }
                }
                if !tokens.is_empty() {
                    data.push((field, StoredValue::Many(tokens)));
                }
            }
        }
    }

    Rendered {
        node: DecomposedNode {
            type_name: entry.type_name.clone(),
            field_name: entry.field_name.clone(),
            path: entry.path.clone(),
            data,
        },
        identity,
        refs,
    }
}

/// Record a tokenized reference as an ordering edge. Self-references carry
/// no ordering constraint and are dropped.
fn record_edge<M: MetaProvider>(
    graph: &ObjectGraph,
    meta: &M,
    target: EntityId,
    own_identity: &Option<Identity>,
    refs: &mut BTreeSet<Identity>,
) {
    if let Some(target_identity) = identity_of(graph, meta, target) {
        if Some(&target_identity) != own_identity.as_ref() {
            refs.insert(target_identity);
        }
    }
}

fn is_root_ref<M: MetaProvider>(
    graph: &ObjectGraph,
    meta: &M,
    target: EntityId,
    root: EntityId,
    root_identity: &Option<Identity>,
) -> bool {
    if target == root {
        return true;
    }
    match root_identity {
        Some(identity) => identity_of(graph, meta, target).as_ref() == Some(identity),
        None => false,
    }
}

/// Select the natural key of a referenced entity.
///
/// Preference order: first unique column whose current value is a primitive
/// (string/number); then the primary key column; then synthesize
/// `<lowercased-type>_<primaryKeyValue>` and mutate the entity to carry it
/// under the first unique column. Returns `None` when no key is derivable at
/// all (the reference then degrades to a leaf).
fn natural_key<M: MetaProvider>(
    graph: &mut ObjectGraph,
    meta: &M,
    target: EntityId,
    cache: &mut BTreeMap<Identity, NaturalKey>,
) -> Option<NaturalKey> {
    let entity = graph.get(target)?;
    let tmeta = meta.lookup(&entity.type_name)?;

    let identity = entity
        .scalar_field(&tmeta.primary_key)
        .map(|pk| (entity.type_name.clone(), pk.to_literal()));
    if let Some(identity) = &identity {
        if let Some(key) = cache.get(identity) {
            return Some(key.clone());
        }
    }

    for unique in &tmeta.unique {
        if let Some(value) = entity.scalar_field(unique) {
            if value.is_primitive() {
                let key = (unique.clone(), value.to_literal());
                if let Some(identity) = identity {
                    cache.insert(identity, key.clone());
                }
                return Some(key);
            }
        }
    }

    // The primary key stands in only when the type declares no unique
    // columns at all; a declared-but-empty unique column is synthesized
    // instead so re-imports match on a stable natural key.
    if tmeta.unique.is_empty() {
        if let Some(pk) = entity.scalar_field(&tmeta.primary_key) {
            if pk.is_primitive() {
                let key = (tmeta.primary_key.clone(), pk.to_literal());
                if let Some(identity) = identity {
                    cache.insert(identity, key.clone());
                }
                return Some(key);
            }
        }
        return None;
    }

    // Synthesized-key fallback. Requires a primary key value to derive from
    // and a unique column to carry the invented value.
    let (_, pk_literal) = identity.clone()?;
    let first_unique = tmeta.unique.first().cloned()?;
    let synthesized = format!("{}_{}", entity.type_name.to_lowercase(), pk_literal);

    graph.set_field(
        target,
        first_unique.clone(),
        Value::Scalar(Scalar::Text(synthesized.clone())),
    );
    let key = (first_unique, synthesized);
    if let Some(identity) = identity {
        cache.insert(identity, key.clone());
    }
    Some(key)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::meta::{Cardinality, TypeMeta, TypeRegistry};
    use crate::token::ReferenceToken;

    fn user_registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                TypeMeta::new("User", "id")
                    .with_unique("login")
                    .with_relation("manager", "User", Cardinality::One)
                    .with_relation("groups", "Group", Cardinality::Many),
            )
            .expect("register");
        registry
            .register(TypeMeta::new("Group", "id").with_unique("code"))
            .expect("register");
        registry
    }

    fn user(graph: &mut ObjectGraph, id: i64, login: &str) -> EntityId {
        graph.insert(
            Entity::new("User")
                .scalar("id", Scalar::Int(id))
                .scalar("login", Scalar::Text(login.into())),
        )
    }

    #[test]
    fn manager_cycle_elides_root_back_reference() {
        // User{id:1, login:"bob", manager: User{id:2}} where manager.manager
        // points back at id:1.
        let registry = user_registry();
        let mut graph = ObjectGraph::new();
        let bob = user(&mut graph, 1, "bob");
        let alice = user(&mut graph, 2, "alice");
        graph.set_field(bob, "manager", Value::Object(alice));
        graph.set_field(alice, "manager", Value::Object(bob));

        let nodes = decompose(&mut graph, bob, &registry).expect("decompose");

        assert_eq!(nodes.len(), 2);
        // Children before parents: alice first, bob (root) last.
        assert_eq!(nodes[0].type_name, "User");
        assert_eq!(nodes[0].get("login"), Some(&StoredValue::One(Scalar::Text("alice".into()))));
        assert_eq!(nodes[1].get("login"), Some(&StoredValue::One(Scalar::Text("bob".into()))));
        // The back-reference to the root is absent, not tokenized.
        assert!(nodes[0].get("manager").is_none());
        // The root's manager field is a token onto alice's natural key.
        let Some(StoredValue::One(Scalar::Text(token))) = nodes[1].get("manager") else {
            panic!("expected token in root manager field");
        };
        let token = ReferenceToken::decode(token).expect("token");
        assert_eq!(token.path, "@root/manager");
        assert_eq!(token.key_field, "login");
        assert_eq!(token.key_value, "alice");
    }

    #[test]
    fn duplicate_instances_collapse_to_one_node() {
        // Two distinct arena instances carrying the same logical identity.
        let registry = user_registry();
        let mut graph = ObjectGraph::new();
        let root = user(&mut graph, 1, "bob");
        let a1 = user(&mut graph, 2, "alice");
        let a2 = user(&mut graph, 2, "alice");
        graph.set_field(root, "manager", Value::Object(a1));
        let sponsor = user(&mut graph, 3, "carol");
        graph.set_field(sponsor, "manager", Value::Object(a2));
        graph.set_field(root, "sponsor", Value::Object(sponsor));

        let nodes = decompose(&mut graph, root, &registry).expect("decompose");
        let alice_nodes = nodes
            .iter()
            .filter(|n| n.get("login") == Some(&StoredValue::One(Scalar::Text("alice".into()))))
            .count();
        assert_eq!(alice_nodes, 1);
    }

    #[test]
    fn list_relations_tokenize_every_element() {
        let registry = user_registry();
        let mut graph = ObjectGraph::new();
        let admins = graph.insert(
            Entity::new("Group")
                .scalar("id", Scalar::Int(10))
                .scalar("code", Scalar::Text("admins".into())),
        );
        let ops = graph.insert(
            Entity::new("Group")
                .scalar("id", Scalar::Int(11))
                .scalar("code", Scalar::Text("ops".into())),
        );
        let root = user(&mut graph, 1, "bob");
        graph.set_field(root, "groups", Value::List(vec![admins, ops]));

        let nodes = decompose(&mut graph, root, &registry).expect("decompose");
        assert_eq!(nodes.len(), 3);
        // Root last; its groups field holds one token per element, sharing
        // the array's own path (arrays are transparent).
        let Some(StoredValue::Many(tokens)) = nodes[2].get("groups") else {
            panic!("expected token list");
        };
        let decoded: Vec<ReferenceToken> = tokens
            .iter()
            .map(|t| ReferenceToken::decode(&t.to_literal()).expect("token"))
            .collect();
        assert_eq!(decoded.len(), 2);
        assert!(decoded.iter().all(|t| t.path == "@root/groups"));
        assert!(decoded.iter().all(|t| t.key_field == "code"));
    }

    #[test]
    fn synthesized_key_mutates_referenced_node() {
        // Group with a unique column but no value in it: the fallback invents
        // `group_<pk>` and writes it onto the entity so the token resolves.
        let registry = user_registry();
        let mut graph = ObjectGraph::new();
        let group = graph.insert(Entity::new("Group").scalar("id", Scalar::Int(7)));
        let root = user(&mut graph, 1, "bob");
        graph.set_field(root, "groups", Value::List(vec![group]));

        let nodes = decompose(&mut graph, root, &registry).expect("decompose");

        let group_node = nodes.iter().find(|n| n.type_name == "Group").expect("group node");
        assert_eq!(
            group_node.get("code"),
            Some(&StoredValue::One(Scalar::Text("group_7".into())))
        );
        let Some(StoredValue::Many(tokens)) = nodes.last().expect("root").get("groups") else {
            panic!("expected token list");
        };
        let token = ReferenceToken::decode(&tokens[0].to_literal()).expect("token");
        assert_eq!(token.key_field, "code");
        assert_eq!(token.key_value, "group_7");
    }

    #[test]
    fn unknown_type_is_a_leaf_not_a_failure() {
        let registry = user_registry();
        let mut graph = ObjectGraph::new();
        let mystery = graph.insert(Entity::new("Mystery").scalar("id", Scalar::Int(1)));
        let root = user(&mut graph, 1, "bob");
        graph.set_field(root, "attachment", Value::Object(mystery));

        let nodes = decompose(&mut graph, root, &registry).expect("decompose");
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].get("attachment").is_none());
    }

    #[test]
    fn missing_root_metadata_is_fatal() {
        let registry = TypeRegistry::new();
        let mut graph = ObjectGraph::new();
        let root = graph.insert(Entity::new("User").scalar("id", Scalar::Int(1)));

        assert!(matches!(
            decompose(&mut graph, root, &registry),
            Err(BridgeError::Configuration(_))
        ));
    }

    #[test]
    fn shared_reference_precedes_every_referencer() {
        // Diamond: bob -> alice (assistant), bob -> carol (colleague),
        // carol -> alice (manager). The walk reaches alice first through the
        // assistant branch; the ordering pass must still place her before
        // carol, or carol's token would point forward.
        let registry = user_registry();
        let mut graph = ObjectGraph::new();
        let root = user(&mut graph, 1, "bob");
        let alice = user(&mut graph, 2, "alice");
        let carol = user(&mut graph, 3, "carol");
        graph.set_field(root, "assistant", Value::Object(alice));
        graph.set_field(root, "colleague", Value::Object(carol));
        graph.set_field(carol, "manager", Value::Object(alice));

        let nodes = decompose(&mut graph, root, &registry).expect("decompose");
        let logins: Vec<_> = nodes
            .iter()
            .map(|n| match n.get("login") {
                Some(StoredValue::One(s)) => s.to_literal(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(logins, vec!["alice", "carol", "bob"]);
    }

    #[test]
    fn topological_order_holds() {
        let registry = user_registry();
        let mut graph = ObjectGraph::new();
        let carol = user(&mut graph, 3, "carol");
        let alice = user(&mut graph, 2, "alice");
        graph.set_field(alice, "manager", Value::Object(carol));
        let root = user(&mut graph, 1, "bob");
        graph.set_field(root, "manager", Value::Object(alice));

        let nodes = decompose(&mut graph, root, &registry).expect("decompose");
        let logins: Vec<_> = nodes
            .iter()
            .map(|n| match n.get("login") {
                Some(StoredValue::One(s)) => s.to_literal(),
                _ => String::new(),
            })
            .collect();
        // Deepest child first, root last.
        assert_eq!(logins, vec!["carol", "alice", "bob"]);
    }
}
