//! # Schema Configuration
//!
//! Loads the type registry from a TOML schema file. The schema is the app's
//! window onto the metadata collaborator: every importable type, its primary
//! key, its unique columns and its relations.
//!
//! ```toml
//! [types.User]
//! primary_key = "id"
//! unique = ["login"]
//!
//! [[types.User.relations]]
//! field = "manager"
//! target = "User"
//! cardinality = "one"
//! ```

use rowbridge_core::{BridgeError, Cardinality, TypeMeta, TypeRegistry};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// SCHEMA FILE STRUCTURES
// =============================================================================

/// Top-level schema file.
#[derive(Debug, Deserialize)]
pub struct SchemaConfig {
    pub types: BTreeMap<String, TypeConfig>,
}

/// One entity type declaration.
#[derive(Debug, Deserialize)]
pub struct TypeConfig {
    pub primary_key: String,
    #[serde(default)]
    pub unique: Vec<String>,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
}

/// One relation declaration.
#[derive(Debug, Deserialize)]
pub struct RelationConfig {
    pub field: String,
    pub target: String,
    #[serde(default = "default_cardinality")]
    pub cardinality: String,
}

fn default_cardinality() -> String {
    "one".to_string()
}

// =============================================================================
// LOADING
// =============================================================================

/// Load a type registry from a TOML schema file.
pub fn load_schema(path: &Path) -> Result<TypeRegistry, BridgeError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        BridgeError::Io(format!("Cannot read schema '{}': {}", path.display(), e))
    })?;
    registry_from_str(&contents)
}

/// Build a type registry from schema text.
pub fn registry_from_str(contents: &str) -> Result<TypeRegistry, BridgeError> {
    let schema: SchemaConfig = toml::from_str(contents)
        .map_err(|e| BridgeError::Configuration(format!("Invalid schema: {e}")))?;

    let mut registry = TypeRegistry::new();
    for (name, config) in schema.types {
        let mut tmeta = TypeMeta::new(&name, &config.primary_key);
        for unique in &config.unique {
            tmeta = tmeta.with_unique(unique);
        }
        for relation in &config.relations {
            let cardinality = parse_cardinality(&relation.cardinality)?;
            tmeta = tmeta.with_relation(&relation.field, &relation.target, cardinality);
        }
        registry.register(tmeta)?;
    }
    Ok(registry)
}

fn parse_cardinality(raw: &str) -> Result<Cardinality, BridgeError> {
    match raw {
        "one" => Ok(Cardinality::One),
        "many" => Ok(Cardinality::Many),
        other => Err(BridgeError::Configuration(format!(
            "Unknown cardinality '{other}'. Use: one, many"
        ))),
    }
}

/// Render a starter schema for `init`.
#[must_use]
pub fn starter_schema() -> &'static str {
    r#"# Rowbridge schema: one [types.<Name>] block per importable entity type.

[types.User]
primary_key = "id"
unique = ["login"]

[[types.User.relations]]
field = "manager"
target = "User"
cardinality = "one"

[[types.User.relations]]
field = "groups"
target = "Group"
cardinality = "many"

[types.Group]
primary_key = "id"
unique = ["name"]
"#
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rowbridge_core::MetaProvider;

    #[test]
    fn starter_schema_parses() {
        let registry = registry_from_str(starter_schema()).expect("parse");
        assert_eq!(registry.len(), 2);

        let user = registry.type_meta("User").expect("User");
        assert_eq!(user.primary_key, "id");
        assert_eq!(user.unique, vec!["login".to_string()]);
        assert_eq!(user.relations.len(), 2);
        assert_eq!(
            user.relation("groups").expect("groups relation").cardinality,
            Cardinality::Many
        );
    }

    #[test]
    fn unknown_cardinality_is_rejected() {
        let schema = r#"
            [types.User]
            primary_key = "id"

            [[types.User.relations]]
            field = "manager"
            target = "User"
            cardinality = "several"
        "#;
        assert!(matches!(
            registry_from_str(schema),
            Err(BridgeError::Configuration(_))
        ));
    }

    #[test]
    fn missing_primary_key_is_rejected() {
        let schema = r#"
            [types.User]
            primary_key = ""
        "#;
        assert!(matches!(
            registry_from_str(schema),
            Err(BridgeError::Configuration(_))
        ));
    }

    #[test]
    fn cardinality_defaults_to_one() {
        let schema = r#"
            [types.User]
            primary_key = "id"

            [[types.User.relations]]
            field = "manager"
            target = "User"
        "#;
        let registry = registry_from_str(schema).expect("parse");
        let user = registry.type_meta("User").expect("User");
        assert_eq!(
            user.relation("manager").expect("relation").cardinality,
            Cardinality::One
        );
    }
}
