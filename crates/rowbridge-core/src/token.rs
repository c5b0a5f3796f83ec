//! # Reference Token Codec
//!
//! Encodes and decodes the `path#keyField:keyValue` token grammar — the only
//! mechanism by which the flattened record stream expresses relationships.
//!
//! Pure functions, no dependencies. Token equality is byte equality of the
//! encoded string; no normalization is performed, so key values must be
//! stringified stably (see [`crate::types::Scalar::to_literal`]) before
//! encoding.

use crate::primitives::{ROOT_MARKER, TOKEN_KEY_SEP, TOKEN_PATH_SEP};

/// A decoded reference token.
///
/// `path` is a `/`-joined sequence of field names starting at the literal
/// root marker (`@root`); `key_field` names the natural-key property of the
/// referenced type; `key_value` is its stringified value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceToken {
    pub path: String,
    pub key_field: String,
    pub key_value: String,
}

impl ReferenceToken {
    /// Create a token from its parts.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        key_field: impl Into<String>,
        key_value: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            key_field: key_field.into(),
            key_value: key_value.into(),
        }
    }

    /// Encode this token to its wire string. Deterministic and reversible.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.path, TOKEN_PATH_SEP, self.key_field, TOKEN_KEY_SEP, self.key_value
        )
    }

    /// Decode a string into a token.
    ///
    /// Returns `None` (not an error) if the input is not token-shaped:
    /// callers use this to distinguish a plain scalar string from an encoded
    /// reference, since both travel in the same string-typed slot.
    ///
    /// The split points are the first `#` and the first `:` after it, so key
    /// values may themselves contain `:`.
    #[must_use]
    pub fn decode(text: &str) -> Option<Self> {
        let (path, rest) = text.split_once(TOKEN_PATH_SEP)?;
        let (key_field, key_value) = rest.split_once(TOKEN_KEY_SEP)?;

        if path.is_empty() || key_field.is_empty() || key_value.is_empty() {
            return None;
        }
        // A well-formed path always starts at the root marker.
        if path != ROOT_MARKER && !path.starts_with(&format!("{ROOT_MARKER}/")) {
            return None;
        }

        Some(Self::new(path, key_field, key_value))
    }
}

/// Convenience wrapper: encode a token from its parts.
#[must_use]
pub fn encode_token(path: &str, key_field: &str, key_value: &str) -> String {
    ReferenceToken::new(path, key_field, key_value).encode()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let token = ReferenceToken::new("@root/manager", "login", "alice");
        let encoded = token.encode();
        assert_eq!(encoded, "@root/manager#login:alice");
        assert_eq!(ReferenceToken::decode(&encoded), Some(token));
    }

    #[test]
    fn decode_rejects_plain_scalars() {
        assert_eq!(ReferenceToken::decode("alice"), None);
        assert_eq!(ReferenceToken::decode("2024-03-01T12:30:00Z"), None);
        assert_eq!(ReferenceToken::decode(""), None);
    }

    #[test]
    fn decode_rejects_paths_outside_root() {
        assert_eq!(ReferenceToken::decode("manager#login:alice"), None);
        assert_eq!(ReferenceToken::decode("@rooted/x#k:v"), None);
    }

    #[test]
    fn decode_rejects_empty_parts() {
        assert_eq!(ReferenceToken::decode("@root/a#:v"), None);
        assert_eq!(ReferenceToken::decode("@root/a#k:"), None);
        assert_eq!(ReferenceToken::decode("#k:v"), None);
    }

    #[test]
    fn key_value_may_contain_separators() {
        // Only the FIRST '#' and the FIRST ':' after it split the token.
        let decoded =
            ReferenceToken::decode("@root/when#stamp:2024-03-01T12:30:00Z").expect("token");
        assert_eq!(decoded.key_field, "stamp");
        assert_eq!(decoded.key_value, "2024-03-01T12:30:00Z");
    }

    #[test]
    fn equality_is_byte_equality() {
        let a = encode_token("@root/a", "k", "v");
        let b = encode_token("@root/a", "k", "v");
        let c = encode_token("@root/a", "k", "V");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
