//! # Bridge Primitives
//!
//! Hardcoded runtime constants for the RowBridge engine.
//!
//! The bridge starts with zero schema knowledge but fixed limits.
//! These constants are compiled into the binary and immutable at runtime.

/// The literal path marker for the export root entity.
///
/// Every reference token path is a `/`-joined field chain starting here.
pub const ROOT_MARKER: &str = "@root";

/// Separator between the path and the key section of a reference token.
pub const TOKEN_PATH_SEP: char = '#';

/// Separator between the key field and the key value of a reference token.
pub const TOKEN_KEY_SEP: char = ':';

/// Default relation depth when hydrating an entity graph for export.
pub const DEFAULT_EXPORT_DEPTH: usize = 8;

/// Maximum relation depth for export hydration.
///
/// All hydration must be computationally bounded; this prevents runaway
/// store traffic on densely connected schemas.
pub const MAX_EXPORT_DEPTH: usize = 32;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum number of actions in a single import document.
///
/// Documents longer than this are rejected to prevent DoS.
pub const MAX_DOCUMENT_ACTIONS: usize = 10_000;

/// Maximum number of rows in a single action.
pub const MAX_ACTION_ROWS: usize = 100_000;

/// Maximum length for field names.
///
/// Field names longer than this are rejected by the document decoder.
pub const MAX_FIELD_NAME_LENGTH: usize = 256;

/// Maximum length for scalar value strings (64KB).
///
/// This prevents memory exhaustion from malicious or malformed input.
pub const MAX_VALUE_LENGTH: usize = 65_536;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_marker_shape() {
        // Token paths rely on the marker never containing the separators.
        assert!(!ROOT_MARKER.contains(TOKEN_PATH_SEP));
        assert!(!ROOT_MARKER.contains(TOKEN_KEY_SEP));
    }

    #[test]
    fn export_depth_bounds() {
        assert!(DEFAULT_EXPORT_DEPTH <= MAX_EXPORT_DEPTH);
    }
}
