//! # Wire Formats
//!
//! The document model the bridge exchanges with the outside world. Tag-level
//! parsing is the caller's concern; this module works on an already-built
//! element tree and renders exports back to markup text.

mod xml;

pub use xml::{Element, decode_document, render_export};
