//! # rowbridge (app library)
//!
//! The application-layer modules behind the `rowbridge` binary, exposed as a
//! library so integration tests can drive the API router and schema loader
//! directly.

pub mod api;
pub mod cli;
pub mod config;
