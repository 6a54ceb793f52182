//! Shared domain types for Flowpad.
//!
//! This crate contains the data model the editor toolkit works on: the
//! workflow graph, recorded run data and pin data, node-type schemas,
//! persistence documents, configuration, and the associated error types.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, thiserror.

pub mod config;
pub mod error;
pub mod execution;
pub mod node_type;
pub mod snapshot;
pub mod workflow;
