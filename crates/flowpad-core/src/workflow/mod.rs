//! Editor-side workflow logic.
//!
//! - `graph` -- indexed workflow graph and connection queries
//! - `navigator` -- main-input ancestor lookup across non-main connections
//! - `execute_data` -- execute data and connection input from run/pin data
//! - `paired_item` -- tracing an output item back to its source item
//! - `expression` -- expression engines and parameter walking
//! - `parameters` -- display conditions and parameter normalization
//! - `resolver` -- parameter resolution against the editor snapshot
//! - `serializer` -- persistence-ready node and workflow documents
//! - `helpers` -- readiness checks, node counts, positions, credentials
//! - `webhook` -- webhook and form URLs

pub mod execute_data;
pub mod expression;
pub mod graph;
pub mod helpers;
pub mod navigator;
pub mod paired_item;
pub mod parameters;
pub mod resolver;
pub mod serializer;
pub mod webhook;
