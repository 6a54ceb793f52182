//! Port definitions.
//!
//! These traits define the backend interface that the infrastructure layer
//! (flowpad-infra) implements. The core crate never depends on any
//! specific transport.

pub mod workflow;
