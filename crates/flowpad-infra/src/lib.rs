//! Infrastructure layer for Flowpad.
//!
//! Contains implementations of the ports defined in `flowpad-core`: the REST
//! workflow backend client, plus config and editor-snapshot file loading.

pub mod config;
pub mod rest_api;
pub mod snapshot;
