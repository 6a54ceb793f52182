//! Business logic and port trait definitions for Flowpad.
//!
//! This crate defines the "ports" (backend and user-interaction traits) that
//! the infrastructure and CLI layers implement. It depends only on
//! `flowpad-types` -- never on `flowpad-infra` or any transport crate.

pub mod node_types;
pub mod repository;
pub mod service;
pub mod workflow;
