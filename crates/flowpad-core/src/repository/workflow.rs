//! Workflow persistence port.
//!
//! The save orchestrator talks to the workflow backend only through this
//! trait. flowpad-infra implements it over the REST API.

use flowpad_types::error::ApiError;
use flowpad_types::workflow::{WorkflowRecord, WorkflowUpdate};

/// Remote workflow store.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait WorkflowApi: Send + Sync {
    /// Create a new workflow. The backend assigns id and version.
    fn create(
        &self,
        payload: &WorkflowUpdate,
    ) -> impl std::future::Future<Output = Result<WorkflowRecord, ApiError>> + Send;

    /// Update an existing workflow.
    ///
    /// A stale `version_id` yields `ApiError::Conflict` unless `force_save`
    /// is set.
    fn update(
        &self,
        id: &str,
        payload: &WorkflowUpdate,
        force_save: bool,
    ) -> impl std::future::Future<Output = Result<WorkflowRecord, ApiError>> + Send;

    /// Fetch the stored copy of a workflow.
    fn fetch(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<WorkflowRecord, ApiError>> + Send;
}
