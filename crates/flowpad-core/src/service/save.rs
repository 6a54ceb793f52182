//! Save orchestration.
//!
//! Turns the editor's workflow into persistence documents and drives the
//! create/update calls against the backend. A stale version id on update
//! asks the user whether to overwrite; confirming repeats the update with
//! `force_save`. No other failure is retried.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};
use uuid::Uuid;

use flowpad_types::error::ApiError;
use flowpad_types::workflow::{EditorWorkflow, WorkflowRecord, WorkflowUpdate, is_unsaved_id};

use crate::node_types::NodeTypeRegistry;
use crate::repository::workflow::WorkflowApi;
use crate::workflow::serializer::workflow_data_to_save;

/// Title of every error the orchestrator reports through the notifier.
pub const SAVE_ERROR_TITLE: &str = "Problem saving workflow";

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Asks the user how to resolve a version conflict.
pub trait ConflictPrompt: Send + Sync {
    /// `true` to overwrite the remote changes.
    fn confirm_overwrite(
        &self,
        workflow_id: &str,
    ) -> impl std::future::Future<Output = bool> + Send;
}

/// Surfaces failures to the user.
pub trait Notifier: Send + Sync {
    fn error(&self, title: &str, message: &str);
}

// ---------------------------------------------------------------------------
// Requests and state
// ---------------------------------------------------------------------------

/// Arguments of `save_current_workflow`.
#[derive(Debug, Clone, Default)]
pub struct SaveRequest {
    /// Workflow to save; defaults to the editor's own id.
    pub id: Option<String>,
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Overwrite remote changes and ignore an in-flight save.
    pub force: bool,
}

/// Arguments of `save_as_new_workflow`.
#[derive(Debug, Clone, Default)]
pub struct NewWorkflowRequest {
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
    pub reset_webhook_urls: bool,
    pub reset_node_ids: bool,
    /// Payload to create instead of the editor's serialized workflow.
    pub data: Option<WorkflowUpdate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    #[default]
    Idle,
    Saving,
    ConflictDetected,
    Done,
    Failed,
}

/// Holds the saving flag for one save and clears it when that save ends.
///
/// Only the call that set the flag gets a guard, so a save that runs
/// alongside another never clears the other's flag.
struct SavingGuard<'a>(&'a AtomicBool);

impl<'a> SavingGuard<'a> {
    /// `None` when another save already holds the flag.
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

/// Requested name, trimmed; blank names leave the workflow's name alone.
fn requested_name(name: Option<&str>) -> Option<String> {
    name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string)
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Saves the editor's workflow through a [`WorkflowApi`].
///
/// Generic over its ports so flowpad-core never depends on flowpad-infra.
pub struct SaveOrchestrator<A: WorkflowApi, P: ConflictPrompt, N: Notifier, R: NodeTypeRegistry> {
    api: A,
    prompt: P,
    notifier: N,
    node_types: R,
    read_only: bool,
    saving: AtomicBool,
    state: Mutex<SaveState>,
}

impl<A: WorkflowApi, P: ConflictPrompt, N: Notifier, R: NodeTypeRegistry> SaveOrchestrator<A, P, N, R> {
    pub fn new(api: A, prompt: P, notifier: N, node_types: R) -> Self {
        Self {
            api,
            prompt,
            notifier,
            node_types,
            read_only: false,
            saving: AtomicBool::new(false),
            state: Mutex::new(SaveState::Idle),
        }
    }

    /// Read-only environments refuse every save.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn state(&self) -> SaveState {
        self.state.lock().map(|s| *s).unwrap_or_default()
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    fn set_state(&self, state: SaveState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    fn fail(&self, err: &ApiError) {
        warn!(error = %err, "workflow save failed");
        self.notifier.error(SAVE_ERROR_TITLE, &err.to_string());
        self.set_state(SaveState::Failed);
    }

    /// Save the editor's workflow, creating it when it was never saved.
    ///
    /// Returns whether the workflow is now persisted. A non-forced call
    /// while another save is in flight returns `true` without saving.
    pub async fn save_current_workflow(&self, editor: &mut EditorWorkflow, request: SaveRequest) -> bool {
        if self.read_only {
            debug!("read-only environment, not saving");
            return false;
        }

        let workflow_id = request.id.clone().unwrap_or_else(|| editor.id.clone());
        if is_unsaved_id(&workflow_id) {
            let new_request = NewWorkflowRequest {
                name: request.name,
                tags: request.tags,
                ..NewWorkflowRequest::default()
            };
            return self.save_as_new_workflow(editor, new_request).await;
        }

        let _guard = match SavingGuard::try_acquire(&self.saving) {
            Some(guard) => Some(guard),
            None if request.force => None,
            None => {
                debug!(workflow_id = %workflow_id, "save already in flight");
                return true;
            }
        };
        let name = requested_name(request.name.as_deref());
        let mut force = request.force;

        loop {
            self.set_state(SaveState::Saving);

            let mut payload = WorkflowUpdate::from(workflow_data_to_save(editor, &self.node_types));
            if name.is_some() {
                payload.name = name.clone();
            }
            if let Some(tags) = &request.tags {
                payload.tags = Some(tags.clone());
            }
            payload.version_id = editor.version_id.clone();

            match self.api.update(&workflow_id, &payload, force).await {
                Ok(record) => {
                    editor.version_id = record.version_id;
                    if name.is_some() {
                        editor.name = record.name;
                    }
                    if request.tags.is_some() {
                        editor.tag_ids = record.tags.into_iter().map(|t| t.id).collect();
                    }
                    editor.dirty = false;
                    self.set_state(SaveState::Done);
                    info!(workflow_id = %workflow_id, forced = force, "workflow saved");
                    return true;
                }
                Err(err) if err.is_conflict() => {
                    warn!(workflow_id = %workflow_id, "workflow changed remotely since it was opened");
                    self.set_state(SaveState::ConflictDetected);

                    if self.prompt.confirm_overwrite(&workflow_id).await {
                        force = true;
                        continue;
                    }
                    self.set_state(SaveState::Idle);
                    return false;
                }
                Err(err) => {
                    self.fail(&err);
                    return false;
                }
            }
        }
    }

    /// Create the workflow as a new backend record and adopt its identity.
    pub async fn save_as_new_workflow(&self, editor: &mut EditorWorkflow, request: NewWorkflowRequest) -> bool {
        let _guard = SavingGuard::try_acquire(&self.saving);
        self.set_state(SaveState::Saving);

        let mut payload = request
            .data
            .unwrap_or_else(|| workflow_data_to_save(editor, &self.node_types).into());

        let mut changed_webhooks = BTreeMap::new();
        for node in payload.nodes.iter_mut().flatten() {
            if request.reset_node_ids {
                node.id = Uuid::new_v4().to_string();
            }
            if request.reset_webhook_urls && node.webhook_id.is_some() {
                let webhook_id = Uuid::new_v4().to_string();
                node.webhook_id = Some(webhook_id.clone());
                changed_webhooks.insert(node.name.clone(), webhook_id);
            }
        }

        if let Some(name) = requested_name(request.name.as_deref()) {
            payload.name = Some(name);
        }
        if let Some(tags) = request.tags {
            payload.tags = Some(tags);
        }

        let record = match self.api.create(&payload).await {
            Ok(record) => record,
            Err(err) => {
                self.fail(&err);
                return false;
            }
        };

        editor.active = record.active;
        editor.id = record.id;
        editor.version_id = record.version_id;
        editor.name = record.name;
        editor.settings = record.settings;
        editor.tag_ids = record.tags.into_iter().map(|t| t.id).collect();
        for (node_name, webhook_id) in changed_webhooks {
            if let Some(node) = editor.node_mut(&node_name) {
                node.webhook_id = Some(webhook_id);
            }
        }
        editor.dirty = false;

        self.set_state(SaveState::Done);
        info!(workflow_id = %editor.id, "workflow created");
        true
    }

    /// Update `workflow_id`, optionally switching its active flag.
    ///
    /// For the editor's own workflow the full document is sent, or only its
    /// version id when `partial`. Any other workflow is fetched first so the
    /// update carries its current version id.
    pub async fn update_workflow(
        &self,
        editor: &mut EditorWorkflow,
        workflow_id: &str,
        active: Option<bool>,
        partial: bool,
    ) -> Result<WorkflowRecord, ApiError> {
        let is_current = workflow_id == editor.id;

        let mut payload = if is_current && !partial {
            workflow_data_to_save(editor, &self.node_types).into()
        } else if is_current {
            WorkflowUpdate {
                version_id: editor.version_id.clone(),
                ..WorkflowUpdate::default()
            }
        } else {
            let remote = self.api.fetch(workflow_id).await?;
            WorkflowUpdate {
                version_id: remote.version_id,
                ..WorkflowUpdate::default()
            }
        };
        if active.is_some() {
            payload.active = active;
        }

        let record = self.api.update(workflow_id, &payload, false).await?;

        if is_current {
            editor.version_id = record.version_id.clone();
            editor.active = record.active;
            editor.dirty = false;
        }
        info!(workflow_id, active = record.active, "workflow updated");
        Ok(record)
    }

    /// Whether the stored copy of `id` differs from what a save would send.
    ///
    /// Compares nodes, connections, settings and name. A workflow the
    /// backend does not know counts as changed.
    pub async fn data_has_changed(&self, editor: &EditorWorkflow, id: &str) -> Result<bool, ApiError> {
        let current = workflow_data_to_save(editor, &self.node_types);
        let remote = match self.api.fetch(id).await {
            Ok(remote) => remote,
            Err(ApiError::NotFound) => return Ok(true),
            Err(err) => return Err(err),
        };

        Ok(remote.nodes != current.nodes
            || remote.connections != current.connections
            || remote.settings != current.settings
            || remote.name != current.name)
    }
}
