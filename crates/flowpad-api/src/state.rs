//! Application state shared by all commands.
//!
//! Holds the loaded configuration and builds the concrete adapters the core
//! services are generic over.

use std::path::Path;

use anyhow::{Context, Result};

use flowpad_core::node_types::InMemoryNodeTypes;
use flowpad_core::service::save::SaveOrchestrator;
use flowpad_core::workflow::resolver::ResolverSettings;
use flowpad_infra::config::{load_editor_config, resolve_data_dir};
use flowpad_infra::rest_api::RestWorkflowApi;
use flowpad_infra::snapshot;
use flowpad_types::config::EditorConfig;
use flowpad_types::snapshot::EditorSnapshot;

use crate::cli::save::{ConsoleNotifier, DialoguerPrompt};

/// Save orchestrator pinned to the concrete adapters.
pub type ConcreteSaveOrchestrator =
    SaveOrchestrator<RestWorkflowApi, DialoguerPrompt, ConsoleNotifier, InMemoryNodeTypes>;

pub struct AppState {
    pub config: EditorConfig,
}

impl AppState {
    /// Resolve the data directory and load `config.toml` from it.
    pub async fn init() -> Result<Self> {
        let data_dir = resolve_data_dir();
        let config = load_editor_config(&data_dir).await;
        tracing::debug!(data_dir = %data_dir.display(), "configuration loaded");

        Ok(Self { config })
    }

    pub async fn load_snapshot(&self, path: &Path) -> Result<EditorSnapshot> {
        snapshot::load_snapshot(path)
            .await
            .with_context(|| format!("Failed to load snapshot {}", path.display()))
    }

    pub async fn save_snapshot(&self, path: &Path, snapshot: &EditorSnapshot) -> Result<()> {
        snapshot::save_snapshot(path, snapshot)
            .await
            .with_context(|| format!("Failed to write snapshot {}", path.display()))
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings::from(&self.config)
    }

    /// Wire a save orchestrator for the node types of `snapshot`.
    pub fn save_orchestrator(
        &self,
        snapshot: &EditorSnapshot,
        prompt: DialoguerPrompt,
    ) -> Result<ConcreteSaveOrchestrator> {
        let api = RestWorkflowApi::from_config(&self.config.api)
            .context("Failed to create workflow API client")?;
        let node_types = InMemoryNodeTypes::from_descriptions(snapshot.node_types.clone());

        Ok(SaveOrchestrator::new(api, prompt, ConsoleNotifier, node_types).read_only(self.config.read_only))
    }
}
