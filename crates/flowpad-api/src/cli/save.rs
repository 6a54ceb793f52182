//! `flowpad save`, `flowpad activate` and `flowpad diff`.
//!
//! Also provides the terminal implementations of the orchestrator's
//! conflict prompt and notifier ports.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};

use flowpad_core::service::save::{ConflictPrompt, NewWorkflowRequest, Notifier, SaveRequest};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Asks on the terminal whether to overwrite remote changes.
///
/// The spinner is suspended while the question is shown.
pub struct DialoguerPrompt {
    spinner: ProgressBar,
}

impl DialoguerPrompt {
    pub fn new(spinner: ProgressBar) -> Self {
        Self { spinner }
    }
}

impl ConflictPrompt for DialoguerPrompt {
    async fn confirm_overwrite(&self, workflow_id: &str) -> bool {
        let spinner = self.spinner.clone();
        let prompt = format!(
            "Workflow {} was changed by someone else since you opened it. Overwrite their changes?",
            style(workflow_id).cyan()
        );

        tokio::task::spawn_blocking(move || {
            spinner.suspend(|| Confirm::new().with_prompt(prompt).default(false).interact())
        })
        .await
        .ok()
        .and_then(|answer| answer.ok())
        .unwrap_or(false)
    }
}

/// Prints save failures to stderr.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn error(&self, title: &str, message: &str) {
        eprintln!("  {} {}: {}", style("✗").red().bold(), style(title).bold(), message);
    }
}

fn spinner(json: bool, message: &'static str) -> Result<ProgressBar> {
    if json {
        return Ok(ProgressBar::hidden());
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(80));
    Ok(spinner)
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct SaveArgs {
    /// Editor snapshot file. Updated in place after a successful save.
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Rename the workflow.
    #[arg(long)]
    pub name: Option<String>,

    /// Tag id to set (repeatable). Replaces the existing tags.
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Overwrite remote changes without asking.
    #[arg(long)]
    pub force: bool,

    /// Save as a new workflow even if the snapshot was saved before.
    #[arg(long)]
    pub as_new: bool,

    /// With --as-new: give every node a new id.
    #[arg(long, requires = "as_new")]
    pub reset_ids: bool,

    /// With --as-new: give every webhook node a new webhook id.
    #[arg(long, requires = "as_new")]
    pub reset_webhooks: bool,
}

pub async fn handle_save(state: &AppState, args: SaveArgs, json: bool) -> Result<()> {
    let mut snapshot = state.load_snapshot(&args.snapshot).await?;
    let spinner = spinner(json, "Saving workflow...")?;
    let orchestrator = state.save_orchestrator(&snapshot, DialoguerPrompt::new(spinner.clone()))?;

    let tags = (!args.tags.is_empty()).then_some(args.tags);
    let saved = if args.as_new {
        let request = NewWorkflowRequest {
            name: args.name,
            tags,
            reset_webhook_urls: args.reset_webhooks,
            reset_node_ids: args.reset_ids,
            data: None,
        };
        orchestrator.save_as_new_workflow(&mut snapshot.workflow, request).await
    } else {
        let request = SaveRequest {
            id: None,
            name: args.name,
            tags,
            force: args.force,
        };
        orchestrator.save_current_workflow(&mut snapshot.workflow, request).await
    };
    spinner.finish_and_clear();

    if saved {
        state.save_snapshot(&args.snapshot, &snapshot).await?;
    }

    let workflow = &snapshot.workflow;
    if json {
        let out = serde_json::json!({
            "saved": saved,
            "id": workflow.id,
            "name": workflow.name,
            "versionId": workflow.version_id,
            "state": format!("{:?}", orchestrator.state()),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if saved {
        println!();
        println!(
            "  {} Saved workflow '{}'",
            style("*").green().bold(),
            style(&workflow.name).cyan()
        );
        println!("  ID: {}", workflow.id);
        if let Some(version) = &workflow.version_id {
            println!("  Version: {version}");
        }
        println!();
    }

    if !saved {
        bail!("Workflow '{}' was not saved", workflow.name);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Activate
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ActivateArgs {
    /// Editor snapshot file.
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Workflow to switch (defaults to the snapshot's workflow).
    #[arg(long)]
    pub workflow_id: Option<String>,

    /// Deactivate instead of activate.
    #[arg(long)]
    pub off: bool,

    /// Send the full document along with the switch.
    #[arg(long)]
    pub full: bool,
}

pub async fn handle_activate(state: &AppState, args: ActivateArgs, json: bool) -> Result<()> {
    let mut snapshot = state.load_snapshot(&args.snapshot).await?;
    let spinner = spinner(json, "Updating workflow...")?;
    let orchestrator = state.save_orchestrator(&snapshot, DialoguerPrompt::new(spinner.clone()))?;

    let workflow_id = args.workflow_id.unwrap_or_else(|| snapshot.workflow.id.clone());
    let result = orchestrator
        .update_workflow(&mut snapshot.workflow, &workflow_id, Some(!args.off), !args.full)
        .await;
    spinner.finish_and_clear();

    let record = result.map_err(|e| anyhow::anyhow!("Failed to update workflow {workflow_id}: {e}"))?;
    if workflow_id == snapshot.workflow.id {
        state.save_snapshot(&args.snapshot, &snapshot).await?;
    }

    if json {
        let out = serde_json::json!({
            "id": record.id,
            "active": record.active,
            "versionId": record.version_id,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let status = if record.active {
            style("active").green()
        } else {
            style("inactive").dim()
        };
        println!();
        println!(
            "  {} Workflow '{}' is now {}",
            style("*").green().bold(),
            style(&record.name).cyan(),
            status
        );
        println!();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

pub async fn handle_diff(state: &AppState, snapshot_path: &Path, json: bool) -> Result<()> {
    let snapshot = state.load_snapshot(snapshot_path).await?;
    if !snapshot.workflow.is_saved() {
        bail!("Workflow '{}' has never been saved", snapshot.workflow.name);
    }

    let orchestrator = state.save_orchestrator(&snapshot, DialoguerPrompt::new(ProgressBar::hidden()))?;
    let changed = orchestrator
        .data_has_changed(&snapshot.workflow, &snapshot.workflow.id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to fetch workflow {}: {e}", snapshot.workflow.id))?;

    if json {
        let out = serde_json::json!({
            "id": snapshot.workflow.id,
            "changed": changed,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if changed {
        println!(
            "  {} '{}' differs from the stored workflow",
            style("~").yellow().bold(),
            style(&snapshot.workflow.name).cyan()
        );
    } else {
        println!(
            "  {} '{}' matches the stored workflow",
            style("=").green().bold(),
            style(&snapshot.workflow.name).cyan()
        );
    }
    Ok(())
}
