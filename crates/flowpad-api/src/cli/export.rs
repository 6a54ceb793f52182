//! `flowpad export`: print or write the document a save would send.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use console::style;

use flowpad_core::node_types::InMemoryNodeTypes;
use flowpad_core::workflow::helpers::{remove_foreign_credentials, update_node_positions};
use flowpad_core::workflow::serializer::workflow_data_to_save;

use crate::state::AppState;

#[derive(Args)]
pub struct ExportArgs {
    /// Editor snapshot file.
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Move the nodes so the top-left one sits at X Y.
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    pub position: Option<Vec<f64>>,

    /// Credential id the importing user may use. When given, all other
    /// credentials are stripped.
    #[arg(long = "credential")]
    pub credentials: Vec<String>,

    /// Write to this file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

pub async fn handle_export(state: &AppState, args: ExportArgs, json: bool) -> Result<()> {
    let snapshot = state.load_snapshot(&args.snapshot).await?;
    let node_types = InMemoryNodeTypes::from_descriptions(snapshot.node_types.clone());

    let mut document = workflow_data_to_save(&snapshot.workflow, &node_types);
    if let Some([x, y]) = args.position.as_deref() {
        update_node_positions(&mut document, [*x, *y]);
    }
    if !args.credentials.is_empty() {
        remove_foreign_credentials(&mut document, &args.credentials);
    }

    let rendered = serde_json::to_string_pretty(&document)?;
    let Some(path) = args.output else {
        println!("{rendered}");
        return Ok(());
    };

    tokio::fs::write(&path, rendered)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if json {
        let out = serde_json::json!({
            "path": path.display().to_string(),
            "nodes": document.nodes.len(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!(
            "  {} Exported '{}' ({} nodes) to {}",
            style("*").green().bold(),
            style(&document.name).cyan(),
            document.nodes.len(),
            path.display()
        );
        println!();
    }
    Ok(())
}
