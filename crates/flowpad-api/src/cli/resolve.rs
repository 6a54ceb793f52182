//! `flowpad resolve`: evaluate an expression the way the parameter panel
//! previews it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde_json::Map;

use flowpad_core::node_types::InMemoryNodeTypes;
use flowpad_core::workflow::expression::value_to_string;
use flowpad_core::workflow::graph::Workflow;
use flowpad_core::workflow::resolver::{ParameterResolver, ResolutionEnv, ResolveOptions};
use flowpad_types::execution::TargetItem;

use crate::state::AppState;

#[derive(Args)]
pub struct ResolveArgs {
    /// Expression, with or without the leading `=`.
    pub expression: String,

    /// Editor snapshot file.
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Node to resolve for (defaults to the snapshot's active node).
    #[arg(long)]
    pub node: Option<String>,

    /// Item index to resolve against.
    #[arg(long)]
    pub item: Option<usize>,

    /// Run index of the input node.
    #[arg(long)]
    pub run: Option<usize>,

    /// Output branch of the input node.
    #[arg(long)]
    pub branch: Option<usize>,

    /// Read input from this node instead of the direct parent.
    #[arg(long)]
    pub input_node: Option<String>,
}

pub async fn handle_resolve(state: &AppState, args: ResolveArgs, json: bool) -> Result<()> {
    let snapshot = state.load_snapshot(&args.snapshot).await?;
    let active = args
        .node
        .or_else(|| snapshot.active_node.clone())
        .context("No active node: pass --node or set activeNode in the snapshot")?;

    let workflow = Workflow::from_editor(&snapshot.workflow);
    let node_types = InMemoryNodeTypes::from_descriptions(snapshot.node_types.clone());
    let siblings = workflow
        .get_node(&active)
        .map(|node| node.parameters.clone())
        .with_context(|| format!("Node '{active}' is not part of the workflow"))?;

    let env = ResolutionEnv {
        workflow: &workflow,
        node_types: &node_types,
        execution: snapshot.execution.as_ref(),
        pin_data: snapshot.workflow.pin_data.as_ref(),
        active_node: Some(active.as_str()),
        settings: state.resolver_settings(),
        variables: &state.config.environment,
    };
    let resolver = ParameterResolver::new(env);

    let options = ResolveOptions {
        target_item: args.item.map(|item_index| TargetItem {
            node_name: active.clone(),
            run_index: args.run.unwrap_or(0),
            item_index,
            output_index: args.branch.unwrap_or(0),
        }),
        input_node_name: args.input_node,
        input_run_index: args.run,
        input_branch_index: args.branch,
        additional_keys: Map::new(),
    };

    let expression = if args.expression.starts_with('=') {
        args.expression
    } else {
        format!("={}", args.expression)
    };

    let resolved = resolver
        .resolve_expression(&expression, &siblings, &options)
        .with_context(|| format!("Failed to resolve expression for node '{active}'"))?;

    if json {
        let out = serde_json::json!({
            "node": active,
            "expression": expression,
            "result": resolved,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    match resolved {
        Some(value) => println!("{}", value_to_string(&value)),
        None => println!(
            "  {} No source item could be traced for node '{}'",
            style("!").yellow().bold(),
            style(&active).cyan()
        ),
    }
    Ok(())
}
