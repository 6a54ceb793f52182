//! `flowpad issues` and `flowpad webhooks`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use flowpad_core::node_types::{InMemoryNodeTypes, NodeTypeRegistry};
use flowpad_core::workflow::graph::Workflow;
use flowpad_core::workflow::helpers::{check_ready_for_execution, node_types_max_count};
use flowpad_core::workflow::resolver::{ParameterResolver, ResolutionEnv};
use flowpad_core::workflow::webhook::webhook_url;

use crate::state::AppState;

#[derive(Args)]
pub struct IssuesArgs {
    /// Editor snapshot file.
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Check only this node and the nodes feeding it.
    #[arg(long)]
    pub last_node: Option<String>,
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

pub async fn handle_issues(state: &AppState, args: IssuesArgs, json: bool) -> Result<()> {
    let snapshot = state.load_snapshot(&args.snapshot).await?;
    let workflow = Workflow::from_editor(&snapshot.workflow);
    let node_types = InMemoryNodeTypes::from_descriptions(snapshot.node_types.clone());

    let issues = check_ready_for_execution(&workflow, &node_types, args.last_node.as_deref()).unwrap_or_default();
    let over_limit: BTreeMap<_, _> = node_types_max_count(&snapshot.workflow.nodes, &node_types)
        .into_iter()
        .filter(|(_, count)| count.exist > count.max as usize)
        .collect();

    if json {
        let out = serde_json::json!({
            "ready": issues.is_empty() && over_limit.is_empty(),
            "issues": issues,
            "overLimit": over_limit,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if issues.is_empty() && over_limit.is_empty() {
        println!();
        println!(
            "  {} '{}' is ready to execute",
            style("✓").green().bold(),
            style(&snapshot.workflow.name).cyan()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Node").fg(Color::Cyan),
            Cell::new("Kind"),
            Cell::new("Issue"),
        ]);

    for (node_name, node_issues) in &issues {
        if node_issues.type_unknown {
            table.add_row(vec![
                Cell::new(node_name),
                Cell::new("type").fg(Color::Red),
                Cell::new("Node type is not installed"),
            ]);
        }
        for messages in node_issues.parameters.values() {
            for message in messages {
                table.add_row(vec![Cell::new(node_name), Cell::new("parameter"), Cell::new(message)]);
            }
        }
        for messages in node_issues.credentials.values() {
            for message in messages {
                table.add_row(vec![
                    Cell::new(node_name),
                    Cell::new("credential").fg(Color::Yellow),
                    Cell::new(message),
                ]);
            }
        }
    }

    for (node_type, count) in &over_limit {
        table.add_row(vec![
            Cell::new(count.node_names.join(", ")),
            Cell::new("limit").fg(Color::Red),
            Cell::new(format!("{node_type} allows {} node(s), found {}", count.max, count.exist)),
        ]);
    }

    println!("{table}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

pub async fn handle_webhooks(state: &AppState, snapshot_path: &Path, test: bool, json: bool) -> Result<()> {
    let snapshot = state.load_snapshot(snapshot_path).await?;
    let workflow = Workflow::from_editor(&snapshot.workflow);
    let node_types = InMemoryNodeTypes::from_descriptions(snapshot.node_types.clone());

    let mut rows = Vec::new();
    for node in workflow.nodes().filter(|n| !n.is_disabled()) {
        let Some(description) = node_types.get_by_name_and_version(&node.node_type, Some(node.type_version)) else {
            continue;
        };
        if description.webhooks.is_empty() {
            continue;
        }

        let env = ResolutionEnv {
            workflow: &workflow,
            node_types: &node_types,
            execution: snapshot.execution.as_ref(),
            pin_data: snapshot.workflow.pin_data.as_ref(),
            active_node: Some(node.name.as_str()),
            settings: state.resolver_settings(),
            variables: &state.config.environment,
        };
        let resolver = ParameterResolver::new(env);

        for webhook in &description.webhooks {
            let url = webhook_url(
                webhook,
                node,
                &snapshot.workflow.id,
                &state.config.webhooks,
                test,
                &resolver,
            );
            rows.push((node.name.clone(), webhook.name.clone(), url));
        }
    }

    if json {
        let out: Vec<_> = rows
            .iter()
            .map(|(node, name, url)| serde_json::json!({ "node": node, "webhook": name, "url": url }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("  {}", style("No webhook nodes in this workflow").dim());
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Node").fg(Color::Cyan),
            Cell::new("Webhook"),
            Cell::new(if test { "Test URL" } else { "Production URL" }),
        ]);
    for (node, name, url) in &rows {
        table.add_row(vec![Cell::new(node), Cell::new(name), Cell::new(url)]);
    }
    println!("{table}");
    Ok(())
}
