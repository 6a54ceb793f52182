//! CLI command definitions for the `flowpad` binary.
//!
//! Uses clap derive macros for argument parsing. Every command works on an
//! editor snapshot file (`--snapshot`).

pub mod export;
pub mod issues;
pub mod resolve;
pub mod save;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Resolve, export and save visual-editor workflows from the terminal.
#[derive(Parser)]
#[command(name = "flowpad", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export trace spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve an expression against the active node of a snapshot.
    Resolve(resolve::ResolveArgs),

    /// Print the persistence document a save would send.
    Export(export::ExportArgs),

    /// Save the snapshot's workflow to the backend.
    Save(save::SaveArgs),

    /// Switch a saved workflow on or off.
    Activate(save::ActivateArgs),

    /// Check whether the stored workflow differs from the snapshot.
    Diff {
        /// Editor snapshot file.
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// List issues that keep the workflow from executing.
    Issues(issues::IssuesArgs),

    /// Show webhook and form URLs of trigger nodes.
    Webhooks {
        /// Editor snapshot file.
        #[arg(long)]
        snapshot: PathBuf,

        /// Show test URLs instead of production URLs.
        #[arg(long)]
        test: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
