//! Flowpad CLI entry point.
//!
//! Binary name: `flowpad`
//!
//! Parses CLI arguments, sets up tracing, loads the configuration, then
//! dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use flowpad_observe::TracingOptions;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    flowpad_observe::init_tracing(&TracingOptions {
        verbosity: cli.verbose,
        quiet: cli.quiet,
        json: cli.log_json,
        otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    flowpad_observe::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "flowpad", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    match cli.command {
        Commands::Resolve(args) => cli::resolve::handle_resolve(&state, args, cli.json).await,
        Commands::Export(args) => cli::export::handle_export(&state, args, cli.json).await,
        Commands::Save(args) => cli::save::handle_save(&state, args, cli.json).await,
        Commands::Activate(args) => cli::save::handle_activate(&state, args, cli.json).await,
        Commands::Diff { snapshot } => cli::save::handle_diff(&state, &snapshot, cli.json).await,
        Commands::Issues(args) => cli::issues::handle_issues(&state, args, cli.json).await,
        Commands::Webhooks { snapshot, test } => {
            cli::issues::handle_webhooks(&state, &snapshot, test, cli.json).await
        }
        Commands::Completions { .. } => unreachable!("handled above"),
    }
}
