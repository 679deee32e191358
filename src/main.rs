//! kindling CLI: bootstrap a local Kubernetes platform.

use clap::Parser;
use kindling::cli::Cli;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = kindling::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout carries plan output and completions.
fn init_logging(verbose: bool) {
    let default = if verbose { "kindling=debug" } else { "kindling=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
