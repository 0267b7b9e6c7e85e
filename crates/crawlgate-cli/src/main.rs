//! Crawlgate CLI - Main entry point

use clap::Parser;
use crawlgate_cli::{Cli, Commands};
use crawlgate_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_config = if std::env::var("LOG_LEVEL").is_ok() {
        LogConfig::from_env().unwrap_or_default()
    } else {
        LogConfig::builder()
            .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
            .output(LogOutput::Console)
            .log_file_prefix("crawlgate-cli")
            .build()
    };

    // The CLI works without logging
    let _guard = init_logging(&log_config).ok().flatten();

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn execute_command(cli: &Cli) -> crawlgate_cli::Result<()> {
    let store_url = cli.store_url.as_deref();

    match &cli.command {
        Commands::Control { identity, command } => {
            crawlgate_cli::commands::control::run(store_url, identity, (*command).into()).await
        },
        Commands::Status { identity } => crawlgate_cli::commands::status::run(store_url, identity).await,
        Commands::Reset { identity, phase } => {
            crawlgate_cli::commands::reset::run(store_url, identity, *phase).await
        },
    }
}
