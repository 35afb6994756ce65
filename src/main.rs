use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use outrider::cli;
use outrider::errors::OutriderError;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();

    debug!(
        built_at = env!("BUILD_TIMESTAMP"),
        git_hash = option_env!("GIT_HASH").unwrap_or("unknown"),
        "Starting outrider"
    );

    let result = match cli.command {
        cli::Commands::Ask(args) => cli::ask::handle_ask(args).await,
        cli::Commands::Validate(args) => cli::validate::handle_validate(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let exit_code = match &e {
            OutriderError::Config(_) => 2,
            OutriderError::Retrieval(_) | OutriderError::Generation(_) => 3,
            OutriderError::Cancelled(_) => 4,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}
