//! Chatter2 server entry point

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};

use chatter_cli::{cli::Cli, config::AppConfig, error::Result};
use chatter_runtime::{ChatServer, TcpChatListener};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = load_configuration(&cli)?;
    config.apply_overrides(&cli);
    config.validate()?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    // Initialize logging
    setup_logging(config.logging.max_level(cli.verbose)?, config.logging.with_target);

    let server = Arc::new(ChatServer::new(config.server.clone())?);
    let listener = TcpChatListener::bind(Arc::clone(&server)).await?;
    info!(
        name = %server.identity().name,
        id = server.identity().id,
        address = %listener.local_addr()?,
        "Chatter2 server started"
    );

    if let Err(e) = listener.run(shutdown_signal()).await {
        error!("Listener failed: {}", e);
        std::process::exit(1);
    }

    let stats = server.stats().await;
    info!(
        connections = stats.connections_opened,
        messages = stats.messages.appended,
        "Chatter2 server exited successfully"
    );
    Ok(())
}

/// Setup logging at the given level
fn setup_logging(level: Level, with_target: bool) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(with_target)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    if let Some(config_path) = &cli.config {
        AppConfig::load_from_file(config_path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Resolve on ctrl-c
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
