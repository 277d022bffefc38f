mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use podium_layout::{api, config::Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let mut config = Config::load(args.config)
                .map_err(|e| format!("Failed to load config: {}", e))?;
            if let Some(address) = args.address {
                config.server.bind_addr = address;
            }
            api::run(config).await?
        }
    }

    Ok(())
}
