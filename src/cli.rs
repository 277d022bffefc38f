use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "podium-layout")]
#[command(about = "Compose podlet fragments into a layout page", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the layout page and podlet resource proxy
    Serve(ServeArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind, overrides `server.bind_addr`
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Configuration file (default: $PODIUM_CONFIG or config/layout.toml)
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}
