use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "filtersync")]
#[command(about = "Keeps remote filter lists synchronized to local disk", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the refresh loop and the status server
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Configuration file (defaults to $FILTERSYNC_CONFIG or config/filtersync.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address for the status server, overrides `server.bind_addr`
    #[arg(long)]
    pub address: Option<SocketAddr>,
}
