use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "foa",
    about = "FOA: open API gateway over an append-only chain ledger",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the gateway against a simulated ledger network
    Serve(ServeArgs),
    /// Compute a chain id from external ids
    ChainId(ChainIdArgs),
    /// Compute an entry hash
    EntryHash(EntryHashArgs),
    /// Print the default configuration as TOML
    Config,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Configuration file; defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Overrides `server.bind_addr`
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct ChainIdArgs {
    #[arg(required = true)]
    pub ext_ids: Vec<String>,
    /// Treat arguments as base64 instead of UTF-8 text
    #[arg(long)]
    pub base64: bool,
}

#[derive(Args)]
pub struct EntryHashArgs {
    /// Chain id in hex
    #[arg(long)]
    pub chain: String,
    #[arg(long = "ext-id")]
    pub ext_ids: Vec<String>,
    #[arg(long, default_value = "")]
    pub content: String,
    /// Treat external ids and content as base64 instead of UTF-8 text
    #[arg(long)]
    pub base64: bool,
}
