use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use judoc_engine::Strategy;
use judoc_server::BackendKind;
use judoc_types::Consistency;

#[derive(Parser)]
#[command(
    name = "judoc",
    about = "judoc -- chunked object storage over a wide-column store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Server used by the client commands
    #[arg(long, global = true, default_value = "http://localhost:9122/")]
    pub url: String,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the judoc server
    Serve(ServeArgs),
    /// Upload an object
    Put(PutArgs),
    /// Download an object
    Get(GetArgs),
    /// Remove an object
    Rm(RmArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML config file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    #[arg(long)]
    pub backend: Option<BackendKind>,
    /// Cluster contact points, comma separated
    #[arg(long, value_delimiter = ',')]
    pub cluster: Vec<String>,
    #[arg(long)]
    pub keyspace: Option<String>,
    /// Block size in bytes
    #[arg(long)]
    pub block_size: Option<usize>,
    /// Write consistency level
    #[arg(long)]
    pub consistency: Option<Consistency>,
    /// Manifest layout: index-row or range-scan
    #[arg(long)]
    pub strategy: Option<Strategy>,
    #[arg(long)]
    pub scan_page_size: Option<usize>,
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    #[arg(long)]
    pub capath: Option<PathBuf>,
    #[arg(long)]
    pub certpath: Option<PathBuf>,
    #[arg(long)]
    pub keypath: Option<PathBuf>,
}

#[derive(Args)]
pub struct PutArgs {
    pub namespace: String,
    pub key: String,
    /// Read the object from this file instead of stdin
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct GetArgs {
    pub namespace: String,
    pub key: String,
    /// Write the object to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct RmArgs {
    pub namespace: String,
    pub key: String,
}
