use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8815";

#[derive(Parser)]
#[command(
    name = "cabinet",
    about = "Filing cabinet: a dataset registry with tickets, metadata queries and named loaders",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Base URL of the cabinet server
    #[arg(long, global = true, default_value = DEFAULT_SERVER)]
    pub server: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the cabinet server
    Serve(ServeArgs),
    /// Fetch the table behind a ticket
    Get(GetArgs),
    /// Find registered tickets by exact-match metadata
    Query(QueryArgs),
    /// Store a payload from a JSON file
    Put(PutArgs),
    /// Publish a ticket with metadata
    Register(RegisterArgs),
    /// List named datasets and registered tickets
    List,
    /// Open the cabinet
    Open,
    /// Close the cabinet, persisting persistent records
    Close,
    /// Materialize a named dataset and register it
    Load(LoadArgs),
    /// Show cabinet status
    Status,
    /// Irreversibly delete a cabinet's backing location
    Destroy(DestroyArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML server configuration
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Backing directory of the cabinet
    #[arg(long)]
    pub location: Option<PathBuf>,
    /// Cabinet name; a named cabinet has a stable id
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub ticket: String,
    /// Fetch as framed row batches instead of JSON
    #[arg(long)]
    pub stream: bool,
    /// Rows to print in text mode
    #[arg(long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args)]
pub struct QueryArgs {
    /// key=value terms, all of which must match
    pub terms: Vec<String>,
    /// Fail if nothing matches
    #[arg(long)]
    pub require_match: bool,
}

#[derive(Args)]
pub struct PutArgs {
    /// JSON payload, or a JSON array of row objects
    pub file: PathBuf,
    #[arg(long)]
    pub ephemeral: bool,
}

#[derive(Args)]
pub struct RegisterArgs {
    pub ticket: String,
    /// key=value metadata
    pub metadata: Vec<String>,
}

#[derive(Args)]
pub struct LoadArgs {
    pub name: String,
    #[arg(long)]
    pub ephemeral: bool,
}

#[derive(Args)]
pub struct DestroyArgs {
    #[arg(long)]
    pub location: PathBuf,
    /// Confirm deletion
    #[arg(long)]
    pub yes: bool,
}
