//! CLI argument definitions for plaque.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `classify` | Classify raw input as a plate or VIN |
//! | `lookup` | Look up a vehicle identifier across providers |
//! | `resync check` | List adapters that can refresh a listing |
//! | `resync run` | Re-fetch certified fields from chosen adapters |
//! | `score watch` | Follow a listing's live visibility score |
//!
//! Connection flags override the `PLAQUE_*` environment variables, which
//! override the built-in defaults.

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "plaque",
    author,
    version,
    about = "Vehicle listing editor core: identifier lookup, resync and live score"
)]
pub struct Cli {
    /// Marketplace API base URL.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Bearer token sent with every request.
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Transport timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<String>,

    /// Score polling interval in milliseconds.
    #[arg(long, global = true)]
    pub poll_ms: Option<String>,

    /// Pretty-print JSON output.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify raw input without any network call.
    Classify(ClassifyArgs),
    /// Look up a plate or VIN.
    Lookup(LookupArgs),
    /// Check or run a resync for a listing.
    #[command(subcommand)]
    Resync(ResyncCommand),
    /// Live score commands.
    #[command(subcommand)]
    Score(ScoreCommand),
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// Raw input as typed, e.g. `ab-123-cd` or a 17-character VIN.
    pub input: String,
}

#[derive(Debug, Args)]
pub struct LookupArgs {
    /// Plate or VIN; it must be complete.
    pub identifier: String,
}

#[derive(Debug, Subcommand)]
pub enum ResyncCommand {
    /// List resyncable adapters.
    Check(ListingArgs),
    /// Re-fetch from the given adapters.
    Run(ResyncRunArgs),
}

#[derive(Debug, Args)]
pub struct ListingArgs {
    pub listing_id: String,
}

#[derive(Debug, Args)]
pub struct ResyncRunArgs {
    pub listing_id: String,

    /// Adapter interface names; repeat or comma-separate.
    #[arg(long = "adapter", value_delimiter = ',', required = true)]
    pub adapters: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum ScoreCommand {
    /// Print the score as NDJSON each time it or its transport changes.
    Watch(ScoreWatchArgs),
}

#[derive(Debug, Args)]
pub struct ScoreWatchArgs {
    pub listing_id: String,

    /// Stop after this many seconds.
    #[arg(long, default_value_t = 30)]
    pub seconds: u64,
}
