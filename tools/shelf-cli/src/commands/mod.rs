//! CLI command implementations.

pub mod allocate;
pub mod catalog;
pub mod config;
pub mod simulate;

use clap::{Args, Subcommand};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}

/// Arguments for the catalog command.
#[derive(Args)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommand,
}

#[derive(Subcommand)]
pub enum CatalogCommand {
    /// Normalize a catalog file and list every stock pool.
    Show {
        /// JSON file: an array of product records with `id`, or an object
        /// keyed by product id.
        #[arg(long)]
        catalog: String,
    },
}

/// Arguments for the allocate command.
#[derive(Args)]
pub struct AllocateArgs {
    /// SKUs to allocate.
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Allocations in flight at once (default: all of them).
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// Arguments for the simulate command.
#[derive(Args)]
pub struct SimulateArgs {
    /// Catalog file to seed the store with.
    #[arg(long)]
    pub catalog: String,

    /// Product every shopper wants.
    #[arg(short, long)]
    pub product: String,

    /// Variant of the product.
    #[arg(long)]
    pub variant: Option<String>,

    /// Concurrent shoppers (default: from config).
    #[arg(short, long)]
    pub shoppers: Option<usize>,

    /// Units each shopper adds (default: from config).
    #[arg(short, long)]
    pub quantity: Option<i64>,
}
