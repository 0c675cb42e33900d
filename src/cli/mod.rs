//! CLI module for the storefront edge runtime
//!
//! - `serve`: run the edge server (default)
//! - `check-config`: load and validate configuration, then exit

pub mod serve;

use clap::{Parser, Subcommand};

/// Storefront edge - response cache and reverse proxy for server-rendered storefronts
#[derive(Parser)]
#[command(name = "storefront-edge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the edge server
    Serve(serve::ServeArgs),

    /// Validate configuration (routes, patterns, cache backend) and exit
    CheckConfig,
}
