use clap::{Parser, Subcommand};

/// Arrow Tower — check-in, route completion and NFT mint service
#[derive(Parser)]
#[command(name = "arrowtower", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server, completion sweep and mint worker
    Serve {
        /// Port to bind
        #[arg(short, long, default_value = "8090")]
        port: u16,
    },

    /// One-off operator mint for a wallet, through the same relay boundary
    Mint {
        /// Target wallet address (0x…)
        #[arg(long)]
        wallet: String,
    },

    /// Seed reference routes, POIs and demo users
    Seed,
}
