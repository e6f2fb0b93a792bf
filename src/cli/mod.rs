//! CLI interface for Gatehouse

pub mod commands;
mod output;

pub use output::*;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gatehouse")]
#[command(author = "Krakaw")]
#[command(version)]
#[command(about = "Session and Basic auth gate for HTTP services", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new gatehouse.toml configuration file
    Init,

    /// Start the HTTP server
    Serve {
        /// Host to bind to (defaults to the config value)
        #[arg(long, env = "GATEHOUSE_HOST")]
        host: Option<String>,

        /// Port to listen on (defaults to the config value)
        #[arg(short, long, env = "GATEHOUSE_PORT")]
        port: Option<u16>,
    },

    /// Print the bcrypt hash of a password for the [users] table
    HashPassword {
        /// Password to hash
        password: String,

        /// bcrypt cost factor
        #[arg(short, long, default_value_t = bcrypt::DEFAULT_COST)]
        cost: u32,
    },

    /// List configured users
    Users,
}
