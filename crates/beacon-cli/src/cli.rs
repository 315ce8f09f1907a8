//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Server address (ws:// or wss://), overrides the configuration
    #[arg(short, long)]
    pub url: Option<String>,

    /// Session credential, overrides the configuration
    #[arg(short, long)]
    pub token: Option<String>,

    /// Probe the server host and pause the session while it is unreachable
    #[arg(long)]
    pub probe_network: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Connect and print session events until interrupted
    Listen {
        /// Only print these event kinds (e.g. notification, disconnected)
        #[arg(short, long = "event")]
        events: Vec<String>,
        /// Exit after this many printed events
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
    /// Send a single envelope and exit
    Send {
        /// Envelope type
        #[arg(short = 'k', long = "type", default_value = "notification")]
        kind: String,
        /// JSON payload; plain text is sent as a string
        payload: String,
    },
    /// Print an example configuration file
    Config,
}
