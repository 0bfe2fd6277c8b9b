//! Command-line interface.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default listen address of the line transport.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:7800";

/// MySensors bootloader OTA bridge.
#[derive(Debug, Parser)]
#[command(name = "mysb", version, about)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// `mysb` subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge behind a TCP line transport.
    Serve {
        /// YAML configuration file. MYSB_* environment variables override it.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Address to accept bus adapter connections on.
        #[arg(short, long, default_value = DEFAULT_LISTEN)]
        listen: SocketAddr,

        /// Serve Prometheus metrics on this address.
        #[cfg(feature = "prometheus")]
        #[arg(long)]
        metrics: Option<SocketAddr>,
    },

    /// Decode a firmware file and print its block count and checksum.
    Inspect {
        /// Intel-HEX file.
        file: PathBuf,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,

        /// Also print every block.
        #[arg(long)]
        dump: bool,

        /// Fail on malformed lines instead of skipping them.
        #[arg(long)]
        strict: bool,
    },

    /// Show which firmware a node would receive.
    Resolve {
        /// YAML configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Node id as it appears in topics.
        #[arg(short, long)]
        node: String,

        /// Firmware type the node asserts.
        #[arg(short = 't', long = "type", default_value_t = 0)]
        firmware_type: u16,

        /// Firmware version the node asserts.
        #[arg(long, default_value_t = 0)]
        version: u16,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Handle a single inbound message and print the reply.
    Handle {
        /// YAML configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Inbound topic.
        topic: String,

        /// Inbound payload.
        #[arg(default_value = "")]
        payload: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::parse_from(["mysb", "serve"]);
        match cli.command {
            Command::Serve { config, listen, .. } => {
                assert!(config.is_none());
                assert_eq!(listen, DEFAULT_LISTEN.parse::<SocketAddr>().unwrap());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_resolve() {
        let cli = Cli::parse_from([
            "mysb", "-vv", "resolve", "--node", "12", "--type", "3", "--version", "2",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Resolve {
                node,
                firmware_type,
                version,
                json,
                ..
            } => {
                assert_eq!(node, "12");
                assert_eq!((firmware_type, version), (3, 2));
                assert!(!json);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_handle_without_payload() {
        let cli = Cli::parse_from(["mysb", "handle", "mysensors_rx/255/255/3/0/3"]);
        match cli.command {
            Command::Handle { topic, payload, .. } => {
                assert_eq!(topic, "mysensors_rx/255/255/3/0/3");
                assert_eq!(payload, "");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
