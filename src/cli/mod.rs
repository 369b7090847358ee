//! CLI interface for exhale

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Respiration-controlled MIDI
#[derive(Parser)]
#[command(name = "exhale")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Drive MIDI from live or prerecorded respiration data
    Play {
        /// Configuration file path
        #[arg(short, long, default_value = "exhale.yaml")]
        config: PathBuf,

        /// Run without the terminal plot
        #[arg(long)]
        headless: bool,
    },

    /// List MIDI output ports
    Ports,

    /// List configured sensor streams and which ones match the filter
    Streams {
        /// Configuration file path
        #[arg(short, long, default_value = "exhale.yaml")]
        config: PathBuf,
    },

    /// Validate a configuration file
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "exhale.yaml")]
        config: PathBuf,
    },

    /// Generate an example configuration file
    Init,
}
