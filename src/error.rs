//! Error types for exhale

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while setting up or running a pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid parameter combination, reported before anything runs
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The requested MIDI output port does not exist
    #[error("could not open MIDI port '{requested}'. Available ports: {available:?}")]
    DeviceUnavailable {
        requested: String,
        available: Vec<String>,
    },

    /// No sensor stream matched the selector
    #[error("no sensor streams matching '{0}' found")]
    SourceUnavailable(String),

    /// MIDI backend failure after the port was opened
    #[error("MIDI error: {0}")]
    Midi(String),

    /// The pipeline thread died without reporting a result
    #[error("pipeline thread failed: {0}")]
    Worker(String),

    /// A recording could not be parsed
    #[error("failed to read {path:?} at line {line}: {reason}")]
    Recording {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;
