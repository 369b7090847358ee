//! Configuration schema definitions

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mapping::Mapping;
use crate::sources::UdpEndpoint;

/// Main configuration for exhale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExhaleConfig {
    /// Where respiration samples come from
    pub source: SourceConfig,

    /// Low-pass filter settings
    #[serde(default)]
    pub filter: FilterConfig,

    /// MIDI output settings
    #[serde(default)]
    pub midi: MidiConfig,

    /// What the signal drives on the MIDI port
    #[serde(default)]
    pub mapping: Mapping,

    /// Queue between the pipeline and the display
    #[serde(default)]
    pub relay: RelayConfig,

    /// Terminal display settings
    #[serde(default)]
    pub viz: VizConfig,
}

impl ExhaleConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.filter.cutoff > 0.0) {
            return invalid(format!("cutoff must be positive, got {} Hz", self.filter.cutoff));
        }

        match &self.source {
            SourceConfig::Live(live) => {
                live.calibration_window()?;
                for stream in &live.streams {
                    if !(stream.sample_rate >= 0.0) {
                        return invalid(format!(
                            "stream '{}' has a negative sample rate",
                            stream.name
                        ));
                    }
                }
            }
            SourceConfig::Prerecorded(rec) => {
                if !(rec.sampling_rate > 0.0) {
                    return invalid(format!(
                        "sampling_rate must be positive, got {} Hz",
                        rec.sampling_rate
                    ));
                }
                if self.filter.cutoff >= 0.5 * rec.sampling_rate {
                    return invalid(format!(
                        "cutoff ({} Hz) must be below half the sampling rate ({} Hz)",
                        self.filter.cutoff,
                        0.5 * rec.sampling_rate
                    ));
                }
            }
        }

        self.mapping.validate()?;

        if self.relay.capacity == 0 {
            return invalid("relay capacity must be at least 1".to_string());
        }
        if self.viz.history == 0 {
            return invalid("viz history must be at least 1".to_string());
        }
        if !(self.viz.y_min < self.viz.y_max) {
            return invalid(format!(
                "viz y_min ({}) must be below y_max ({})",
                self.viz.y_min, self.viz.y_max
            ));
        }
        if self.viz.tick_ms == 0 {
            return invalid("viz tick_ms must be at least 1".to_string());
        }

        Ok(())
    }
}

fn invalid(msg: String) -> Result<()> {
    Err(Error::Configuration(msg))
}

/// Sample source selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Live biosensor stream
    Live(LiveConfig),
    /// Recording replayed at its original rate
    Prerecorded(PrerecordedConfig),
}

/// Live stream settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Substring a stream name must contain (default: OpenSignals)
    #[serde(default = "default_stream_filter")]
    pub stream_filter: String,

    /// Index among matching streams (default: 0)
    #[serde(default)]
    pub stream_index: usize,

    /// Sensor channel carrying respiration (default: 1)
    #[serde(default = "default_channel")]
    pub channel: usize,

    /// Calibration window in seconds (default: 30)
    #[serde(default = "default_calibration_secs")]
    pub calibration_secs: f64,

    /// Wait after an empty poll in milliseconds (default: 1)
    #[serde(default = "default_idle_ms")]
    pub idle_ms: u64,

    /// Known UDP streams
    #[serde(default)]
    pub streams: Vec<UdpEndpoint>,
}

impl LiveConfig {
    /// Calibration window as a duration.
    ///
    /// Fails for negative, NaN or unrepresentably long windows.
    pub fn calibration_window(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.calibration_secs).map_err(|_| {
            Error::Configuration(format!(
                "calibration_secs must be a representable number of seconds, zero or more, got {}",
                self.calibration_secs
            ))
        })
    }
}

fn default_stream_filter() -> String { "OpenSignals".to_string() }
fn default_channel() -> usize { 1 }
fn default_calibration_secs() -> f64 { 30.0 }
fn default_idle_ms() -> u64 { 1 }

/// Prerecorded file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrerecordedConfig {
    /// Delimited text file with a header row
    pub input_file: PathBuf,

    /// Sampling rate of the recording in Hz (default: 1000)
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,

    /// Column holding the amplitude (default: 0)
    #[serde(default)]
    pub column: usize,

    /// Field delimiter (default: ',')
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Replay in real time (default: true)
    #[serde(default = "default_pace")]
    pub pace: bool,
}

fn default_sampling_rate() -> f64 { 1000.0 }
fn default_delimiter() -> char { ',' }
fn default_pace() -> bool { true }

/// Filter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Low-pass cutoff in Hz (default: 1.0)
    #[serde(default = "default_cutoff")]
    pub cutoff: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { cutoff: default_cutoff() }
    }
}

fn default_cutoff() -> f64 { 1.0 }

/// MIDI output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidiConfig {
    /// Output port name (default: "HCI 1")
    #[serde(default = "default_port")]
    pub port: String,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

fn default_port() -> String { "HCI 1".to_string() }

/// Relay queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Maximum queued values (default: 2000)
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { capacity: default_capacity() }
    }
}

fn default_capacity() -> usize { 2000 }

/// Terminal display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VizConfig {
    /// Show the live plot (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Values kept for display (default: 20000)
    #[serde(default = "default_history")]
    pub history: usize,

    /// Bottom of the plot (default: -2)
    #[serde(default = "default_y_min")]
    pub y_min: f64,

    /// Top of the plot (default: 2)
    #[serde(default = "default_y_max")]
    pub y_max: f64,

    /// Redraw interval in milliseconds (default: 20)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            history: default_history(),
            y_min: default_y_min(),
            y_max: default_y_max(),
            tick_ms: default_tick_ms(),
        }
    }
}

fn default_enabled() -> bool { true }
fn default_history() -> usize { 20000 }
fn default_y_min() -> f64 { -2.0 }
fn default_y_max() -> f64 { 2.0 }
fn default_tick_ms() -> u64 { 20 }
