//! Sensor stream discovery and polling

use std::time::Instant;

use crate::error::{Error, Result};

/// Sample rate assumed when a stream advertises none
pub const FALLBACK_RATE: f64 = 100.0;

/// One multi-channel reading from a sensor stream
#[derive(Debug, Clone)]
pub struct Frame {
    /// When this frame was received; live calibration is timed against it
    pub timestamp: Instant,

    /// One value per sensor channel
    pub values: Vec<f64>,
}

impl Frame {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            timestamp: Instant::now(),
            values,
        }
    }

    /// Value of one channel
    pub fn channel(&self, index: usize) -> Result<f64> {
        self.values.get(index).copied().ok_or_else(|| {
            Error::Configuration(format!(
                "channel {} requested but the stream only carries {} channels",
                index,
                self.values.len()
            ))
        })
    }
}

/// Description of a discoverable stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Advertised stream name
    pub name: String,

    /// Nominal sample rate in Hz (0 when unknown)
    pub nominal_rate: f64,

    /// Transport-specific locator, e.g. a socket address
    pub locator: String,
}

impl StreamInfo {
    /// Nominal rate, or [`FALLBACK_RATE`] when the stream advertises none
    pub fn effective_rate(&self) -> f64 {
        if self.nominal_rate > 0.0 {
            self.nominal_rate
        } else {
            FALLBACK_RATE
        }
    }
}

/// An open stream that can be polled without blocking
pub trait SensorStream: Send {
    /// Description of this stream
    fn info(&self) -> &StreamInfo;

    /// Pull one frame if one is ready. `Ok(None)` means nothing yet.
    fn pull(&mut self) -> Result<Option<Frame>>;
}

/// Finds and opens sensor streams
pub trait StreamResolver {
    /// Streams currently visible
    fn resolve(&self) -> Result<Vec<StreamInfo>>;

    /// Open a stream returned by [`StreamResolver::resolve`]
    fn open(&self, info: &StreamInfo) -> Result<Box<dyn SensorStream>>;
}

/// Pick a stream by index among those whose name contains `filter`.
///
/// Out-of-range indices select the last match.
pub fn select_stream<'a>(
    streams: &'a [StreamInfo],
    filter: &str,
    index: usize,
) -> Result<&'a StreamInfo> {
    let matching: Vec<&StreamInfo> = streams.iter().filter(|s| s.name.contains(filter)).collect();
    if matching.is_empty() {
        return Err(Error::SourceUnavailable(filter.to_string()));
    }
    Ok(matching[index.min(matching.len() - 1)])
}
