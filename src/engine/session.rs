//! Run setup: acquire the source and build the filter before any output

use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};

use super::cancel::CancellationToken;
use super::midi::MidiSink;
use super::pipeline::{LiveOptions, Pipeline, RunStats};
use super::relay::RelaySender;
use crate::config::{ExhaleConfig, SourceConfig};
use crate::dsp::LowPassFilter;
use crate::error::{Error, Result};
use crate::mapping::Mapping;
use crate::sources::{load_recording, select_stream, SensorStream, StreamResolver, UdpResolver};

enum Input {
    Live {
        stream: Box<dyn SensorStream>,
        options: LiveOptions,
    },
    Prerecorded {
        samples: Vec<f64>,
        pace: bool,
    },
}

/// A run whose source is acquired and whose parameters are checked
pub struct Session {
    input: Input,
    filter: LowPassFilter,
    mapping: Mapping,
}

impl Session {
    /// Acquire the configured source, using UDP for live streams
    pub fn open(config: &ExhaleConfig) -> Result<Self> {
        let resolver = match &config.source {
            SourceConfig::Live(live) => UdpResolver::new(live.streams.clone()),
            SourceConfig::Prerecorded(_) => UdpResolver::default(),
        };
        Self::open_with(config, &resolver)
    }

    /// Acquire the configured source through `resolver`
    pub fn open_with(config: &ExhaleConfig, resolver: &dyn StreamResolver) -> Result<Self> {
        config.validate()?;

        let (input, filter) = match &config.source {
            SourceConfig::Live(live) => {
                info!("Resolving {} streams...", live.stream_filter);
                let streams = resolver.resolve()?;
                let selected = select_stream(&streams, &live.stream_filter, live.stream_index)?;
                let rate = selected.effective_rate();
                info!(
                    "Using stream '{}', fs={:.1} Hz, channel={}",
                    selected.name, rate, live.channel
                );

                let filter = LowPassFilter::new(rate, config.filter.cutoff)?;
                let stream = resolver.open(selected)?;
                let options = LiveOptions {
                    channel: live.channel,
                    calibration: live.calibration_window()?,
                    idle: Duration::from_millis(live.idle_ms),
                };
                (Input::Live { stream, options }, filter)
            }
            SourceConfig::Prerecorded(rec) => {
                let filter = LowPassFilter::new(rec.sampling_rate, config.filter.cutoff)?;
                let samples = load_recording(&rec.input_file, rec.column, rec.delimiter)?;
                (
                    Input::Prerecorded {
                        samples,
                        pace: rec.pace,
                    },
                    filter,
                )
            }
        };
        info!(
            "Low-pass cutoff {:.2} Hz at fs={:.1} Hz",
            filter.cutoff(),
            filter.sample_rate()
        );

        Ok(Self {
            input,
            filter,
            mapping: config.mapping.clone(),
        })
    }

    /// Title for displays, e.g. "Live respiration -> MIDI notes"
    pub fn title(&self) -> String {
        let source = match self.input {
            Input::Live { .. } => "Live",
            Input::Prerecorded { .. } => "Prerecorded",
        };
        format!("{} respiration -> {}", source, self.mapping.label())
    }

    /// Sampling rate the filter was designed for
    pub fn sample_rate(&self) -> f64 {
        self.filter.sample_rate()
    }

    /// Run on a dedicated thread. See [`RunHandle`] for how it ends.
    pub fn spawn<S: MidiSink + Send + 'static>(
        self,
        sink: S,
        relay: RelaySender,
        token: &CancellationToken,
    ) -> Result<RunHandle> {
        let run_token = token.clone();
        let worker = thread::Builder::new()
            .name("exhale-pipeline".to_string())
            .spawn(move || self.run(sink, relay, &run_token))?;

        Ok(RunHandle {
            token: token.clone(),
            worker: Some(worker),
        })
    }

    /// Drive `sink` until the source ends or `token` is cancelled
    pub fn run<S: MidiSink>(
        self,
        sink: S,
        relay: RelaySender,
        token: &CancellationToken,
    ) -> Result<RunStats> {
        let mut pipeline = Pipeline::new(self.filter, self.mapping, sink, relay)?;

        let stats = match self.input {
            Input::Live {
                mut stream,
                options,
            } => pipeline.run_live(stream.as_mut(), &options, token)?,
            Input::Prerecorded { samples, pace } => {
                pipeline.run_prerecorded(&samples, pace, token)?
            }
        };

        info!(
            "Run finished: {} samples, {} display values dropped",
            stats.samples, stats.dropped
        );
        Ok(stats)
    }
}

/// A session running on its own thread.
///
/// Dropping the handle cancels the run and waits for the pipeline to release
/// its note, so an early return on the caller's side cannot leave one stuck.
pub struct RunHandle {
    token: CancellationToken,
    worker: Option<JoinHandle<Result<RunStats>>>,
}

impl RunHandle {
    /// True once the pipeline thread has returned
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |worker| worker.is_finished())
    }

    /// Wait for the run to end by itself or through the token
    pub fn join(mut self) -> Result<RunStats> {
        self.wait()
    }

    /// Cancel the run and wait for its cleanup
    pub fn stop(mut self) -> Result<RunStats> {
        self.token.cancel();
        self.wait()
    }

    fn wait(&mut self) -> Result<RunStats> {
        let worker = self
            .worker
            .take()
            .ok_or_else(|| Error::Worker("run already joined".to_string()))?;
        worker
            .join()
            .map_err(|_| Error::Worker("pipeline thread panicked".to_string()))?
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.token.cancel();
            if let Err(e) = self.wait() {
                warn!("run ended abnormally: {}", e);
            }
        }
    }
}
