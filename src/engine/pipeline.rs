//! Per-sample pipeline: filter, calibrate or map, emit, publish
//!
//! A [`Pipeline`] owns every piece of mutable signal state. It runs on one
//! thread; the only thing it shares is the producer half of the relay.

use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use super::cancel::CancellationToken;
use super::midi::MidiSink;
use super::notes::NoteTracker;
use super::relay::RelaySender;
use crate::dsp::LowPassFilter;
use crate::error::{Error, Result};
use crate::mapping::{
    calibrate, to_controller_value, to_note, CalibrationRange, CalibrationStatus, Mapping,
    WindowedCalibrator,
};
use crate::sources::SensorStream;

/// Live protocol parameters
#[derive(Debug, Clone)]
pub struct LiveOptions {
    /// Sensor channel to read
    pub channel: usize,

    /// Calibration window, measured from the start of the sample loop
    pub calibration: Duration,

    /// Wait after an empty poll
    pub idle: Duration,
}

/// What a finished run did
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    /// Samples that went through the filter
    pub samples: u64,

    /// Range used for mapping, if calibration finished
    pub range: Option<CalibrationRange>,

    /// Values the display missed because the relay was full
    pub dropped: u64,

    /// True when the run ended on the cancellation token
    pub cancelled: bool,
}

/// Signal path from raw amplitude to MIDI
pub struct Pipeline<S: MidiSink> {
    filter: LowPassFilter,
    mapping: Mapping,
    notes: Option<NoteTracker>,
    sink: S,
    relay: RelaySender,
}

impl<S: MidiSink> Pipeline<S> {
    pub fn new(filter: LowPassFilter, mapping: Mapping, sink: S, relay: RelaySender) -> Result<Self> {
        mapping.validate()?;
        let notes = match mapping {
            Mapping::ToNote {
                velocity, channel, ..
            } => Some(NoteTracker::new(channel, velocity)),
            Mapping::ToController { .. } => None,
        };

        Ok(Self {
            filter,
            mapping,
            notes,
            sink,
            relay,
        })
    }

    /// Map one filtered value against `range` and send it
    pub fn emit(&mut self, value: f64, range: &CalibrationRange) -> Result<()> {
        match self.mapping {
            Mapping::ToNote {
                note_low, note_high, ..
            } => {
                let note = to_note(value, range, note_low, note_high);
                if let Some(notes) = self.notes.as_mut() {
                    notes.update(note, &mut self.sink)?;
                }
            }
            Mapping::ToController { cc, channel } => {
                let value = to_controller_value(value, range);
                self.sink.control_change(channel, cc, value)?;
            }
        }
        Ok(())
    }

    /// Process one live sample observed `elapsed` into the run.
    ///
    /// Nothing reaches the MIDI sink until the calibrator completes.
    /// Returns the filtered value.
    pub fn live_step(
        &mut self,
        calibrator: &mut WindowedCalibrator,
        raw: f64,
        elapsed: Duration,
    ) -> Result<f64> {
        let filtered = self.filter.apply(raw);
        self.relay.publish(filtered);

        if let CalibrationStatus::Complete(range) = calibrator.observe(filtered, elapsed) {
            self.emit(filtered, &range)?;
        }
        Ok(filtered)
    }

    /// Run the live protocol until cancelled or the stream fails.
    ///
    /// The note is always released before returning.
    pub fn run_live(
        &mut self,
        stream: &mut dyn SensorStream,
        options: &LiveOptions,
        token: &CancellationToken,
    ) -> Result<RunStats> {
        let mut calibrator = WindowedCalibrator::new(options.calibration);
        info!(
            "Reading '{}' channel {}, calibrating for {:.1}s",
            stream.info().name,
            options.channel,
            calibrator.window().as_secs_f64()
        );
        let result = self.live_loop(stream, options, &mut calibrator, token);
        let cleanup = self.shutdown();
        let (samples, cancelled) = result?;
        cleanup?;

        Ok(RunStats {
            samples,
            range: calibrator.range(),
            dropped: self.relay.dropped(),
            cancelled,
        })
    }

    fn live_loop(
        &mut self,
        stream: &mut dyn SensorStream,
        options: &LiveOptions,
        calibrator: &mut WindowedCalibrator,
        token: &CancellationToken,
    ) -> Result<(u64, bool)> {
        let start = Instant::now();
        let mut samples = 0u64;

        loop {
            if token.is_cancelled() {
                info!("Stopping respiration bridge...");
                return Ok((samples, true));
            }

            match stream.pull()? {
                Some(frame) => {
                    let raw = frame.channel(options.channel)?;
                    let elapsed = frame.timestamp.saturating_duration_since(start);
                    self.live_step(calibrator, raw, elapsed)?;
                    samples += 1;
                }
                None => thread::sleep(options.idle),
            }
        }
    }

    /// Run the prerecorded protocol over a whole recording.
    ///
    /// The entire filtered sequence defines the range, then each value is
    /// replayed. With `pace` set, emission follows the sample interval of the
    /// filter's sampling rate so playback lasts as long as the recording.
    pub fn run_prerecorded(
        &mut self,
        raw: &[f64],
        pace: bool,
        token: &CancellationToken,
    ) -> Result<RunStats> {
        info!("PLEASE WAIT: Calibrating amplitude range of RESP signal...");
        let filtered = self.filter.apply_all(raw);
        let range = calibrate(&filtered).ok_or_else(|| {
            Error::Configuration("recording contains no samples".to_string())
        })?;
        info!(
            "Calibration complete: amp_min={:.3}, amp_max={:.3}",
            range.min, range.max
        );

        let interval = if pace {
            Some(self.filter.sample_interval()?)
        } else {
            None
        };
        let result = self.playback(&filtered, &range, interval, token);
        let cleanup = self.shutdown();
        let (samples, cancelled) = result?;
        cleanup?;

        Ok(RunStats {
            samples,
            range: Some(range),
            dropped: self.relay.dropped(),
            cancelled,
        })
    }

    fn playback(
        &mut self,
        filtered: &[f64],
        range: &CalibrationRange,
        interval: Option<Duration>,
        token: &CancellationToken,
    ) -> Result<(u64, bool)> {
        let start = Instant::now();
        let mut samples = 0u64;

        for &value in filtered {
            if token.is_cancelled() {
                info!("Stopping MIDI playback...");
                return Ok((samples, true));
            }

            self.relay.publish(value);
            self.emit(value, range)?;
            samples += 1;

            if let Some(interval) = interval {
                // Sleep against a fixed schedule so overshoot does not accumulate
                let due = start + interval.mul_f64(samples as f64);
                let now = Instant::now();
                if due > now {
                    thread::sleep(due - now);
                }
            }
        }

        Ok((samples, false))
    }

    /// Release any sounding note. Safe to call more than once.
    pub fn shutdown(&mut self) -> Result<()> {
        match self.notes.as_mut() {
            Some(notes) => notes.shutdown(&mut self.sink),
            None => Ok(()),
        }
    }
}

impl<S: MidiSink> Drop for Pipeline<S> {
    fn drop(&mut self) {
        // Covers panics and early returns that skipped the normal shutdown
        if let Err(e) = self.shutdown() {
            warn!("failed to release sounding note: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::midi::{MidiMessage, NOTE_OFF_VELOCITY};
    use crate::engine::relay;
    use crate::sources::{Frame, StreamInfo};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<MidiMessage>>>);

    impl SharedSink {
        fn messages(&self) -> Vec<MidiMessage> {
            self.0.lock().unwrap().clone()
        }
    }

    impl MidiSink for SharedSink {
        fn send(&mut self, msg: MidiMessage) -> Result<()> {
            self.0.lock().unwrap().push(msg);
            Ok(())
        }
    }

    fn note_mapping() -> Mapping {
        Mapping::ToNote {
            note_low: 40,
            note_high: 80,
            velocity: 100,
            channel: 0,
        }
    }

    fn filter() -> LowPassFilter {
        LowPassFilter::new(1000.0, 1.0).unwrap()
    }

    /// Stream that yields a fixed list of frames, then cancels the run
    struct ScriptedStream {
        info: StreamInfo,
        frames: Vec<Option<Vec<f64>>>,
        token: CancellationToken,
    }

    impl SensorStream for ScriptedStream {
        fn info(&self) -> &StreamInfo {
            &self.info
        }

        fn pull(&mut self) -> Result<Option<Frame>> {
            if self.frames.is_empty() {
                self.token.cancel();
                return Ok(None);
            }
            Ok(self.frames.remove(0).map(Frame::new))
        }
    }

    /// Stream that replays pre-stamped frames, then cancels the run
    struct TimedStream {
        info: StreamInfo,
        frames: Vec<Frame>,
        token: CancellationToken,
    }

    impl SensorStream for TimedStream {
        fn info(&self) -> &StreamInfo {
            &self.info
        }

        fn pull(&mut self) -> Result<Option<Frame>> {
            if self.frames.is_empty() {
                self.token.cancel();
                return Ok(None);
            }
            Ok(Some(self.frames.remove(0)))
        }
    }

    fn scripted(frames: Vec<Option<Vec<f64>>>, token: &CancellationToken) -> ScriptedStream {
        ScriptedStream {
            info: StreamInfo {
                name: "OpenSignals test".to_string(),
                nominal_rate: 1000.0,
                locator: String::new(),
            },
            frames,
            token: token.clone(),
        }
    }

    #[test]
    fn test_calibration_clock_follows_frame_timestamps() {
        let token = CancellationToken::new();
        let now = Instant::now();
        let late = |values: Vec<f64>, after: u64| Frame {
            timestamp: now + Duration::from_secs(after),
            values,
        };
        let mut stream = TimedStream {
            info: scripted(vec![], &token).info,
            frames: vec![late(vec![0.0, 0.2], 0), late(vec![0.0, 0.9], 5)],
            token: token.clone(),
        };

        let (tx, _rx) = relay::bounded(10);
        let sink = SharedSink::default();
        let mut pipeline = Pipeline::new(filter(), note_mapping(), sink.clone(), tx).unwrap();
        let options = LiveOptions {
            channel: 1,
            calibration: Duration::from_secs(2),
            idle: Duration::ZERO,
        };

        // Pulled immediately, but stamped 5 s in: the window is over
        let stats = pipeline.run_live(&mut stream, &options, &token).unwrap();
        assert_eq!(stats.samples, 2);
        assert!(stats.range.is_some());
        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], MidiMessage::NoteOn(0, _, 100)));
        assert!(matches!(messages[1], MidiMessage::NoteOff(0, _, _)));
    }

    #[test]
    fn test_rejects_invalid_mapping() {
        let (tx, _rx) = relay::bounded(4);
        let mapping = Mapping::ToNote {
            note_low: 60,
            note_high: 50,
            velocity: 100,
            channel: 0,
        };
        assert!(Pipeline::new(filter(), mapping, SharedSink::default(), tx).is_err());
    }

    #[test]
    fn test_silent_while_calibrating() {
        let (tx, rx) = relay::bounded(100);
        let sink = SharedSink::default();
        let mut pipeline = Pipeline::new(filter(), note_mapping(), sink.clone(), tx).unwrap();
        let mut calibrator = WindowedCalibrator::new(Duration::from_secs(30));

        for i in 0..50 {
            pipeline
                .live_step(&mut calibrator, 0.5, Duration::from_millis(i * 100))
                .unwrap();
        }

        assert!(sink.messages().is_empty());
        assert_eq!(rx.len(), 50);
    }

    #[test]
    fn test_emits_after_calibration() {
        let (tx, _rx) = relay::bounded(100);
        let sink = SharedSink::default();
        let mut pipeline = Pipeline::new(filter(), note_mapping(), sink.clone(), tx).unwrap();
        let mut calibrator = WindowedCalibrator::new(Duration::from_secs(1));

        pipeline.live_step(&mut calibrator, 1.0, Duration::ZERO).unwrap();
        assert!(sink.messages().is_empty());
        pipeline
            .live_step(&mut calibrator, 1.0, Duration::from_secs(1))
            .unwrap();
        assert_eq!(sink.messages().len(), 1);
        assert!(matches!(sink.messages()[0], MidiMessage::NoteOn(0, _, 100)));
    }

    #[test]
    fn test_controller_mode_sends_every_sample() {
        let (tx, _rx) = relay::bounded(100);
        let sink = SharedSink::default();
        let mapping = Mapping::ToController { cc: 115, channel: 2 };
        let mut pipeline = Pipeline::new(filter(), mapping, sink.clone(), tx).unwrap();
        let range = CalibrationRange { min: 0.0, max: 1.0 };

        for value in [0.0, 0.0, 0.5, 1.0] {
            pipeline.emit(value, &range).unwrap();
        }

        assert_eq!(
            sink.messages(),
            vec![
                MidiMessage::ControlChange(2, 115, 0),
                MidiMessage::ControlChange(2, 115, 0),
                MidiMessage::ControlChange(2, 115, 64),
                MidiMessage::ControlChange(2, 115, 127),
            ]
        );
    }

    #[test]
    fn test_live_run_releases_note_on_cancel() {
        let token = CancellationToken::new();
        let mut frames: Vec<Option<Vec<f64>>> = Vec::new();
        for i in 0..200 {
            frames.push(Some(vec![0.0, (i as f64 * 0.05).sin()]));
            if i % 10 == 0 {
                frames.push(None);
            }
        }
        let mut stream = scripted(frames, &token);

        let (tx, _rx) = relay::bounded(1000);
        let sink = SharedSink::default();
        let mut pipeline = Pipeline::new(filter(), note_mapping(), sink.clone(), tx).unwrap();
        let options = LiveOptions {
            channel: 1,
            calibration: Duration::ZERO,
            idle: Duration::from_micros(100),
        };

        let stats = pipeline.run_live(&mut stream, &options, &token).unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.samples, 200);
        assert!(stats.range.is_some());

        let messages = sink.messages();
        assert!(matches!(messages.first(), Some(MidiMessage::NoteOn(..))));
        assert!(matches!(
            messages.last(),
            Some(MidiMessage::NoteOff(0, _, NOTE_OFF_VELOCITY))
        ));
    }

    #[test]
    fn test_live_run_releases_note_on_error() {
        let token = CancellationToken::new();
        // Second frame lacks the requested channel
        let mut stream = scripted(vec![Some(vec![0.0, 0.3]), Some(vec![0.0])], &token);

        let (tx, _rx) = relay::bounded(10);
        let sink = SharedSink::default();
        let mut pipeline = Pipeline::new(filter(), note_mapping(), sink.clone(), tx).unwrap();
        let options = LiveOptions {
            channel: 1,
            calibration: Duration::ZERO,
            idle: Duration::ZERO,
        };

        assert!(pipeline.run_live(&mut stream, &options, &token).is_err());
        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], MidiMessage::NoteOn(0, 40, 100)));
        assert!(matches!(messages[1], MidiMessage::NoteOff(0, 40, _)));
    }

    #[test]
    fn test_prerecorded_cancel_before_start() {
        let token = CancellationToken::new();
        token.cancel();

        let (tx, rx) = relay::bounded(10);
        let sink = SharedSink::default();
        let mut pipeline = Pipeline::new(filter(), note_mapping(), sink.clone(), tx).unwrap();

        let stats = pipeline.run_prerecorded(&[0.1, 0.2, 0.3], false, &token).unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.samples, 0);
        assert!(sink.messages().is_empty());
        assert!(rx.is_empty());
    }

    #[test]
    fn test_prerecorded_pacing_matches_duration() {
        let token = CancellationToken::new();
        let (tx, _rx) = relay::bounded(1000);
        let sink = SharedSink::default();
        let pace_filter = LowPassFilter::new(200.0, 1.0).unwrap();
        let mapping = Mapping::ToController { cc: 115, channel: 0 };
        let mut pipeline = Pipeline::new(pace_filter, mapping, sink.clone(), tx).unwrap();

        // 40 samples at 200 Hz = 200 ms
        let raw: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let started = Instant::now();
        let stats = pipeline.run_prerecorded(&raw, true, &token).unwrap();
        let elapsed = started.elapsed();

        assert_eq!(stats.samples, 40);
        assert_eq!(sink.messages().len(), 40);
        assert!(elapsed >= Duration::from_millis(195), "too fast: {:?}", elapsed);
    }

    #[test]
    fn test_unpaceable_rate_fails_before_output() {
        let token = CancellationToken::new();
        let (tx, rx) = relay::bounded(10);
        let sink = SharedSink::default();
        let glacial = LowPassFilter::new(1e-25, 1e-26).unwrap();
        let mut pipeline = Pipeline::new(glacial, note_mapping(), sink.clone(), tx).unwrap();

        let result = pipeline.run_prerecorded(&[0.1, 0.2, 0.3], true, &token);
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert!(sink.messages().is_empty());
        assert!(rx.is_empty());

        // Unpaced replay never needs the interval
        let stats = pipeline.run_prerecorded(&[0.1, 0.2, 0.3], false, &token).unwrap();
        assert_eq!(stats.samples, 3);
    }

    #[test]
    fn test_drop_releases_note() {
        let (tx, _rx) = relay::bounded(10);
        let sink = SharedSink::default();
        {
            let mut pipeline = Pipeline::new(filter(), note_mapping(), sink.clone(), tx).unwrap();
            let range = CalibrationRange { min: 0.0, max: 1.0 };
            pipeline.emit(0.5, &range).unwrap();
        }
        assert_eq!(
            sink.messages(),
            vec![
                MidiMessage::NoteOn(0, 60, 100),
                MidiMessage::NoteOff(0, 60, NOTE_OFF_VELOCITY)
            ]
        );
    }
}
