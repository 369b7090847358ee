//! Amplitude range calibration
//!
//! Live runs track a running min/max for a fixed wall-clock window and then
//! freeze it. Prerecorded runs take min/max over the whole filtered batch.

use std::time::Duration;

use log::info;

/// Observed amplitude bounds used to normalize the signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRange {
    pub min: f64,
    pub max: f64,
}

impl CalibrationRange {
    /// Range covering a single value
    pub fn new(value: f64) -> Self {
        Self { min: value, max: value }
    }

    /// Widen the range to include `value`
    pub fn include(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// True when the range cannot be used to normalize (`max <= min`)
    pub fn is_degenerate(&self) -> bool {
        !(self.max > self.min)
    }

    /// Position of `x` within the range, clamped to `[0, 1]`.
    ///
    /// Returns `None` for a degenerate range.
    pub fn fraction(&self, x: f64) -> Option<f64> {
        if self.is_degenerate() {
            return None;
        }
        let frac = (x - self.min) / (self.max - self.min);
        if frac.is_nan() {
            return Some(0.0);
        }
        Some(frac.clamp(0.0, 1.0))
    }
}

/// Result of feeding one value to a [`WindowedCalibrator`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationStatus {
    Calibrating,
    Complete(CalibrationRange),
}

/// Running min/max over a fixed wall-clock window (live mode)
#[derive(Debug, Clone)]
pub struct WindowedCalibrator {
    window: Duration,
    range: Option<CalibrationRange>,
    complete: bool,
}

impl WindowedCalibrator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            range: None,
            complete: false,
        }
    }

    /// Calibration window length
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Frozen range, once the window has elapsed
    pub fn range(&self) -> Option<CalibrationRange> {
        if self.complete {
            self.range
        } else {
            None
        }
    }

    /// Feed one filtered value observed `elapsed` after calibration began.
    ///
    /// The value that closes the window is still folded into the range.
    /// After completion the range never changes and further values are
    /// ignored.
    pub fn observe(&mut self, value: f64, elapsed: Duration) -> CalibrationStatus {
        if self.complete {
            if let Some(range) = self.range {
                return CalibrationStatus::Complete(range);
            }
        }

        let range = match self.range.as_mut() {
            Some(range) => {
                range.include(value);
                *range
            }
            None => {
                info!(
                    "PLEASE WAIT: Calibrating amplitude range of RESP signal ({:.0}s)...",
                    self.window.as_secs_f64()
                );
                let range = CalibrationRange::new(value);
                self.range = Some(range);
                range
            }
        };

        if elapsed >= self.window {
            self.complete = true;
            info!(
                "Calibration complete: amp_min={:.3}, amp_max={:.3}",
                range.min, range.max
            );
            return CalibrationStatus::Complete(range);
        }

        CalibrationStatus::Calibrating
    }
}

/// Min/max over a whole filtered batch (prerecorded mode).
///
/// Returns `None` for an empty batch.
pub fn calibrate(samples: &[f64]) -> Option<CalibrationRange> {
    let (&first, rest) = samples.split_first()?;
    let mut range = CalibrationRange::new(first);
    for &value in rest {
        range.include(value);
    }
    Some(range)
}
