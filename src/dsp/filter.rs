//! Streaming low-pass filter
//!
//! Second-order Butterworth low-pass as a biquad, evaluated one sample at a
//! time so the live and prerecorded paths share identical state handling.

use std::f64::consts::{FRAC_1_SQRT_2, PI};
use std::time::Duration;

use crate::error::{Error, Result};

/// Biquad filter coefficients, normalized by a0
#[derive(Debug, Clone, Copy)]
struct Coefficients {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Coefficients {
    /// Butterworth low-pass via the bilinear transform with prewarping.
    fn butterworth_lowpass(sample_rate: f64, cutoff: f64) -> Self {
        let omega = 2.0 * PI * cutoff / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * FRAC_1_SQRT_2);

        let b0 = (1.0 - cos_omega) / 2.0;
        let b1 = 1.0 - cos_omega;
        let b2 = (1.0 - cos_omega) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Causal 2nd-order low-pass filter with persistent state
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    sample_rate: f64,
    cutoff: f64,
    coeffs: Coefficients,

    // Filter state (Direct Form II transposed), zero history at start
    z1: f64,
    z2: f64,
}

impl LowPassFilter {
    /// Design a filter for the given sampling rate and cutoff, both in Hz.
    ///
    /// Fails when the normalized cutoff `cutoff / (0.5 * sample_rate)` falls
    /// outside `(0, 1)`.
    pub fn new(sample_rate: f64, cutoff: f64) -> Result<Self> {
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return Err(Error::Configuration(format!(
                "sampling rate must be positive, got {sample_rate} Hz"
            )));
        }
        let nyquist = 0.5 * sample_rate;
        if !(cutoff > 0.0) || cutoff >= nyquist {
            return Err(Error::Configuration(format!(
                "cutoff must be between 0 and {nyquist} Hz (half the sampling rate), got {cutoff} Hz"
            )));
        }

        Ok(Self {
            sample_rate,
            cutoff,
            coeffs: Coefficients::butterworth_lowpass(sample_rate, cutoff),
            z1: 0.0,
            z2: 0.0,
        })
    }

    /// Sampling rate in Hz
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Time between samples at the design rate
    pub fn sample_interval(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.sample_rate.recip()).map_err(|_| {
            Error::Configuration(format!(
                "sampling rate {} Hz is too low to pace playback",
                self.sample_rate
            ))
        })
    }

    /// Cutoff frequency in Hz
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Filter one sample
    pub fn apply(&mut self, input: f64) -> f64 {
        let output = self.coeffs.b0 * input + self.z1;

        self.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.z2;
        self.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;

        output
    }

    /// Filter a whole sequence, continuing from the current state
    pub fn apply_all(&mut self, samples: &[f64]) -> Vec<f64> {
        samples.iter().map(|&x| self.apply(x)).collect()
    }
}
