//! Amplitude to MIDI value mapping
//!
//! Both functions normalize against a calibrated range and fall back to the
//! bottom of their output range when the range is degenerate.

use super::CalibrationRange;

/// Map a filtered amplitude to a note number in `[note_low, note_high]`.
///
/// Rounds to the nearest note, halves rounding up. Callers validate that
/// both bounds are valid note numbers.
pub fn to_note(x: f64, range: &CalibrationRange, note_low: u8, note_high: u8) -> u8 {
    match range.fraction(x) {
        Some(frac) => {
            let span = f64::from(note_high) - f64::from(note_low);
            (f64::from(note_low) + frac * span).round() as u8
        }
        None => note_low,
    }
}

/// Map a filtered amplitude to a 7-bit controller value
pub fn to_controller_value(x: f64, range: &CalibrationRange) -> u8 {
    match range.fraction(x) {
        Some(frac) => (frac * 127.0).round() as u8,
        None => 0,
    }
}
