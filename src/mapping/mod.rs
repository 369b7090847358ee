//! Mapping from filtered respiration amplitude to MIDI values
//!
//! A run picks one [`Mapping`] at startup: discrete notes or a continuous
//! controller.

mod amplitude;
mod range;

pub use amplitude::{to_controller_value, to_note};
pub use range::{calibrate, CalibrationRange, CalibrationStatus, WindowedCalibrator};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Highest valid note number, controller number, or 7-bit value
pub const MIDI_MAX: u8 = 127;

/// Highest valid MIDI channel (zero-based)
pub const CHANNEL_MAX: u8 = 15;

/// What each calibrated sample becomes on the MIDI port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mapping {
    /// One sounding note that follows the amplitude
    #[serde(rename = "note")]
    ToNote {
        #[serde(default = "default_note_low")]
        note_low: u8,
        #[serde(default = "default_note_high")]
        note_high: u8,
        #[serde(default = "default_velocity")]
        velocity: u8,
        #[serde(default)]
        channel: u8,
    },
    /// A controller value sent for every sample
    #[serde(rename = "controller")]
    ToController {
        #[serde(default = "default_cc")]
        cc: u8,
        #[serde(default)]
        channel: u8,
    },
}

fn default_note_low() -> u8 { 40 }
fn default_note_high() -> u8 { 80 }
fn default_velocity() -> u8 { 100 }
fn default_cc() -> u8 { 115 }

impl Default for Mapping {
    fn default() -> Self {
        Mapping::ToNote {
            note_low: default_note_low(),
            note_high: default_note_high(),
            velocity: default_velocity(),
            channel: 0,
        }
    }
}

impl Mapping {
    /// Check every value fits the MIDI protocol and the note range is ordered
    pub fn validate(&self) -> Result<()> {
        match *self {
            Mapping::ToNote {
                note_low,
                note_high,
                velocity,
                channel,
            } => {
                if note_high > MIDI_MAX {
                    return Err(Error::Configuration(format!(
                        "note_high must be at most {MIDI_MAX}, got {note_high}"
                    )));
                }
                if note_low >= note_high {
                    return Err(Error::Configuration(format!(
                        "note_low ({note_low}) must be below note_high ({note_high})"
                    )));
                }
                if velocity == 0 || velocity > MIDI_MAX {
                    return Err(Error::Configuration(format!(
                        "velocity must be between 1 and {MIDI_MAX}, got {velocity}"
                    )));
                }
                validate_channel(channel)
            }
            Mapping::ToController { cc, channel } => {
                if cc > MIDI_MAX {
                    return Err(Error::Configuration(format!(
                        "cc must be at most {MIDI_MAX}, got {cc}"
                    )));
                }
                validate_channel(channel)
            }
        }
    }

    /// Short label for operator-facing titles
    pub fn label(&self) -> &'static str {
        match self {
            Mapping::ToNote { .. } => "MIDI notes",
            Mapping::ToController { .. } => "MIDI CC",
        }
    }
}

fn validate_channel(channel: u8) -> Result<()> {
    if channel > CHANNEL_MAX {
        return Err(Error::Configuration(format!(
            "MIDI channel must be between 0 and {CHANNEL_MAX}, got {channel}"
        )));
    }
    Ok(())
}
