//! exhale - Respiration-driven MIDI
//!
//! Turns a breathing amplitude signal into MIDI notes or controller values,
//! from a live biosensor stream or a prerecorded file.

pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod sources;
pub mod viz;

pub use config::ExhaleConfig;
pub use engine::{Pipeline, Session};
pub use error::{Error, Result};
