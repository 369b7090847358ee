//! Pipeline engine for exhale
//!
//! Drives respiration samples through filtering, calibration and mapping to
//! a MIDI sink, publishing filtered values for display on the side.

mod cancel;
pub mod midi;
mod notes;
mod pipeline;
pub mod relay;
mod session;

pub use cancel::CancellationToken;
pub use midi::{list_midi_ports, MidiMessage, MidiPlayer, MidiSink};
pub use notes::{NoteState, NoteTracker};
pub use pipeline::{LiveOptions, Pipeline, RunStats};
pub use relay::{RelayReceiver, RelaySender};
pub use session::{RunHandle, Session};
