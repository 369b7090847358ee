//! Single-voice note tracking
//!
//! Keeps at most one note sounding and only emits when the mapped note
//! changes. Shutdown must run on every exit path so nothing is left hanging.

use super::midi::MidiSink;
use crate::error::Result;

/// Current voice state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteState {
    Silent,
    Sounding(u8),
}

/// Note on/off state machine for one MIDI channel
#[derive(Debug, Clone)]
pub struct NoteTracker {
    channel: u8,
    velocity: u8,
    state: NoteState,
}

impl NoteTracker {
    pub fn new(channel: u8, velocity: u8) -> Self {
        Self {
            channel,
            velocity,
            state: NoteState::Silent,
        }
    }

    pub fn state(&self) -> NoteState {
        self.state
    }

    /// Move to `note`, turning the previous note off before the new one on.
    ///
    /// A repeat of the sounding note emits nothing.
    pub fn update<S: MidiSink + ?Sized>(&mut self, note: u8, sink: &mut S) -> Result<()> {
        match self.state {
            NoteState::Sounding(current) if current == note => return Ok(()),
            NoteState::Sounding(current) => {
                // Still sounding until the note-off is actually delivered
                sink.note_off(self.channel, current)?;
                self.state = NoteState::Silent;
            }
            NoteState::Silent => {}
        }

        // A note that never started is never recorded
        sink.note_on(self.channel, note, self.velocity)?;
        self.state = NoteState::Sounding(note);
        Ok(())
    }

    /// Release the sounding note, if any. Safe to call repeatedly.
    pub fn shutdown<S: MidiSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        if let NoteState::Sounding(current) = self.state {
            sink.note_off(self.channel, current)?;
            self.state = NoteState::Silent;
        }
        Ok(())
    }
}
