//! MIDI output for exhale.
//!
//! The pipeline talks to a [`MidiSink`]; [`MidiPlayer`] is the midir-backed
//! implementation that writes to a named output port.

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use log::{info, warn};
use midir::MidiOutput;

use crate::error::{Error, Result};

/// Velocity carried by note-off messages
pub const NOTE_OFF_VELOCITY: u8 = 64;

/// MIDI message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note on: channel (0-15), note (0-127), velocity (0-127)
    NoteOn(u8, u8, u8),
    /// Note off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff(u8, u8, u8),
    /// Control change: channel (0-15), controller (0-127), value (0-127)
    ControlChange(u8, u8, u8),
}

impl MidiMessage {
    /// Convert to raw MIDI bytes.
    pub fn to_bytes(&self) -> [u8; 3] {
        match *self {
            MidiMessage::NoteOn(ch, note, vel) => [0x90 | (ch & 0x0F), note & 0x7F, vel & 0x7F],
            MidiMessage::NoteOff(ch, note, vel) => [0x80 | (ch & 0x0F), note & 0x7F, vel & 0x7F],
            MidiMessage::ControlChange(ch, ctrl, val) => {
                [0xB0 | (ch & 0x0F), ctrl & 0x7F, val & 0x7F]
            }
        }
    }
}

/// Destination for MIDI messages produced by the pipeline
pub trait MidiSink {
    fn send(&mut self, msg: MidiMessage) -> Result<()>;

    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<()> {
        self.send(MidiMessage::NoteOn(channel, note, velocity))
    }

    fn note_off(&mut self, channel: u8, note: u8) -> Result<()> {
        self.send(MidiMessage::NoteOff(channel, note, NOTE_OFF_VELOCITY))
    }

    fn control_change(&mut self, channel: u8, controller: u8, value: u8) -> Result<()> {
        self.send(MidiMessage::ControlChange(channel, controller, value))
    }
}

/// MIDI output player.
///
/// Messages are written from a background thread so the signal path never
/// waits on the MIDI driver. Dropping the player flushes everything queued.
pub struct MidiPlayer {
    sender: Sender<MidiPlayerCommand>,
    worker: Option<JoinHandle<()>>,
    port_name: String,
}

enum MidiPlayerCommand {
    Send(MidiMessage),
    Stop,
}

impl MidiPlayer {
    /// Connect to the output port named `port_name`.
    ///
    /// An exact name match wins; otherwise the first port whose name
    /// contains `port_name` is used.
    pub fn new(port_name: &str) -> Result<Self> {
        let midi_out = MidiOutput::new("exhale MIDI Output").map_err(|e| Error::Midi(e.to_string()))?;
        let ports = midi_out.ports();

        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_out.port_name(p).unwrap_or_default())
            .collect();

        let index = names
            .iter()
            .position(|n| n == port_name)
            .or_else(|| names.iter().position(|n| n.contains(port_name)))
            .ok_or_else(|| Error::DeviceUnavailable {
                requested: port_name.to_string(),
                available: names.clone(),
            })?;

        let port_name_actual = names[index].clone();
        let conn = midi_out
            .connect(&ports[index], "exhale-output")
            .map_err(|e| Error::Midi(e.to_string()))?;

        let (sender, receiver) = mpsc::channel::<MidiPlayerCommand>();

        let worker = thread::spawn(move || {
            let mut conn = conn;
            while let Ok(cmd) = receiver.recv() {
                match cmd {
                    MidiPlayerCommand::Send(msg) => {
                        if let Err(e) = conn.send(&msg.to_bytes()) {
                            warn!("MIDI send failed: {}", e);
                        }
                    }
                    MidiPlayerCommand::Stop => break,
                }
            }
            conn.close();
        });

        info!("MIDI output connected to: {}", port_name_actual);

        Ok(Self {
            sender,
            worker: Some(worker),
            port_name: port_name_actual,
        })
    }

    /// Name of the connected port
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl MidiSink for MidiPlayer {
    fn send(&mut self, msg: MidiMessage) -> Result<()> {
        self.sender
            .send(MidiPlayerCommand::Send(msg))
            .map_err(|_| Error::Midi("MIDI output thread has stopped".to_string()))
    }
}

impl Drop for MidiPlayer {
    fn drop(&mut self) {
        let _ = self.sender.send(MidiPlayerCommand::Stop);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// List available MIDI output ports.
pub fn list_midi_ports() -> Result<Vec<String>> {
    let midi_out = MidiOutput::new("exhale MIDI List").map_err(|e| Error::Midi(e.to_string()))?;
    let ports = midi_out.ports();

    let names: Vec<String> = ports
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok())
        .collect();

    Ok(names)
}
