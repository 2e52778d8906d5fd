//! Output side of the note transport.
//!
//! A `NoteSink` is the narrow capability the emitter needs from a device:
//! send note-on, note-off and a channel-wide silence.

use midir::MidiOutputConnection;

use crate::midi;

/// Port name meaning "no device": route through the simulated transport.
pub const NO_DEVICE: &str = "no-midi";

/// Legacy label shown when no ports exist; treated the same as `NO_DEVICE`.
const NO_PORTS_LABEL: &str = "No MIDI ports";

/// Channel all notes are sent on.
pub const OUTPUT_CHANNEL: u8 = 0;

pub fn is_no_device(port_name: &str) -> bool {
    let name = port_name.trim();
    name.is_empty() || name == NO_DEVICE || name == NO_PORTS_LABEL
}

pub trait NoteSink: Send {
    fn note_on(&mut self, note: u8, velocity: u8) -> Result<(), String>;
    fn note_off(&mut self, note: u8) -> Result<(), String>;
    fn all_sound_off(&mut self) -> Result<(), String>;

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}

/// A connected hardware or virtual MIDI output port.
pub struct MidiOutputSink {
    port_name: String,
    connection: MidiOutputConnection,
}

impl MidiOutputSink {
    pub fn open(port_name: &str) -> Result<Self, String> {
        if is_no_device(port_name) {
            return Err("No output device selected".to_string());
        }
        let connection = midi::connect_output(port_name)?;
        log::info!(target: "transport", "opened MIDI output {}", port_name);
        Ok(Self {
            port_name: port_name.to_string(),
            connection,
        })
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), String> {
        self.connection
            .send(bytes)
            .map_err(|e| format!("{}: {}", self.port_name, e))
    }
}

impl NoteSink for MidiOutputSink {
    fn note_on(&mut self, note: u8, velocity: u8) -> Result<(), String> {
        self.send(&midi::note_on_bytes(OUTPUT_CHANNEL, note, velocity))
    }

    fn note_off(&mut self, note: u8) -> Result<(), String> {
        self.send(&midi::note_off_bytes(OUTPUT_CHANNEL, note))
    }

    fn all_sound_off(&mut self) -> Result<(), String> {
        for message in midi::silence_bytes(OUTPUT_CHANNEL) {
            self.send(&message)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.port_name
    }
}

impl Drop for MidiOutputSink {
    fn drop(&mut self) {
        log::info!(target: "transport", "closing MIDI output {}", self.port_name);
    }
}
