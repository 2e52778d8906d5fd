//! MIDI wire format and midir port handling.

use std::time::Instant;

use crossbeam_channel::Sender;
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tonnetz_types::{NoteEvent, PitchClass};

const CLIENT_NAME: &str = "tonnetz";

/// Controller numbers for channel-mode messages.
const CC_ALL_SOUND_OFF: u8 = 120;
const CC_ALL_NOTES_OFF: u8 = 123;

/// Note messages understood by the engine. Everything else is dropped at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
}

impl NoteMessage {
    /// Reduce to a pitch-class event stamped with `timestamp`.
    pub fn to_event(self, timestamp: Instant) -> NoteEvent {
        match self {
            NoteMessage::NoteOn { note, velocity, .. } => {
                NoteEvent::on(PitchClass::from_midi(note as i32), velocity, timestamp)
            }
            NoteMessage::NoteOff { note, .. } => {
                NoteEvent::off(PitchClass::from_midi(note as i32), timestamp)
            }
        }
    }
}

/// Parse a raw MIDI message, keeping only note-on and note-off.
pub fn parse_note_message(data: &[u8]) -> Option<NoteMessage> {
    if data.len() < 3 {
        return None;
    }

    let status = data[0];
    let channel = status & 0x0F;

    match status & 0xF0 {
        0x80 => Some(NoteMessage::NoteOff {
            channel,
            note: data[1] & 0x7F,
        }),
        0x90 => {
            // Note On with velocity 0 is a Note Off
            let velocity = data[2] & 0x7F;
            if velocity == 0 {
                Some(NoteMessage::NoteOff {
                    channel,
                    note: data[1] & 0x7F,
                })
            } else {
                Some(NoteMessage::NoteOn {
                    channel,
                    note: data[1] & 0x7F,
                    velocity,
                })
            }
        }
        _ => None,
    }
}

pub fn note_on_bytes(channel: u8, note: u8, velocity: u8) -> [u8; 3] {
    [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
}

pub fn note_off_bytes(channel: u8, note: u8) -> [u8; 3] {
    [0x80 | (channel & 0x0F), note & 0x7F, 0]
}

/// "All sound off" followed by "all notes off" for one channel.
pub fn silence_bytes(channel: u8) -> [[u8; 3]; 2] {
    let status = 0xB0 | (channel & 0x0F);
    [[status, CC_ALL_SOUND_OFF, 0], [status, CC_ALL_NOTES_OFF, 0]]
}

/// Information about an available MIDI port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiPortInfo {
    pub index: usize,
    pub name: String,
}

pub fn list_input_ports() -> Result<Vec<MidiPortInfo>, String> {
    let mut midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| e.to_string())?;
    midi_in.ignore(Ignore::All);
    let ports = midi_in
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_in
                .port_name(port)
                .ok()
                .map(|name| MidiPortInfo { index, name })
        })
        .collect();
    Ok(ports)
}

pub fn list_output_ports() -> Result<Vec<MidiPortInfo>, String> {
    let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| e.to_string())?;
    let ports = midi_out
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_out
                .port_name(port)
                .ok()
                .map(|name| MidiPortInfo { index, name })
        })
        .collect();
    Ok(ports)
}

/// Open an output port by exact name.
pub fn connect_output(port_name: &str) -> Result<MidiOutputConnection, String> {
    let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| e.to_string())?;
    let ports = midi_out.ports();
    let port = ports
        .iter()
        .find(|p| midi_out.port_name(p).unwrap_or_default() == port_name)
        .ok_or_else(|| format!("Unable to find output port: {}", port_name))?;
    midi_out
        .connect(port, "tonnetz-output")
        .map_err(|e| e.to_string())
}

/// Open an input port by exact name, forwarding note events into `tx`.
///
/// The connection stays open until the returned handle is dropped.
pub fn connect_input(
    port_name: &str,
    tx: Sender<NoteEvent>,
) -> Result<MidiInputConnection<()>, String> {
    let mut midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| e.to_string())?;
    midi_in.ignore(Ignore::All);
    let ports = midi_in.ports();
    let port = ports
        .iter()
        .find(|p| midi_in.port_name(p).unwrap_or_default() == port_name)
        .ok_or_else(|| format!("Unable to find input port: {}", port_name))?
        .clone();

    midi_in
        .connect(
            &port,
            "tonnetz-input",
            move |_stamp, message, _| {
                if let Some(msg) = parse_note_message(message) {
                    log::trace!(target: "transport", "midi in {:?}", msg);
                    let _ = tx.send(msg.to_event(Instant::now()));
                }
            },
            (),
        )
        .map_err(|e| e.to_string())
}
