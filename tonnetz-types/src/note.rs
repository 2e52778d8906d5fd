use std::time::Instant;

use crate::pitch::PitchClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    On,
    Off,
}

/// A note-on or note-off reduced to its pitch class.
///
/// Produced by the input side (device, virtual keyboard or pointer) and
/// consumed immediately; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub pitch: PitchClass,
    pub velocity: u8,
    pub kind: NoteKind,
    pub timestamp: Instant,
}

impl NoteEvent {
    pub fn on(pitch: PitchClass, velocity: u8, timestamp: Instant) -> Self {
        Self {
            pitch,
            velocity: velocity.min(127),
            kind: NoteKind::On,
            timestamp,
        }
    }

    pub fn off(pitch: PitchClass, timestamp: Instant) -> Self {
        Self {
            pitch,
            velocity: 0,
            kind: NoteKind::Off,
            timestamp,
        }
    }

    pub fn is_on(&self) -> bool {
        self.kind == NoteKind::On
    }
}
