//! # tonnetz-types
//!
//! Shared type definitions for the Tonnetz performance tool.
//! Everything here is plain data or a pure function; the threaded engine
//! lives in tonnetz-core.

pub mod arpeggiator;
pub mod chord_window;
pub mod command;
pub mod lattice;
pub mod note;
pub mod pitch;

pub use arpeggiator::{ArpOrder, ArpeggiatorConfig, TimeSignature};
pub use chord_window::{ChordPolicy, ChordWindow};
pub use command::ControlCommand;
pub use lattice::{Cell, Direction, Lattice, Shape, ShapeKind, Triad};
pub use note::{NoteEvent, NoteKind};
pub use pitch::{PitchClass, BASE_NOTE};

/// Stable identifier of a lattice shape (cell or triad).
///
/// Assigned once when the lattice is built; never reused for another shape.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ShapeId(u32);

impl ShapeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
