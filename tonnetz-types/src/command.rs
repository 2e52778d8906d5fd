//! Commands accepted from a control surface (pointer, keyboard, console).

use crate::arpeggiator::ArpOrder;
use crate::lattice::Direction;
use crate::pitch::PitchClass;
use crate::ShapeId;

#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    // Pointer interaction
    SelectCell(PitchClass),
    DeselectCell(PitchClass),
    SelectTriad(ShapeId),
    /// Pointer released over a triad: deselects unless hold is on.
    ReleaseTriad(ShapeId),
    DeselectTriad(ShapeId),
    ClearAll,
    ToggleHold,
    Navigate(Direction),

    // Arpeggiator
    SetTempo(u16),
    SetTimeSignature(u8, u8),
    SetOctaveSpan(u8),
    SetOrderMode(ArpOrder),
    StartArpeggiator,
    StopArpeggiator,

    // Ports and settings
    SelectInputPort(String),
    SelectOutputPort(String),
    SetSizeFactor(f32),
    SetDarkMode(bool),

    // Virtual keyboard (simulated input device)
    PressKey(PitchClass, u8),
    ReleaseKey(PitchClass),
}

impl ControlCommand {
    /// Commands that reconfigure a supervised thread.
    pub fn restarts_task(&self) -> bool {
        matches!(
            self,
            ControlCommand::StartArpeggiator
                | ControlCommand::StopArpeggiator
                | ControlCommand::SelectInputPort(_)
        )
    }
}
