#![allow(dead_code)]
//! Test harness for tonnetz-core integration tests.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tonnetz_core::arpeggiator::{ArpeggiatorEngine, SharedArpConfig};
use tonnetz_core::clock::{Clock, ManualClock};
use tonnetz_core::emitter::NoteEmitter;
use tonnetz_core::selection::SelectionState;
use tonnetz_core::transport::NoteSink;
use tonnetz_types::{ArpeggiatorConfig, Lattice, PitchClass, ShapeId};

pub const C_MAJOR: [PitchClass; 3] = [PitchClass::C, PitchClass::E, PitchClass::G];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg {
    On(u8),
    Off(u8),
    Silence,
}

/// Note sink that stamps every message with the virtual clock time.
#[derive(Clone)]
pub struct TimedSink {
    clock: ManualClock,
    log: Arc<Mutex<Vec<(Instant, Msg)>>>,
}

impl TimedSink {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn entries(&self) -> Vec<(Instant, Msg)> {
        self.log.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<Msg> {
        self.entries().into_iter().map(|(_, m)| m).collect()
    }

    /// Onset times of every note-on, in order.
    pub fn onsets(&self) -> Vec<(Instant, u8)> {
        self.entries()
            .into_iter()
            .filter_map(|(t, m)| match m {
                Msg::On(n) => Some((t, n)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    fn push(&self, msg: Msg) {
        let now = self.clock.now();
        self.log.lock().unwrap().push((now, msg));
    }
}

impl NoteSink for TimedSink {
    fn note_on(&mut self, note: u8, _velocity: u8) -> Result<(), String> {
        self.push(Msg::On(note));
        Ok(())
    }

    fn note_off(&mut self, note: u8) -> Result<(), String> {
        self.push(Msg::Off(note));
        Ok(())
    }

    fn all_sound_off(&mut self) -> Result<(), String> {
        self.push(Msg::Silence);
        Ok(())
    }

    fn name(&self) -> &str {
        "timed"
    }
}

pub struct Harness {
    pub clock: ManualClock,
    pub sink: TimedSink,
    pub selection: Arc<SelectionState>,
    pub config: SharedArpConfig,
}

impl Harness {
    /// Selection wired to a timed sink, in arpeggiator mode (no sustain).
    pub fn new(config: ArpeggiatorConfig) -> Self {
        Self::with_oversleep(config, Duration::ZERO)
    }

    pub fn with_oversleep(config: ArpeggiatorConfig, oversleep: Duration) -> Self {
        let clock = ManualClock::with_oversleep(oversleep);
        let sink = TimedSink::new(clock.clone());
        let emitter = Arc::new(NoteEmitter::with_sink(Box::new(sink.clone())));
        let selection = Arc::new(SelectionState::new(Arc::new(Lattice::default()), emitter));
        selection.set_sustain(false);
        Self {
            clock,
            sink,
            selection,
            config: SharedArpConfig::new(config),
        }
    }

    pub fn engine(&self) -> ArpeggiatorEngine<ManualClock> {
        ArpeggiatorEngine::new(
            Arc::clone(&self.selection),
            self.config.clone(),
            self.clock.clone(),
        )
        .with_seed(1234)
    }

    pub fn select(&self, notes: &[PitchClass]) -> ShapeId {
        let id = triad_with(self.selection.lattice(), notes);
        self.selection.select_triad(id).unwrap();
        id
    }
}

/// A triad with exactly `notes`, away from the left and right edges.
pub fn triad_with(lattice: &Lattice, notes: &[PitchClass]) -> ShapeId {
    lattice
        .triads()
        .filter(|t| t.column > 0 && t.column + 1 < lattice.columns())
        .find(|t| t.notes == notes)
        .map(|t| t.id)
        .unwrap_or_else(|| panic!("no triad with notes {:?}", notes))
}
