//! Selection State: which lattice shapes are currently active.
//!
//! Every mutation takes the selection lock, updates membership and then
//! reconciles the sounding notes through the emitter before releasing the
//! lock, so no other thread can observe a shape that is selected but not
//! yet sounding (or the reverse). Lock order is always selection, then
//! emitter.
//!
//! While sustain is on (arpeggiator idle) the selected pitch classes ring as
//! a held chord. While the arpeggiator runs, sustain is off and the engine
//! is the only producer of notes.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tonnetz_types::{Direction, Lattice, PitchClass, ShapeId, ShapeKind};

use crate::emitter::NoteEmitter;

pub const DEFAULT_VELOCITY: u8 = 64;

/// Point-in-time copy of the selection for display and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSnapshot {
    /// Distinct pitch classes of the selected cells, sorted.
    pub cells: Vec<PitchClass>,
    /// Selected triad ids, sorted.
    pub triads: Vec<ShapeId>,
    pub hold: bool,
    pub sustain: bool,
    /// MIDI notes this selection is currently holding down.
    pub sounding: Vec<u8>,
    pub velocity: u8,
}

impl SelectionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.triads.is_empty()
    }
}

struct Inner {
    selected: HashMap<ShapeId, ShapeKind>,
    hold: bool,
    sustain: bool,
    last_triad: Option<ShapeId>,
    /// The last triad was placed by navigation and is released automatically.
    transient: bool,
    sounding: BTreeSet<u8>,
    velocity: u8,
}

pub struct SelectionState {
    lattice: Arc<Lattice>,
    emitter: Arc<NoteEmitter>,
    inner: Mutex<Inner>,
    generation: AtomicU64,
}

impl SelectionState {
    pub fn new(lattice: Arc<Lattice>, emitter: Arc<NoteEmitter>) -> Self {
        Self {
            lattice,
            emitter,
            inner: Mutex::new(Inner {
                selected: HashMap::new(),
                hold: false,
                sustain: true,
                last_triad: None,
                transient: false,
                sounding: BTreeSet::new(),
                velocity: DEFAULT_VELOCITY,
            }),
            generation: AtomicU64::new(0),
        }
    }

    pub fn lattice(&self) -> &Arc<Lattice> {
        &self.lattice
    }

    pub fn emitter(&self) -> &Arc<NoteEmitter> {
        &self.emitter
    }

    /// Bumped after every membership change; the arpeggiator waits on it.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ---- cells ----

    pub fn select_cell(&self, pitch: PitchClass) {
        let mut inner = self.lock();
        self.insert_cells(&mut inner, pitch);
        self.commit(&mut inner);
    }

    pub fn deselect_cell(&self, pitch: PitchClass) {
        let mut inner = self.lock();
        self.remove_cells(&mut inner, pitch);
        self.commit(&mut inner);
    }

    // ---- triads ----

    /// Select a triad and its cells.
    ///
    /// If exactly one other triad was selected and it shares no notes with
    /// this one, it is deselected first.
    pub fn select_triad(&self, id: ShapeId) -> Result<(), String> {
        let triad = self
            .lattice
            .triad(id)
            .ok_or_else(|| format!("Unknown triad: {}", id))?;
        let mut inner = self.lock();

        let others: Vec<ShapeId> = Self::triad_ids(&inner)
            .into_iter()
            .filter(|other| *other != id)
            .collect();
        if let &[previous] = others.as_slice() {
            let unrelated = self
                .lattice
                .triad(previous)
                .map_or(false, |prev| prev.shared_notes(triad) == 0);
            if unrelated {
                log::debug!(target: "selection", "replacing triad {} with {}", previous, id);
                self.remove_triad(&mut inner, previous, true);
            }
        }

        inner.selected.insert(id, ShapeKind::Triad);
        for &pitch in &triad.notes {
            self.insert_cells(&mut inner, pitch);
        }
        inner.last_triad = Some(id);
        inner.transient = false;
        self.commit(&mut inner);
        Ok(())
    }

    /// Remove a triad; its cells go too unless hold is on.
    pub fn deselect_triad(&self, id: ShapeId) -> Result<(), String> {
        if self.lattice.triad(id).is_none() {
            return Err(format!("Unknown triad: {}", id));
        }
        let mut inner = self.lock();
        let with_cells = !inner.hold;
        self.remove_triad(&mut inner, id, with_cells);
        self.commit(&mut inner);
        Ok(())
    }

    /// Pointer released over a triad: deselect unless hold is on.
    pub fn release_triad(&self, id: ShapeId) -> Result<(), String> {
        if self.hold() {
            return Ok(());
        }
        self.deselect_triad(id)
    }

    /// Select every triad that fits inside `notes`, plus the cells for
    /// `notes`. Returns the triads selected.
    pub fn select_chord(&self, notes: &[PitchClass]) -> Vec<ShapeId> {
        let triads = self.lattice.triads_within(notes);
        let mut inner = self.lock();
        for &id in &triads {
            inner.selected.insert(id, ShapeKind::Triad);
        }
        for &pitch in notes {
            self.insert_cells(&mut inner, pitch);
        }
        if let Some(&first) = triads.first() {
            inner.last_triad = Some(first);
            inner.transient = false;
        }
        self.commit(&mut inner);
        triads
    }

    /// Undo `select_chord`: drop triads inside `notes` and the cells for `notes`.
    pub fn deselect_chord(&self, notes: &[PitchClass]) {
        let mut inner = self.lock();
        for id in self.lattice.triads_within(notes) {
            inner.selected.remove(&id);
        }
        for &pitch in notes {
            self.remove_cells(&mut inner, pitch);
        }
        self.commit(&mut inner);
    }

    /// Empty the selection and silence the channel outright.
    pub fn clear_all(&self) {
        let mut inner = self.lock();
        inner.selected.clear();
        inner.sounding.clear();
        inner.last_triad = None;
        inner.transient = false;
        if let Err(e) = self.emitter.stop_all() {
            log::warn!(target: "selection", "all notes off failed: {}", e);
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        log::debug!(target: "selection", "cleared");
    }

    // ---- modes ----

    pub fn hold(&self) -> bool {
        self.lock().hold
    }

    /// Flip hold mode. Turning it off clears everything.
    pub fn toggle_hold(&self) -> bool {
        let hold = !self.hold();
        self.set_hold(hold);
        hold
    }

    pub fn set_hold(&self, hold: bool) {
        let was = {
            let mut inner = self.lock();
            std::mem::replace(&mut inner.hold, hold)
        };
        log::info!(target: "selection", "hold {}", if hold { "on" } else { "off" });
        if was && !hold {
            self.clear_all();
        }
    }

    /// Sound the selection as a held chord (true) or leave all sounding to
    /// the arpeggiator (false).
    pub fn set_sustain(&self, sustain: bool) {
        let mut inner = self.lock();
        if inner.sustain == sustain {
            return;
        }
        inner.sustain = sustain;
        self.reconcile(&mut inner);
    }

    pub fn velocity(&self) -> u8 {
        self.lock().velocity
    }

    pub fn set_velocity(&self, velocity: u8) {
        self.lock().velocity = velocity.min(127);
    }

    // ---- navigation ----

    /// True while the last triad was placed by navigation and not yet released.
    pub fn is_transient(&self) -> bool {
        self.lock().transient
    }

    /// Move the last selected triad one step in `direction`.
    ///
    /// Returns the triad now selected, or `None` when there is no triad to
    /// move or the neighbour shares fewer than two notes.
    pub fn move_last_triad(&self, direction: Direction) -> Option<ShapeId> {
        let mut inner = self.lock();
        let from = inner.last_triad?;
        let to = self.lattice.step(from, direction)?;
        let to_notes = self.lattice.triad(to)?.notes.clone();

        self.remove_triad(&mut inner, from, true);
        inner.selected.insert(to, ShapeKind::Triad);
        for &pitch in &to_notes {
            self.insert_cells(&mut inner, pitch);
        }
        inner.last_triad = Some(to);
        inner.transient = !inner.hold;
        self.commit(&mut inner);
        log::debug!(target: "nav", "moved {} {} to {}", from, direction.name(), to);
        Some(to)
    }

    /// Release a navigation-placed triad if it is still the transient one.
    pub fn release_transient(&self, id: ShapeId) -> bool {
        let mut inner = self.lock();
        if !inner.transient || inner.last_triad != Some(id) || inner.hold {
            return false;
        }
        self.remove_triad(&mut inner, id, true);
        inner.transient = false;
        self.commit(&mut inner);
        true
    }

    // ---- reads ----

    /// Union of the notes of every selected triad, sorted. Cells are not included.
    pub fn triad_notes(&self) -> Vec<PitchClass> {
        let inner = self.lock();
        let notes: BTreeSet<PitchClass> = Self::triad_ids(&inner)
            .into_iter()
            .filter_map(|id| self.lattice.triad(id))
            .flat_map(|t| t.notes.iter().copied())
            .collect();
        notes.into_iter().collect()
    }

    pub fn is_selected(&self, id: ShapeId) -> bool {
        self.lock().selected.contains_key(&id)
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        let inner = self.lock();
        let cells: BTreeSet<PitchClass> = inner
            .selected
            .iter()
            .filter(|(_, kind)| **kind == ShapeKind::Cell)
            .filter_map(|(id, _)| self.lattice.cell(*id))
            .map(|c| c.pitch)
            .collect();
        SelectionSnapshot {
            cells: cells.into_iter().collect(),
            triads: Self::triad_ids(&inner),
            hold: inner.hold,
            sustain: inner.sustain,
            sounding: inner.sounding.iter().copied().collect(),
            velocity: inner.velocity,
        }
    }

    // ---- internals ----

    fn triad_ids(inner: &Inner) -> Vec<ShapeId> {
        let mut ids: Vec<ShapeId> = inner
            .selected
            .iter()
            .filter(|(_, kind)| **kind == ShapeKind::Triad)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    fn insert_cells(&self, inner: &mut Inner, pitch: PitchClass) {
        for id in self.lattice.cells_with_pitch(pitch) {
            inner.selected.insert(id, ShapeKind::Cell);
        }
    }

    fn remove_cells(&self, inner: &mut Inner, pitch: PitchClass) {
        for id in self.lattice.cells_with_pitch(pitch) {
            inner.selected.remove(&id);
        }
    }

    /// Remove a triad, and with it the cells no other selected triad needs.
    fn remove_triad(&self, inner: &mut Inner, id: ShapeId, with_cells: bool) {
        inner.selected.remove(&id);
        if inner.last_triad == Some(id) {
            inner.last_triad = None;
            inner.transient = false;
        }
        if !with_cells {
            return;
        }
        let Some(triad) = self.lattice.triad(id) else {
            return;
        };
        let still_needed: BTreeSet<PitchClass> = Self::triad_ids(inner)
            .into_iter()
            .filter_map(|other| self.lattice.triad(other))
            .flat_map(|t| t.notes.iter().copied())
            .collect();
        for &pitch in &triad.notes {
            if !still_needed.contains(&pitch) {
                self.remove_cells(inner, pitch);
            }
        }
    }

    fn selected_pitches(&self, inner: &Inner) -> BTreeSet<PitchClass> {
        inner
            .selected
            .keys()
            .filter_map(|id| self.lattice.shape(*id))
            .flat_map(|shape| shape.notes())
            .collect()
    }

    fn commit(&self, inner: &mut Inner) {
        self.reconcile(inner);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Bring the emitter in line with the selection.
    fn reconcile(&self, inner: &mut Inner) {
        let desired: BTreeSet<u8> = if inner.sustain {
            self.selected_pitches(inner)
                .into_iter()
                .map(PitchClass::to_midi)
                .collect()
        } else {
            BTreeSet::new()
        };

        for &note in inner.sounding.difference(&desired) {
            if let Err(e) = self.emitter.stop(note) {
                log::warn!(target: "selection", "note off {} failed: {}", note, e);
            }
        }
        for &note in desired.difference(&inner.sounding) {
            if let Err(e) = self.emitter.play(note, inner.velocity) {
                log::warn!(target: "selection", "note on {} failed: {}", note, e);
            }
        }
        inner.sounding = desired;
    }
}
