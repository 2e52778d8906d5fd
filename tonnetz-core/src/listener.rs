//! Input Listener: turns incoming note events into selection changes.
//!
//! Streamed mode drains a channel fed by a MIDI input connection. Polled
//! mode samples the virtual keyboard and synthesizes events from the
//! difference between samples. Both feed the same `handle`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tonnetz_types::{ChordWindow, NoteEvent, NoteKind, PitchClass};

use crate::keyboard::VirtualKeyboard;
use crate::selection::SelectionState;
use crate::supervisor::CancelToken;

/// Longest block on the input channel before re-checking cancellation.
const RECV_SLICE: Duration = Duration::from_millis(10);

pub struct InputListener {
    selection: Arc<SelectionState>,
    window: ChordWindow,
    /// Pitch classes physically down, in arrival order.
    pressed: Vec<PitchClass>,
    /// Notes of the chord currently selected, until it is broken.
    chord: Option<Vec<PitchClass>>,
}

impl InputListener {
    pub fn new(selection: Arc<SelectionState>, window: ChordWindow) -> Self {
        Self {
            selection,
            window,
            pressed: Vec::new(),
            chord: None,
        }
    }

    pub fn pressed(&self) -> &[PitchClass] {
        &self.pressed
    }

    pub fn chord(&self) -> Option<&[PitchClass]> {
        self.chord.as_deref()
    }

    pub fn handle(&mut self, event: NoteEvent) {
        match event.kind {
            NoteKind::On => self.note_on(event.pitch, event.velocity, event.timestamp),
            NoteKind::Off => self.note_off(event.pitch),
        }
    }

    fn note_on(&mut self, pitch: PitchClass, velocity: u8, now: Instant) {
        log::debug!(target: "input", "on {} vel {}", pitch, velocity);
        if self.selection.is_transient() {
            self.selection.clear_all();
        }
        self.selection.set_velocity(velocity);

        // In hold mode a new note after a finished chord starts over.
        if self.selection.hold() && self.chord.is_some() {
            self.selection.clear_all();
            self.chord = None;
        }

        if !self.pressed.contains(&pitch) {
            self.pressed.push(pitch);
        }

        if let Some(notes) = self.window.observe(pitch, now) {
            if let Some(previous) = self.chord.take() {
                self.selection.deselect_chord(&previous);
            }
            let triads = self.selection.select_chord(&notes);
            if !triads.is_empty() {
                log::debug!(target: "input", "chord {:?} -> {} triads", notes, triads.len());
                self.chord = Some(notes);
            }
        }
        self.selection.select_cell(pitch);
    }

    fn note_off(&mut self, pitch: PitchClass) {
        log::debug!(target: "input", "off {}", pitch);
        self.pressed.retain(|p| *p != pitch);

        let breaks_chord = match &self.chord {
            Some(notes) => notes.contains(&pitch) || self.pressed.is_empty(),
            None => false,
        };
        if self.selection.hold() && self.chord.is_some() {
            return;
        }
        if breaks_chord {
            if let Some(notes) = self.chord.take() {
                self.selection.deselect_chord(&notes);
            }
        }
        self.selection.deselect_cell(pitch);
    }

    /// Drain events from a device channel until cancelled or disconnected.
    pub fn run_streamed(&mut self, rx: &Receiver<NoteEvent>, cancel: &CancelToken) {
        log::info!(target: "input", "listening to MIDI input");
        while !cancel.is_cancelled() {
            match rx.recv_timeout(RECV_SLICE) {
                Ok(event) => self.handle(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!(target: "input", "MIDI input disconnected");
                    break;
                }
            }
        }
    }

    /// Sample the virtual keyboard every `interval` until cancelled.
    pub fn run_polled(&mut self, keyboard: &VirtualKeyboard, cancel: &CancelToken, interval: Duration) {
        log::info!(target: "input", "listening to virtual keyboard");
        let mut previous = BTreeMap::new();
        while !cancel.is_cancelled() {
            self.poll_once(keyboard, &mut previous, Instant::now());
            if !cancel.wait(interval) {
                break;
            }
        }
    }

    /// Compare the keyboard against `previous` and handle the differences.
    pub fn poll_once(
        &mut self,
        keyboard: &VirtualKeyboard,
        previous: &mut BTreeMap<PitchClass, u8>,
        now: Instant,
    ) {
        let current = keyboard.snapshot();
        for pitch in previous.keys() {
            if !current.contains_key(pitch) {
                self.handle(NoteEvent::off(*pitch, now));
            }
        }
        for (pitch, velocity) in &current {
            if !previous.contains_key(pitch) {
                self.handle(NoteEvent::on(*pitch, *velocity, now));
            }
        }
        *previous = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::NoteEmitter;
    use tonnetz_types::Lattice;

    const C_MAJOR: [PitchClass; 3] = [PitchClass::C, PitchClass::E, PitchClass::G];

    fn listener() -> InputListener {
        let emitter = Arc::new(NoteEmitter::simulated());
        let selection = Arc::new(SelectionState::new(Arc::new(Lattice::default()), emitter));
        InputListener::new(selection, ChordWindow::default())
    }

    fn press_chord(listener: &mut InputListener, start: Instant) {
        for (i, pitch) in C_MAJOR.iter().enumerate() {
            listener.handle(NoteEvent::on(*pitch, 100, start + Duration::from_millis(i as u64 * 20)));
        }
    }

    #[test]
    fn single_note_selects_cell() {
        let mut l = listener();
        l.handle(NoteEvent::on(PitchClass::D, 90, Instant::now()));
        let snap = l.selection.snapshot();
        assert_eq!(snap.cells, vec![PitchClass::D]);
        assert_eq!(snap.velocity, 90);
        assert!(snap.triads.is_empty());

        l.handle(NoteEvent::off(PitchClass::D, Instant::now()));
        assert!(l.selection.snapshot().is_empty());
    }

    #[test]
    fn chord_within_window_selects_triads() {
        let mut l = listener();
        press_chord(&mut l, Instant::now());
        assert!(!l.selection.snapshot().triads.is_empty());
        assert_eq!(l.selection.triad_notes(), C_MAJOR.to_vec());
    }

    #[test]
    fn slow_notes_never_form_a_chord() {
        let mut l = listener();
        let start = Instant::now();
        for (i, pitch) in C_MAJOR.iter().enumerate() {
            l.handle(NoteEvent::on(*pitch, 100, start + Duration::from_millis(i as u64 * 400)));
        }
        assert!(l.selection.snapshot().triads.is_empty());
        assert_eq!(l.selection.snapshot().cells, C_MAJOR.to_vec());
    }

    #[test]
    fn releasing_a_chord_note_clears_it() {
        let mut l = listener();
        let start = Instant::now();
        press_chord(&mut l, start);
        l.handle(NoteEvent::off(PitchClass::E, start));
        assert!(l.selection.snapshot().is_empty());
        assert!(l.selection.emitter().sounding().is_empty());

        l.handle(NoteEvent::off(PitchClass::C, start));
        l.handle(NoteEvent::off(PitchClass::G, start));
        assert!(l.selection.snapshot().is_empty());
    }

    #[test]
    fn hold_keeps_chord_until_next_note() {
        let mut l = listener();
        l.selection.set_hold(true);
        let start = Instant::now();
        press_chord(&mut l, start);
        for pitch in C_MAJOR {
            l.handle(NoteEvent::off(pitch, start));
        }
        assert_eq!(l.selection.triad_notes(), C_MAJOR.to_vec());

        l.handle(NoteEvent::on(PitchClass::A, 80, start + Duration::from_secs(2)));
        let snap = l.selection.snapshot();
        assert!(snap.triads.is_empty());
        assert_eq!(snap.cells, vec![PitchClass::A]);
    }

    fn assert_silent(l: &InputListener) {
        let snap = l.selection.snapshot();
        assert!(snap.triads.is_empty(), "triads left: {:?}", snap.triads);
        assert!(snap.cells.is_empty(), "cells left: {:?}", snap.cells);
        assert!(l.selection.emitter().sounding().is_empty());
        assert!(l.pressed().is_empty());
    }

    #[test]
    fn tapped_note_still_in_window_does_not_leave_chord_sounding() {
        let mut l = listener();
        let start = Instant::now();
        let at = |ms: u64| start + Duration::from_millis(ms);

        l.handle(NoteEvent::on(PitchClass::C, 100, at(0)));
        l.handle(NoteEvent::off(PitchClass::C, at(20)));
        l.handle(NoteEvent::on(PitchClass::E, 100, at(40)));
        l.handle(NoteEvent::on(PitchClass::G, 100, at(60)));
        assert_eq!(l.chord(), Some(&C_MAJOR[..]));
        assert_eq!(l.pressed(), &[PitchClass::E, PitchClass::G]);

        l.handle(NoteEvent::off(PitchClass::E, at(100)));
        l.handle(NoteEvent::off(PitchClass::G, at(120)));
        assert_silent(&l);
    }

    #[test]
    fn late_extra_note_keeps_chord_breakable() {
        let mut l = listener();
        let start = Instant::now();
        press_chord(&mut l, start);
        l.handle(NoteEvent::on(PitchClass::D, 100, start + Duration::from_millis(800)));
        assert_eq!(l.chord(), Some(&C_MAJOR[..]));
        assert!(!l.selection.snapshot().triads.is_empty());

        for pitch in [PitchClass::C, PitchClass::E, PitchClass::G, PitchClass::D] {
            l.handle(NoteEvent::off(pitch, start + Duration::from_secs(1)));
        }
        assert_silent(&l);
    }

    #[test]
    fn extra_note_released_first_leaves_chord() {
        let mut l = listener();
        let start = Instant::now();
        press_chord(&mut l, start);
        l.handle(NoteEvent::on(PitchClass::D, 100, start + Duration::from_millis(800)));
        l.handle(NoteEvent::off(PitchClass::D, start + Duration::from_millis(900)));
        assert_eq!(l.selection.triad_notes(), C_MAJOR.to_vec());
        assert!(!l.selection.snapshot().cells.contains(&PitchClass::D));

        l.handle(NoteEvent::off(PitchClass::G, start + Duration::from_secs(1)));
        assert!(l.selection.snapshot().triads.is_empty());
    }

    #[test]
    fn streamed_events_drain_until_disconnect() {
        let mut l = listener();
        let (tx, rx) = crossbeam_channel::unbounded();
        let start = Instant::now();
        for (i, pitch) in C_MAJOR.iter().enumerate() {
            tx.send(NoteEvent::on(*pitch, 110, start + Duration::from_millis(i as u64 * 10)))
                .unwrap();
        }
        tx.send(NoteEvent::on(PitchClass::B, 90, start + Duration::from_secs(1))).unwrap();
        tx.send(NoteEvent::off(PitchClass::B, start + Duration::from_secs(1))).unwrap();
        drop(tx);

        l.run_streamed(&rx, &CancelToken::new());
        assert_eq!(l.selection.triad_notes(), C_MAJOR.to_vec());
        assert_eq!(l.selection.snapshot().cells, C_MAJOR.to_vec());
        assert_eq!(l.selection.velocity(), 90);
    }

    #[test]
    fn streamed_loop_stops_on_cancel() {
        let mut l = listener();
        let (tx, rx) = crossbeam_channel::unbounded::<NoteEvent>();
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let started = Instant::now();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });

        l.run_streamed(&rx, &cancel);
        canceller.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        drop(tx);
    }

    #[test]
    fn polled_keyboard_feeds_events() {
        let mut l = listener();
        let keyboard = VirtualKeyboard::new();
        let mut previous = BTreeMap::new();
        let now = Instant::now();

        keyboard.press(PitchClass::C, 100);
        keyboard.press(PitchClass::E, 100);
        keyboard.press(PitchClass::G, 100);
        l.poll_once(&keyboard, &mut previous, now);
        assert_eq!(l.selection.triad_notes(), C_MAJOR.to_vec());

        keyboard.release(PitchClass::G);
        l.poll_once(&keyboard, &mut previous, now + Duration::from_millis(50));
        assert!(l.selection.snapshot().is_empty());
    }
}
