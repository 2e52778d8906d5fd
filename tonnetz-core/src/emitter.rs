//! Note Emitter: the single gate every note-on/note-off passes through.
//!
//! Keeps the table of sounding notes and forwards transitions to a device
//! sink when one is attached. With no sink the emitter is the simulated
//! transport: it only updates the table and logs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::transport::NoteSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveNote {
    /// Number of outstanding `play` calls for this note.
    pub count: u32,
    pub velocity: u8,
}

/// Sounding notes keyed by MIDI note number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveNoteSet {
    notes: BTreeMap<u8, ActiveNote>,
}

impl ActiveNoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the note was not sounding before.
    pub fn press(&mut self, note: u8, velocity: u8) -> bool {
        match self.notes.get_mut(&note) {
            Some(active) => {
                active.count += 1;
                false
            }
            None => {
                self.notes.insert(note, ActiveNote { count: 1, velocity });
                true
            }
        }
    }

    /// Returns true when this release silenced the note.
    pub fn release(&mut self, note: u8) -> bool {
        let Some(active) = self.notes.get_mut(&note) else {
            return false;
        };
        active.count = active.count.saturating_sub(1);
        if active.count == 0 {
            self.notes.remove(&note);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, note: u8) -> bool {
        self.notes.contains_key(&note)
    }

    pub fn get(&self, note: u8) -> Option<ActiveNote> {
        self.notes.get(&note).copied()
    }

    /// Sounding note numbers in ascending order.
    pub fn notes(&self) -> Vec<u8> {
        self.notes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }
}

struct EmitterInner {
    active: ActiveNoteSet,
    sink: Option<Box<dyn NoteSink>>,
}

pub struct NoteEmitter {
    inner: Mutex<EmitterInner>,
}

impl NoteEmitter {
    /// Emitter with no device: notes are tracked and logged only.
    pub fn simulated() -> Self {
        Self {
            inner: Mutex::new(EmitterInner {
                active: ActiveNoteSet::new(),
                sink: None,
            }),
        }
    }

    pub fn with_sink(sink: Box<dyn NoteSink>) -> Self {
        Self {
            inner: Mutex::new(EmitterInner {
                active: ActiveNoteSet::new(),
                sink: Some(sink),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EmitterInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.lock().sink.is_none()
    }

    pub fn sink_name(&self) -> Option<String> {
        self.lock().sink.as_ref().map(|s| s.name().to_string())
    }

    /// Swap the output device. The old device is silenced and every note
    /// still sounding is re-struck on the new one, so the table stays valid.
    pub fn replace_sink(&self, sink: Option<Box<dyn NoteSink>>) {
        let mut inner = self.lock();
        if let Some(old) = inner.sink.as_mut() {
            if let Err(e) = old.all_sound_off() {
                log::warn!(target: "emitter", "silencing {} failed: {}", old.name(), e);
            }
        }
        inner.sink = sink;

        let EmitterInner { active, sink } = &mut *inner;
        match sink {
            Some(sink) => {
                log::info!(target: "emitter", "output routed to {}", sink.name());
                for note in active.notes() {
                    let velocity = active.get(note).map_or(64, |a| a.velocity);
                    if let Err(e) = sink.note_on(note, velocity) {
                        log::warn!(target: "emitter", "re-strike {} failed: {}", note, e);
                    }
                }
            }
            None => log::info!(target: "emitter", "output simulated"),
        }
    }

    /// Sound a note. A note already sounding is only counted, not re-sent.
    pub fn play(&self, note: u8, velocity: u8) -> Result<(), String> {
        let mut inner = self.lock();
        let EmitterInner { active, sink } = &mut *inner;
        if !active.press(note, velocity) {
            return Ok(());
        }
        match sink {
            Some(sink) => sink.note_on(note, velocity),
            None => {
                log::debug!(target: "emitter", "sim note on {} vel {}", note, velocity);
                Ok(())
            }
        }
    }

    /// Release a note. Releasing a silent note does nothing.
    pub fn stop(&self, note: u8) -> Result<(), String> {
        let mut inner = self.lock();
        let EmitterInner { active, sink } = &mut *inner;
        if !active.release(note) {
            return Ok(());
        }
        match sink {
            Some(sink) => sink.note_off(note),
            None => {
                log::debug!(target: "emitter", "sim note off {}", note);
                Ok(())
            }
        }
    }

    /// Silence everything with a channel-wide message and empty the table.
    pub fn stop_all(&self) -> Result<(), String> {
        let mut inner = self.lock();
        let EmitterInner { active, sink } = &mut *inner;
        let was_sounding = active.len();
        active.clear();
        match sink {
            Some(sink) => sink.all_sound_off(),
            None => {
                if was_sounding > 0 {
                    log::debug!(target: "emitter", "sim all notes off ({} sounding)", was_sounding);
                }
                Ok(())
            }
        }
    }

    pub fn is_active(&self, note: u8) -> bool {
        self.lock().active.contains(note)
    }

    pub fn snapshot(&self) -> ActiveNoteSet {
        self.lock().active.clone()
    }

    pub fn sounding(&self) -> Vec<u8> {
        self.lock().active.notes()
    }
}
