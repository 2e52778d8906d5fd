//! Virtual keyboard: the simulated input device.
//!
//! Control commands press and release keys here; the polled input listener
//! samples the table and turns differences into note events.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use tonnetz_types::PitchClass;

#[derive(Debug, Default)]
pub struct VirtualKeyboard {
    keys: Mutex<BTreeMap<PitchClass, u8>>,
}

impl VirtualKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PitchClass, u8>> {
        match self.keys.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn press(&self, pitch: PitchClass, velocity: u8) {
        self.lock().insert(pitch, velocity.min(127));
    }

    pub fn release(&self, pitch: PitchClass) {
        self.lock().remove(&pitch);
    }

    pub fn release_all(&self) {
        self.lock().clear();
    }

    /// Pressed keys with their velocities.
    pub fn snapshot(&self) -> BTreeMap<PitchClass, u8> {
        self.lock().clone()
    }
}
