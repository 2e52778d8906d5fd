//! Chord detection from note-on events that arrive close together in time.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::pitch::PitchClass;

/// Default window within which separate note-ons count as one chord.
pub const DEFAULT_CHORD_WINDOW: Duration = Duration::from_millis(300);

/// How many simultaneous pitch classes make a chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordPolicy {
    AtLeast(usize),
    Exactly(usize),
}

impl ChordPolicy {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            ChordPolicy::AtLeast(n) => count >= n,
            ChordPolicy::Exactly(n) => count == n,
        }
    }
}

impl Default for ChordPolicy {
    fn default() -> Self {
        ChordPolicy::AtLeast(3)
    }
}

/// Sliding window of recent note-on activations.
///
/// Owned by a single input thread; not synchronized.
#[derive(Debug, Clone)]
pub struct ChordWindow {
    activations: HashMap<PitchClass, Instant>,
    window: Duration,
    policy: ChordPolicy,
}

impl ChordWindow {
    pub fn new(window: Duration, policy: ChordPolicy) -> Self {
        Self {
            activations: HashMap::new(),
            window,
            policy,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn policy(&self) -> ChordPolicy {
        self.policy
    }

    /// Record a note-on and return the chord it completes, if any.
    ///
    /// A pitch already in the window keeps its original activation time.
    /// Returned notes are sorted by pitch class.
    pub fn observe(&mut self, pitch: PitchClass, now: Instant) -> Option<Vec<PitchClass>> {
        self.activations.entry(pitch).or_insert(now);

        let window = self.window;
        self.activations
            .retain(|_, activated| now.saturating_duration_since(*activated) <= window);

        let mut notes: Vec<PitchClass> = self.activations.keys().copied().collect();
        notes.sort();

        if self.policy.accepts(notes.len()) {
            Some(notes)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.activations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activations.is_empty()
    }

    pub fn clear(&mut self) {
        self.activations.clear();
    }
}

impl Default for ChordWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CHORD_WINDOW, ChordPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PitchClass::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn three_notes_within_window_form_chord() {
        let t0 = Instant::now();
        let mut w = ChordWindow::default();
        assert_eq!(w.observe(C, t0), None);
        assert_eq!(w.observe(E, t0 + ms(50)), None);
        assert_eq!(w.observe(G, t0 + ms(100)), Some(vec![C, E, G]));
    }

    #[test]
    fn late_note_never_includes_expired_one() {
        let t0 = Instant::now();
        let mut w = ChordWindow::new(ms(300), ChordPolicy::AtLeast(3));
        w.observe(C, t0);
        w.observe(E, t0 + ms(200));
        // C is 400ms old by now
        assert_eq!(w.observe(G, t0 + ms(400)), None);
        assert_eq!(w.len(), 2);

        let chord = w.observe(B, t0 + ms(450)).unwrap();
        assert!(!chord.contains(&C));
        assert_eq!(chord, vec![E, G, B]);
    }

    #[test]
    fn notes_further_apart_than_window_never_combine() {
        let t0 = Instant::now();
        let mut w = ChordWindow::new(ms(250), ChordPolicy::AtLeast(2));
        w.observe(C, t0);
        assert_eq!(w.observe(E, t0 + ms(251)), None);
    }

    #[test]
    fn repeated_note_keeps_first_activation() {
        let t0 = Instant::now();
        let mut w = ChordWindow::new(ms(300), ChordPolicy::AtLeast(3));
        w.observe(C, t0);
        w.observe(C, t0 + ms(250));
        w.observe(E, t0 + ms(280));
        // C ages out at its first activation, not the repeat
        assert_eq!(w.observe(G, t0 + ms(350)), None);
    }

    #[test]
    fn held_chord_keeps_requalifying() {
        let t0 = Instant::now();
        let mut w = ChordWindow::default();
        w.observe(C, t0);
        w.observe(E, t0);
        assert!(w.observe(G, t0).is_some());
        assert!(w.observe(G, t0 + ms(100)).is_some());
    }

    #[test]
    fn exactly_policy_rejects_four_notes() {
        let t0 = Instant::now();
        let mut w = ChordWindow::new(ms(500), ChordPolicy::Exactly(3));
        w.observe(C, t0);
        w.observe(E, t0);
        assert!(w.observe(G, t0).is_some());
        assert_eq!(w.observe(Bb, t0), None);
    }

    #[test]
    fn at_least_policy_accepts_four_notes() {
        let t0 = Instant::now();
        let mut w = ChordWindow::default();
        for p in [C, E, G] {
            w.observe(p, t0);
        }
        assert_eq!(w.observe(Bb, t0), Some(vec![C, E, G, Bb]));
    }
}
