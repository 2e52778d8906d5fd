//! Navigator: moves the last selected triad across the lattice.
//!
//! Outside hold mode a triad reached by navigation only rings for a short
//! while; the navigator thread releases it once its deadline passes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tonnetz_types::{Direction, ShapeId};

use crate::selection::SelectionState;
use crate::supervisor::CancelToken;

pub const DEFAULT_RELEASE_AFTER: Duration = Duration::from_millis(1500);

const IDLE_SLICE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    Move(Direction),
}

pub struct Navigator {
    selection: Arc<SelectionState>,
    release_after: Duration,
    pending: Vec<(Instant, ShapeId)>,
}

impl Navigator {
    pub fn new(selection: Arc<SelectionState>, release_after: Duration) -> Self {
        Self {
            selection,
            release_after,
            pending: Vec::new(),
        }
    }

    /// Apply one command at time `now`. Returns the triad moved to, if any.
    pub fn handle(&mut self, command: NavCommand, now: Instant) -> Option<ShapeId> {
        match command {
            NavCommand::Move(direction) => {
                let moved = self.selection.move_last_triad(direction);
                match moved {
                    Some(id) if self.selection.is_transient() => {
                        self.pending.push((now + self.release_after, id));
                    }
                    Some(_) => {}
                    None => log::debug!(target: "nav", "no move {}", direction.name()),
                }
                moved
            }
        }
    }

    /// Release every transient triad whose deadline has passed.
    pub fn release_due(&mut self, now: Instant) -> usize {
        let selection = &self.selection;
        let mut released = 0;
        self.pending.retain(|&(due, id)| {
            if due > now {
                return true;
            }
            if selection.release_transient(id) {
                log::debug!(target: "nav", "released {}", id);
                released += 1;
            }
            false
        });
        released
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.pending.iter().map(|(due, _)| *due).min()
    }

    pub fn run(&mut self, rx: &Receiver<NavCommand>, cancel: &CancelToken) {
        while !cancel.is_cancelled() {
            let now = Instant::now();
            self.release_due(now);
            let timeout = self
                .next_due()
                .map_or(IDLE_SLICE, |due| due.saturating_duration_since(now).min(IDLE_SLICE));
            match rx.recv_timeout(timeout) {
                Ok(command) => {
                    self.handle(command, Instant::now());
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::NoteEmitter;
    use tonnetz_types::{Lattice, PitchClass};

    fn navigator() -> Navigator {
        let emitter = Arc::new(NoteEmitter::simulated());
        let selection = Arc::new(SelectionState::new(Arc::new(Lattice::default()), emitter));
        let c_major = selection
            .lattice()
            .triads()
            .find(|t| t.notes == [PitchClass::C, PitchClass::E, PitchClass::G])
            .map(|t| t.id)
            .unwrap();
        selection.select_triad(c_major).unwrap();
        Navigator::new(selection, DEFAULT_RELEASE_AFTER)
    }

    fn move_somewhere(nav: &mut Navigator, now: Instant) -> ShapeId {
        [Direction::Right, Direction::Left]
            .into_iter()
            .find_map(|d| nav.handle(NavCommand::Move(d), now))
            .unwrap()
    }

    #[test]
    fn moved_triad_is_released_after_delay() {
        let mut nav = navigator();
        let now = Instant::now();
        let moved = move_somewhere(&mut nav, now);
        assert!(nav.selection.is_selected(moved));

        assert_eq!(nav.release_due(now + Duration::from_millis(1000)), 0);
        assert!(nav.selection.is_selected(moved));
        assert_eq!(nav.release_due(now + DEFAULT_RELEASE_AFTER), 1);
        assert!(nav.selection.snapshot().is_empty());
        assert_eq!(nav.next_due(), None);
    }

    #[test]
    fn hold_keeps_moved_triad() {
        let mut nav = navigator();
        nav.selection.set_hold(true);
        let now = Instant::now();
        let moved = move_somewhere(&mut nav, now);
        assert_eq!(nav.next_due(), None);
        nav.release_due(now + Duration::from_secs(10));
        assert!(nav.selection.is_selected(moved));
    }

    #[test]
    fn superseded_move_is_not_released_twice() {
        let mut nav = navigator();
        let now = Instant::now();
        let first = move_somewhere(&mut nav, now);
        let back = [Direction::Left, Direction::Right]
            .into_iter()
            .find_map(|d| nav.handle(NavCommand::Move(d), now + Duration::from_millis(500)))
            .unwrap();
        assert_ne!(first, back);

        assert_eq!(nav.release_due(now + DEFAULT_RELEASE_AFTER), 0);
        assert!(nav.selection.is_selected(back));
        assert_eq!(
            nav.release_due(now + Duration::from_millis(500) + DEFAULT_RELEASE_AFTER),
            1
        );
    }
}
