//! Arpeggiator Engine: replays the selected triads as a timed note sequence.
//!
//! Each cycle snapshots the selection and configuration, builds the ordered
//! octave-extended sequence and plays it note by note against absolute
//! deadlines on a `Clock`. Deadlines advance by adding the interval to the
//! previous deadline, so oversleeping one note never delays the next.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tonnetz_types::{ArpOrder, ArpeggiatorConfig, PitchClass};

use crate::clock::Clock;
use crate::selection::SelectionState;
use crate::supervisor::CancelToken;
use crate::telemetry::OnsetTelemetry;

/// Longest single pause while waiting, so cancellation is seen promptly.
const MAX_PAUSE: Duration = Duration::from_millis(10);

/// Poll period while the selection has no triads.
const IDLE_POLL: Duration = Duration::from_millis(5);

const DEFAULT_SEED: u64 = 0x2545_F491_4F6C_DD1D;

/// Configuration shared between the control surface and the engine.
///
/// Readers always get a whole copy, so a tempo change can never be seen
/// half-applied.
#[derive(Debug, Clone, Default)]
pub struct SharedArpConfig(Arc<Mutex<ArpeggiatorConfig>>);

impl SharedArpConfig {
    pub fn new(config: ArpeggiatorConfig) -> Self {
        Self(Arc::new(Mutex::new(config)))
    }

    pub fn snapshot(&self) -> ArpeggiatorConfig {
        match self.0.lock() {
            Ok(config) => *config,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut ArpeggiatorConfig) -> R) -> R {
        let mut config = match self.0.lock() {
            Ok(config) => config,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut *config)
    }
}

fn next_random(rng_state: &mut u64) -> u64 {
    *rng_state = rng_state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *rng_state >> 33
}

/// Expand `notes` into the MIDI sequence for one cycle.
///
/// Every pitch class is placed in the base octave and copied up
/// `octave_span - 1` octaves. With `fill_even_meters` and a meter that is
/// not a multiple of three, the lowest note is played once more.
pub fn build_sequence(
    notes: &[PitchClass],
    config: &ArpeggiatorConfig,
    rng_state: &mut u64,
) -> Vec<u8> {
    let mut base: Vec<u8> = notes.iter().map(|n| n.to_midi()).collect();
    base.sort_unstable();
    base.dedup();
    let Some(&lowest) = base.first() else {
        return Vec::new();
    };

    let mut sequence: Vec<u8> = Vec::with_capacity(base.len() * config.octave_span() as usize + 1);
    for octave in 0..config.octave_span() {
        for &note in &base {
            let pitched = note as u16 + octave as u16 * 12;
            if pitched <= 127 {
                sequence.push(pitched as u8);
            }
        }
    }
    if config.fill_even_meters && !config.time_signature().is_ternary() {
        sequence.push(lowest);
    }

    match config.order {
        ArpOrder::Up => sequence.sort_unstable(),
        ArpOrder::Down => sequence.sort_unstable_by(|a, b| b.cmp(a)),
        ArpOrder::Random => {
            // Fisher-Yates
            for i in (1..sequence.len()).rev() {
                let j = (next_random(rng_state) % (i as u64 + 1)) as usize;
                sequence.swap(i, j);
            }
        }
    }
    sequence
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Played this many notes.
    Played(usize),
    /// No triads selected; everything was silenced.
    Idle,
    Cancelled,
}

pub struct ArpeggiatorEngine<C: Clock> {
    selection: Arc<SelectionState>,
    config: SharedArpConfig,
    clock: C,
    rng_state: u64,
    telemetry: OnsetTelemetry,
    next_onset: Option<Instant>,
    seen_generation: u64,
}

impl<C: Clock> ArpeggiatorEngine<C> {
    pub fn new(selection: Arc<SelectionState>, config: SharedArpConfig, clock: C) -> Self {
        Self {
            selection,
            config,
            clock,
            rng_state: DEFAULT_SEED,
            telemetry: OnsetTelemetry::new(),
            next_onset: None,
            seen_generation: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_state = seed;
        self
    }

    pub fn telemetry(&self) -> &OnsetTelemetry {
        &self.telemetry
    }

    /// Run until cancelled, then silence everything.
    pub fn run(&mut self, cancel: &CancelToken) {
        log::info!(target: "arp", "arpeggiator running");
        loop {
            match self.run_cycle(cancel) {
                CycleOutcome::Played(_) => {}
                CycleOutcome::Idle => {
                    if !self.wait_for_selection(cancel) {
                        break;
                    }
                }
                CycleOutcome::Cancelled => break,
            }
        }
        if let Err(e) = self.selection.emitter().stop_all() {
            log::warn!(target: "arp", "all notes off on stop failed: {}", e);
        }
        log::info!(target: "arp", "arpeggiator stopped");
    }

    /// Play one pass over the current selection.
    pub fn run_cycle(&mut self, cancel: &CancelToken) -> CycleOutcome {
        if cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }
        self.seen_generation = self.selection.generation();
        let notes = self.selection.triad_notes();
        let config = self.config.snapshot();
        let sequence = build_sequence(&notes, &config, &mut self.rng_state);

        let emitter = Arc::clone(self.selection.emitter());
        if sequence.is_empty() {
            self.next_onset = None;
            if let Err(e) = emitter.stop_all() {
                log::warn!(target: "arp", "all notes off failed: {}", e);
            }
            return CycleOutcome::Idle;
        }
        log::trace!(target: "arp", "cycle {:?} at {} bpm", sequence, config.tempo());

        let velocity = self.selection.velocity();
        let mut deadline = self.next_onset.unwrap_or_else(|| self.clock.now());

        for &note in &sequence {
            if cancel.is_cancelled() {
                return CycleOutcome::Cancelled;
            }
            // Tempo and meter may change between notes.
            let interval = self.config.snapshot().note_interval();
            let now = self.clock.now();
            if now > deadline + interval {
                log::debug!(
                    target: "arp",
                    "fell {:?} behind; resyncing",
                    now.saturating_duration_since(deadline)
                );
                deadline = now;
            }

            self.telemetry.record(now.saturating_duration_since(deadline));
            if self.telemetry.due() {
                let s = self.telemetry.take_summary();
                log::debug!(
                    target: "arp",
                    "onset lateness avg={}us max={}us p95={}us late={}",
                    s.avg_us, s.max_us, s.p95_us, s.late
                );
            }

            if let Err(e) = emitter.play(note, velocity) {
                log::warn!(target: "arp", "note on {} failed: {}", note, e);
            }
            deadline += interval;
            let reached = self.wait_until(deadline, cancel);
            if let Err(e) = emitter.stop(note) {
                log::warn!(target: "arp", "note off {} failed: {}", note, e);
            }
            if !reached {
                return CycleOutcome::Cancelled;
            }
        }
        self.next_onset = Some(deadline);
        CycleOutcome::Played(sequence.len())
    }

    /// Wait for `deadline`. Returns false if cancelled first.
    fn wait_until(&self, deadline: Instant, cancel: &CancelToken) -> bool {
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let now = self.clock.now();
            if now >= deadline {
                return true;
            }
            self.clock.pause((deadline - now).min(MAX_PAUSE));
        }
    }

    /// Block until the selection changes. Returns false if cancelled first.
    fn wait_for_selection(&self, cancel: &CancelToken) -> bool {
        while self.selection.generation() == self.seen_generation {
            if cancel.is_cancelled() {
                return false;
            }
            self.clock.pause(IDLE_POLL);
        }
        !cancel.is_cancelled()
    }
}
