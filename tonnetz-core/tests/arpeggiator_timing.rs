mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Harness, Msg, TimedSink, C_MAJOR};
use tonnetz_core::arpeggiator::{ArpeggiatorEngine, CycleOutcome};
use tonnetz_core::clock::{Clock, ManualClock, MonotonicClock};
use tonnetz_core::emitter::NoteEmitter;
use tonnetz_core::selection::SelectionState;
use tonnetz_core::supervisor::{CancelToken, TaskHandle, TaskKind, JOIN_TIMEOUT};
use tonnetz_types::{ArpOrder, ArpeggiatorConfig, Lattice};

fn config(tempo: u16, order: ArpOrder) -> ArpeggiatorConfig {
    let mut config = ArpeggiatorConfig::default();
    config.set_tempo(tempo);
    config.order = order;
    config
}

#[test]
fn test_c_major_up_plays_two_second_steps() {
    // 30 BPM in 4/4: one beat of 2.0s between onsets.
    let h = Harness::new(config(30, ArpOrder::Up));
    h.select(&C_MAJOR);
    let mut engine = h.engine();
    let cancel = CancelToken::new();
    let start = h.clock.now();

    assert_eq!(engine.run_cycle(&cancel), CycleOutcome::Played(3));
    assert_eq!(engine.run_cycle(&cancel), CycleOutcome::Played(3));

    let cycle = [
        Msg::On(60),
        Msg::Off(60),
        Msg::On(64),
        Msg::Off(64),
        Msg::On(67),
        Msg::Off(67),
    ];
    let expected: Vec<Msg> = cycle.iter().chain(cycle.iter()).copied().collect();
    assert_eq!(h.sink.messages(), expected);

    for (i, (at, msg)) in h.sink.entries().into_iter().enumerate() {
        let step = ((i + 1) / 2) as u32;
        assert_eq!(at - start, Duration::from_secs(2) * step, "{:?} at index {}", msg, i);
    }
}

#[test]
fn test_onset_drift_stays_within_one_tick() {
    let tick = Duration::from_micros(300);
    let h = Harness::with_oversleep(config(120, ArpOrder::Up), tick);
    h.select(&C_MAJOR);
    let mut engine = h.engine();
    let cancel = CancelToken::new();
    let interval = h.config.snapshot().note_interval();
    assert_eq!(interval, Duration::from_millis(500));
    let start = h.clock.now();

    while h.sink.onsets().len() < 100 {
        assert!(matches!(engine.run_cycle(&cancel), CycleOutcome::Played(3)));
    }

    for (k, (at, _note)) in h.sink.onsets().into_iter().enumerate() {
        let scheduled = start + interval * k as u32;
        let drift = at.saturating_duration_since(scheduled);
        assert!(at >= scheduled, "onset {} fired early", k);
        assert!(drift <= tick, "onset {} drifted {:?}", k, drift);
    }
    assert!(engine.telemetry().total() >= 100);
}

#[test]
fn test_empty_selection_only_silences() {
    let h = Harness::new(ArpeggiatorConfig::default());
    let mut engine = h.engine();
    let start = h.clock.now();

    assert_eq!(engine.run_cycle(&CancelToken::new()), CycleOutcome::Idle);
    assert_eq!(h.sink.messages(), vec![Msg::Silence]);
    assert_eq!(h.clock.now(), start);
}

#[test]
fn test_cells_alone_do_not_feed_the_arpeggiator() {
    let h = Harness::new(ArpeggiatorConfig::default());
    h.selection.select_cell(tonnetz_types::PitchClass::D);
    let mut engine = h.engine();
    assert_eq!(engine.run_cycle(&CancelToken::new()), CycleOutcome::Idle);
    assert!(!h.sink.messages().iter().any(|m| matches!(m, Msg::On(_))));
}

#[test]
fn test_down_order_is_non_increasing_each_cycle() {
    let mut cfg = config(180, ArpOrder::Down);
    cfg.set_octave_span(2);
    let h = Harness::new(cfg);
    h.select(&C_MAJOR);
    let mut engine = h.engine();
    let cancel = CancelToken::new();

    for _ in 0..3 {
        h.sink.clear();
        engine.run_cycle(&cancel);
        let notes: Vec<u8> = h.sink.onsets().into_iter().map(|(_, n)| n).collect();
        assert_eq!(notes, vec![79, 76, 72, 67, 64, 60]);
    }
}

#[test]
fn test_random_order_permutes_each_cycle() {
    let h = Harness::new(config(180, ArpOrder::Random));
    h.select(&C_MAJOR);
    let mut engine = h.engine();
    let cancel = CancelToken::new();

    for _ in 0..10 {
        h.sink.clear();
        engine.run_cycle(&cancel);
        let mut notes: Vec<u8> = h.sink.onsets().into_iter().map(|(_, n)| n).collect();
        notes.sort_unstable();
        assert_eq!(notes, vec![60, 64, 67]);
    }
}

#[test]
fn test_tempo_change_applies_to_next_note() {
    let h = Harness::new(config(30, ArpOrder::Up));
    h.select(&C_MAJOR);
    let mut engine = h.engine();
    let cancel = CancelToken::new();

    engine.run_cycle(&cancel);
    h.config.update(|c| c.set_tempo(60));
    h.sink.clear();
    engine.run_cycle(&cancel);

    let onsets = h.sink.onsets();
    assert_eq!(onsets[1].0 - onsets[0].0, Duration::from_secs(1));
    assert_eq!(onsets[2].0 - onsets[1].0, Duration::from_secs(1));
}

#[test]
fn test_cancel_silences_running_engine() {
    let sink = TimedSink::new(ManualClock::new());
    let emitter = Arc::new(NoteEmitter::with_sink(Box::new(sink.clone())));
    let selection = Arc::new(SelectionState::new(Arc::new(Lattice::default()), emitter));
    selection.set_sustain(false);
    let id = common::triad_with(selection.lattice(), &C_MAJOR);
    selection.select_triad(id).unwrap();

    let shared = tonnetz_core::arpeggiator::SharedArpConfig::new(config(180, ArpOrder::Up));
    let engine_selection = Arc::clone(&selection);
    let handle = TaskHandle::spawn(TaskKind::Arpeggiator, move |cancel| {
        ArpeggiatorEngine::new(engine_selection, shared, MonotonicClock).run(&cancel);
    })
    .unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while !sink.messages().contains(&Msg::On(60)) && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(handle.stop(JOIN_TIMEOUT));

    assert_eq!(sink.messages().last(), Some(&Msg::Silence));
    assert!(selection.emitter().sounding().is_empty());
}
