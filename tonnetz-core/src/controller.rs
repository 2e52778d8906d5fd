//! Controller: owns the engine state and applies control-surface commands.
//!
//! `dispatch` never blocks on musical time. Anything long-running happens on
//! the supervised input, arpeggiator and navigator threads.

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Sender;
use tonnetz_types::{ControlCommand, Lattice};

use crate::arpeggiator::{ArpeggiatorEngine, SharedArpConfig};
use crate::clock::MonotonicClock;
use crate::config::Config;
use crate::emitter::NoteEmitter;
use crate::keyboard::VirtualKeyboard;
use crate::listener::InputListener;
use crate::midi;
use crate::navigator::{NavCommand, Navigator};
use crate::selection::SelectionState;
use crate::settings::Settings;
use crate::supervisor::{Supervisor, TaskKind};
use crate::transport::{is_no_device, MidiOutputSink, NO_DEVICE};

pub struct Controller {
    config: Config,
    settings: Settings,
    settings_path: Option<PathBuf>,
    selection: Arc<SelectionState>,
    keyboard: Arc<VirtualKeyboard>,
    arp_config: SharedArpConfig,
    supervisor: Supervisor,
    nav_tx: Option<Sender<NavCommand>>,
    arp_running: bool,
}

impl Controller {
    /// Build the engine. The output port from `settings` is opened here;
    /// if it cannot be opened the emitter starts simulated.
    pub fn new(config: Config, mut settings: Settings, settings_path: Option<PathBuf>) -> Self {
        let emitter = match open_sink(&settings.port_out) {
            Ok(Some(sink)) => NoteEmitter::with_sink(sink),
            Ok(None) => NoteEmitter::simulated(),
            Err(e) => {
                log::warn!(target: "transport", "{}; using simulated output", e);
                settings.port_out = NO_DEVICE.to_string();
                NoteEmitter::simulated()
            }
        };
        let lattice = Arc::new(config.lattice());
        let selection = Arc::new(SelectionState::new(lattice, Arc::new(emitter)));
        let arp_config = SharedArpConfig::new(config.arpeggiator());

        Self {
            config,
            settings,
            settings_path,
            selection,
            keyboard: Arc::new(VirtualKeyboard::new()),
            arp_config,
            supervisor: Supervisor::new(),
            nav_tx: None,
            arp_running: false,
        }
    }

    /// Start the input listener and the navigator.
    pub fn start(&mut self) -> Result<(), String> {
        self.start_input()?;
        self.start_navigator()
    }

    pub fn selection(&self) -> &Arc<SelectionState> {
        &self.selection
    }

    pub fn emitter(&self) -> &Arc<NoteEmitter> {
        self.selection.emitter()
    }

    pub fn lattice(&self) -> &Arc<Lattice> {
        self.selection.lattice()
    }

    pub fn keyboard(&self) -> &Arc<VirtualKeyboard> {
        &self.keyboard
    }

    pub fn arp_config(&self) -> &SharedArpConfig {
        &self.arp_config
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_arpeggiator_running(&self) -> bool {
        self.arp_running
    }

    pub fn dispatch(&mut self, command: ControlCommand) -> Result<(), String> {
        if command.restarts_task() {
            log::debug!(target: "supervisor", "command {:?} reconfigures a task", command);
        }
        match command {
            ControlCommand::SelectCell(pitch) => self.selection.select_cell(pitch),
            ControlCommand::DeselectCell(pitch) => self.selection.deselect_cell(pitch),
            ControlCommand::SelectTriad(id) => self.selection.select_triad(id)?,
            ControlCommand::ReleaseTriad(id) => self.selection.release_triad(id)?,
            ControlCommand::DeselectTriad(id) => self.selection.deselect_triad(id)?,
            ControlCommand::ClearAll => self.selection.clear_all(),
            ControlCommand::ToggleHold => {
                self.selection.toggle_hold();
            }
            ControlCommand::Navigate(direction) => {
                let tx = self
                    .nav_tx
                    .as_ref()
                    .ok_or_else(|| "Navigator is not running".to_string())?;
                tx.send(NavCommand::Move(direction))
                    .map_err(|_| "Navigator disconnected".to_string())?;
            }

            ControlCommand::SetTempo(bpm) => {
                let stored = self.arp_config.update(|c| c.set_tempo(bpm));
                log::info!(target: "arp", "tempo {}", stored);
            }
            ControlCommand::SetTimeSignature(beats, unit) => {
                let ts = self.arp_config.update(|c| c.set_time_signature(beats, unit))?;
                log::info!(target: "arp", "time signature {}", ts.name());
            }
            ControlCommand::SetOctaveSpan(span) => {
                let stored = self.arp_config.update(|c| c.set_octave_span(span));
                log::info!(target: "arp", "octave span {}", stored);
            }
            ControlCommand::SetOrderMode(order) => {
                self.arp_config.update(|c| c.order = order);
                log::info!(target: "arp", "order {}", order.name());
            }
            ControlCommand::StartArpeggiator => self.start_arpeggiator()?,
            ControlCommand::StopArpeggiator => self.stop_arpeggiator(),

            ControlCommand::SelectInputPort(name) => self.select_input(name)?,
            ControlCommand::SelectOutputPort(name) => self.select_output(name)?,
            ControlCommand::SetSizeFactor(factor) => {
                self.settings.set_size_factor(factor);
                self.save_settings();
            }
            ControlCommand::SetDarkMode(dark) => {
                self.settings.dark_mode = dark;
                self.save_settings();
            }

            ControlCommand::PressKey(pitch, velocity) => self.keyboard.press(pitch, velocity),
            ControlCommand::ReleaseKey(pitch) => self.keyboard.release(pitch),
        }
        Ok(())
    }

    fn start_arpeggiator(&mut self) -> Result<(), String> {
        self.selection.set_sustain(false);
        let selection = Arc::clone(&self.selection);
        let config = self.arp_config.clone();
        self.supervisor.start(TaskKind::Arpeggiator, move |cancel| {
            ArpeggiatorEngine::new(selection, config, MonotonicClock).run(&cancel);
        })?;
        self.arp_running = true;
        Ok(())
    }

    /// Stop the engine, release hold and clear the lattice.
    fn stop_arpeggiator(&mut self) {
        self.supervisor.stop(TaskKind::Arpeggiator);
        self.arp_running = false;
        self.selection.set_hold(false);
        self.selection.clear_all();
        self.selection.set_sustain(true);
    }

    fn start_input(&mut self) -> Result<(), String> {
        let port = self.settings.port_in.clone();
        let selection = Arc::clone(&self.selection);
        let keyboard = Arc::clone(&self.keyboard);
        let window = self.config.chord_window();
        let poll_interval = self.config.poll_interval();

        self.supervisor.start(TaskKind::Input, move |cancel| {
            let mut listener = InputListener::new(selection, window);
            if !is_no_device(&port) {
                let (tx, rx) = crossbeam_channel::unbounded();
                match midi::connect_input(&port, tx) {
                    Ok(connection) => {
                        log::info!(target: "transport", "opened MIDI input {}", port);
                        listener.run_streamed(&rx, &cancel);
                        let _ = connection.close();
                        return;
                    }
                    Err(e) => {
                        log::warn!(target: "transport", "{}; using virtual keyboard", e);
                    }
                }
            }
            listener.run_polled(&keyboard, &cancel, poll_interval);
        })
    }

    fn start_navigator(&mut self) -> Result<(), String> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut navigator = Navigator::new(Arc::clone(&self.selection), self.config.release_after());
        self.supervisor.start(TaskKind::Navigator, move |cancel| {
            navigator.run(&rx, &cancel);
        })?;
        self.nav_tx = Some(tx);
        Ok(())
    }

    /// Switch the input port. A port that is not present falls back to the
    /// virtual keyboard and is not persisted.
    fn select_input(&mut self, name: String) -> Result<(), String> {
        let result = find_input_port(&name);
        match &result {
            Ok(()) => self.settings.port_in = name,
            Err(e) => {
                log::warn!(target: "transport", "{}; using virtual keyboard", e);
                self.settings.port_in = NO_DEVICE.to_string();
            }
        }
        self.save_settings();
        self.start_input()?;
        result
    }

    fn select_output(&mut self, name: String) -> Result<(), String> {
        let result = match open_sink(&name) {
            Ok(sink) => {
                self.emitter().replace_sink(sink);
                self.settings.port_out = name;
                Ok(())
            }
            Err(e) => {
                log::warn!(target: "transport", "{}; using simulated output", e);
                self.emitter().replace_sink(None);
                self.settings.port_out = NO_DEVICE.to_string();
                Err(e)
            }
        };
        self.save_settings();
        result
    }

    fn save_settings(&self) {
        if let Some(path) = &self.settings_path {
            if let Err(e) = self.settings.save(path) {
                log::warn!(target: "config", "settings not saved: {}", e);
            }
        }
    }

    /// Stop every task and silence the output.
    pub fn shutdown(&mut self) {
        self.nav_tx = None;
        self.supervisor.stop_all();
        self.arp_running = false;
        if let Err(e) = self.emitter().stop_all() {
            log::warn!(target: "emitter", "all notes off on shutdown failed: {}", e);
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn find_input_port(port_name: &str) -> Result<(), String> {
    if is_no_device(port_name) {
        return Ok(());
    }
    let ports = midi::list_input_ports()?;
    if ports.iter().any(|p| p.name == port_name) {
        Ok(())
    } else {
        Err(format!("Unable to find input port: {}", port_name))
    }
}

fn open_sink(port_name: &str) -> Result<Option<Box<dyn crate::transport::NoteSink>>, String> {
    if is_no_device(port_name) {
        return Ok(None);
    }
    let sink = MidiOutputSink::open(port_name)?;
    Ok(Some(Box::new(sink)))
}
