//! # tonnetz-core
//!
//! Real-time engine for the Tonnetz performance tool: chord and selection
//! state, the note emitter, the arpeggiator and the threads that drive them.
//! Independent of any front end.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tonnetz_core::config::Config;
//! use tonnetz_core::controller::Controller;
//! use tonnetz_core::settings::{self, Settings};
//! use tonnetz_types::ControlCommand;
//!
//! let settings = Settings::load(&settings::default_path().unwrap())?;
//! let mut controller = Controller::new(Config::load(), settings, settings::default_path());
//! controller.start()?;
//! controller.dispatch(ControlCommand::StartArpeggiator)?;
//! ```
//!
//! ## Module Overview
//!
//! - [`controller`]: `Controller::dispatch`, the single entry point for control commands
//! - [`selection`]: `SelectionState`: selected shapes, hold mode, sustained chord output
//! - [`emitter`]: `NoteEmitter` and the refcounted `ActiveNoteSet`
//! - [`arpeggiator`]: sequence building and the deadline-driven engine loop
//! - [`listener`]: input listener (MIDI stream or virtual keyboard)
//! - [`navigator`]: moving the last triad and auto-releasing it
//! - [`supervisor`]: cancel tokens and bounded restart of background threads
//! - [`midi`] / [`transport`]: MIDI wire format, ports and the output sink
//! - [`config`]: TOML configuration (embedded defaults + user override)
//! - [`settings`]: persisted port and display settings (JSON)

pub mod arpeggiator;
pub mod clock;
pub mod config;
pub mod controller;
pub mod emitter;
pub mod keyboard;
pub mod listener;
pub mod midi;
pub mod navigator;
pub mod selection;
pub mod settings;
pub mod supervisor;
pub mod telemetry;
pub mod transport;

pub use controller::Controller;
