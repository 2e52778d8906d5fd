use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use tonnetz_types::{ArpOrder, ArpeggiatorConfig, ChordPolicy, ChordWindow, Lattice};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    arpeggiator: ArpeggiatorSection,
    #[serde(default)]
    input: InputSection,
    #[serde(default)]
    navigation: NavigationSection,
    #[serde(default)]
    lattice: LatticeSection,
}

#[derive(Deserialize, Default)]
struct ArpeggiatorSection {
    tempo: Option<u16>,
    time_signature: Option<[u8; 2]>,
    octave_span: Option<u8>,
    order: Option<String>,
    fill_even_meters: Option<bool>,
}

#[derive(Deserialize, Default)]
struct InputSection {
    chord_window_ms: Option<u64>,
    chord_policy: Option<String>,
    chord_size: Option<usize>,
    poll_interval_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct NavigationSection {
    release_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct LatticeSection {
    rows: Option<usize>,
    columns: Option<usize>,
}

/// Musical and timing defaults: the embedded `config.toml` with the user's
/// file layered on top.
pub struct Config {
    arpeggiator: ArpeggiatorSection,
    input: InputSection,
    navigation: NavigationSection,
    lattice: LatticeSection,
}

impl Config {
    pub fn load() -> Self {
        let user = user_config_path()
            .filter(|path| path.exists())
            .and_then(|path| match std::fs::read_to_string(&path) {
                Ok(contents) => Some(contents),
                Err(e) => {
                    log::warn!(target: "config", "could not read config {}: {}", path.display(), e);
                    None
                }
            });
        Self::from_user_toml(user.as_deref())
    }

    /// Embedded defaults overridden by `user` when it parses.
    pub fn from_user_toml(user: Option<&str>) -> Self {
        let mut base: ConfigFile = toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
            log::error!(target: "config", "embedded config.toml is invalid: {}", e);
            ConfigFile::default()
        });

        if let Some(contents) = user {
            match toml::from_str::<ConfigFile>(contents) {
                Ok(user) => merge(&mut base, user),
                Err(e) => log::warn!(target: "config", "ignoring malformed user config: {}", e),
            }
        }

        Config {
            arpeggiator: base.arpeggiator,
            input: base.input,
            navigation: base.navigation,
            lattice: base.lattice,
        }
    }

    /// Starting arpeggiator settings, passed through the validated setters.
    pub fn arpeggiator(&self) -> ArpeggiatorConfig {
        let section = &self.arpeggiator;
        let mut config = ArpeggiatorConfig::default();
        if let Some(tempo) = section.tempo {
            config.set_tempo(tempo);
        }
        if let Some([beats, unit]) = section.time_signature {
            if let Err(e) = config.set_time_signature(beats, unit) {
                log::warn!(target: "config", "{}", e);
            }
        }
        if let Some(span) = section.octave_span {
            config.set_octave_span(span);
        }
        if let Some(name) = section.order.as_deref() {
            match ArpOrder::parse(name) {
                Some(order) => config.order = order,
                None => log::warn!(target: "config", "unknown arpeggiator order '{}'", name),
            }
        }
        if let Some(fill) = section.fill_even_meters {
            config.fill_even_meters = fill;
        }
        config
    }

    pub fn chord_policy(&self) -> ChordPolicy {
        let size = self.input.chord_size.unwrap_or(3).max(1);
        match self.input.chord_policy.as_deref() {
            Some("exactly") => ChordPolicy::Exactly(size),
            Some("at_least") | None => ChordPolicy::AtLeast(size),
            Some(other) => {
                log::warn!(target: "config", "unknown chord policy '{}'", other);
                ChordPolicy::AtLeast(size)
            }
        }
    }

    pub fn chord_window(&self) -> ChordWindow {
        let ms = self.input.chord_window_ms.unwrap_or(300).clamp(10, 5_000);
        ChordWindow::new(Duration::from_millis(ms), self.chord_policy())
    }

    /// Sampling period of the virtual keyboard.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.input.poll_interval_ms.unwrap_or(1).clamp(1, 100))
    }

    /// Delay before a triad placed by navigation is released.
    pub fn release_after(&self) -> Duration {
        Duration::from_millis(self.navigation.release_ms.unwrap_or(1500))
    }

    pub fn lattice(&self) -> Lattice {
        Lattice::new(
            self.lattice.rows.unwrap_or(5).clamp(1, 32),
            self.lattice.columns.unwrap_or(14).clamp(1, 64),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_user_toml(None)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tonnetz").join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    let arp = &mut base.arpeggiator;
    if user.arpeggiator.tempo.is_some() {
        arp.tempo = user.arpeggiator.tempo;
    }
    if user.arpeggiator.time_signature.is_some() {
        arp.time_signature = user.arpeggiator.time_signature;
    }
    if user.arpeggiator.octave_span.is_some() {
        arp.octave_span = user.arpeggiator.octave_span;
    }
    if user.arpeggiator.order.is_some() {
        arp.order = user.arpeggiator.order;
    }
    if user.arpeggiator.fill_even_meters.is_some() {
        arp.fill_even_meters = user.arpeggiator.fill_even_meters;
    }

    let input = &mut base.input;
    if user.input.chord_window_ms.is_some() {
        input.chord_window_ms = user.input.chord_window_ms;
    }
    if user.input.chord_policy.is_some() {
        input.chord_policy = user.input.chord_policy;
    }
    if user.input.chord_size.is_some() {
        input.chord_size = user.input.chord_size;
    }
    if user.input.poll_interval_ms.is_some() {
        input.poll_interval_ms = user.input.poll_interval_ms;
    }

    if user.navigation.release_ms.is_some() {
        base.navigation.release_ms = user.navigation.release_ms;
    }
    if user.lattice.rows.is_some() {
        base.lattice.rows = user.lattice.rows;
    }
    if user.lattice.columns.is_some() {
        base.lattice.columns = user.lattice.columns;
    }
}
