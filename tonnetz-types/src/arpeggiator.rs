use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const MIN_TEMPO: u16 = 20;
pub const MAX_TEMPO: u16 = 180;
pub const MIN_OCTAVE_SPAN: u8 = 1;
pub const MAX_OCTAVE_SPAN: u8 = 3;

/// Arpeggiator configuration.
///
/// Plain `Copy` data so the engine can take a whole snapshot per note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArpeggiatorConfig {
    tempo: u16,
    time_signature: TimeSignature,
    octave_span: u8,
    pub order: ArpOrder,
    /// Repeat the lowest note once per cycle when the meter is not ternary.
    pub fill_even_meters: bool,
}

impl Default for ArpeggiatorConfig {
    fn default() -> Self {
        Self {
            tempo: 120,
            time_signature: TimeSignature::FourFour,
            octave_span: 1,
            order: ArpOrder::Up,
            fill_even_meters: false,
        }
    }
}

impl ArpeggiatorConfig {
    pub fn tempo(&self) -> u16 {
        self.tempo
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn octave_span(&self) -> u8 {
        self.octave_span
    }

    /// Clamp to 20..=180 BPM; returns the value actually stored.
    pub fn set_tempo(&mut self, bpm: u16) -> u16 {
        self.tempo = bpm.clamp(MIN_TEMPO, MAX_TEMPO);
        self.tempo
    }

    /// Refuses anything outside the supported set, leaving the config unchanged.
    pub fn set_time_signature(&mut self, beats: u8, unit: u8) -> Result<TimeSignature, String> {
        let ts = TimeSignature::from_parts(beats, unit)
            .ok_or_else(|| format!("Unsupported time signature: {}/{}", beats, unit))?;
        self.time_signature = ts;
        Ok(ts)
    }

    /// Clamp to 1..=3 octaves; returns the value actually stored.
    pub fn set_octave_span(&mut self, span: u8) -> u8 {
        self.octave_span = span.clamp(MIN_OCTAVE_SPAN, MAX_OCTAVE_SPAN);
        self.octave_span
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.tempo as f64
    }

    /// Note-to-note spacing: one beat scaled by beats-per-measure over beat unit.
    ///
    /// 120 BPM in 4/4 gives 0.5s, in 2/4 0.25s, at 30 BPM in 4/4 2.0s.
    pub fn note_interval(&self) -> Duration {
        let (beats, unit) = self.time_signature.parts();
        Duration::from_secs_f64(self.seconds_per_beat() * (beats as f64 / unit as f64))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSignature {
    TwoFour,
    ThreeFour,
    FourFour,
}

impl TimeSignature {
    pub const ALL: [TimeSignature; 3] = [
        TimeSignature::TwoFour,
        TimeSignature::ThreeFour,
        TimeSignature::FourFour,
    ];

    pub fn parts(&self) -> (u8, u8) {
        match self {
            TimeSignature::TwoFour => (2, 4),
            TimeSignature::ThreeFour => (3, 4),
            TimeSignature::FourFour => (4, 4),
        }
    }

    pub fn from_parts(beats: u8, unit: u8) -> Option<TimeSignature> {
        Self::ALL.into_iter().find(|ts| ts.parts() == (beats, unit))
    }

    pub fn beats_per_measure(&self) -> u8 {
        self.parts().0
    }

    pub fn is_ternary(&self) -> bool {
        self.beats_per_measure() % 3 == 0
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimeSignature::TwoFour => "2/4",
            TimeSignature::ThreeFour => "3/4",
            TimeSignature::FourFour => "4/4",
        }
    }

    /// Parse "3/4"-style text.
    pub fn parse(s: &str) -> Option<TimeSignature> {
        let (beats, unit) = s.trim().split_once('/')?;
        Self::from_parts(beats.trim().parse().ok()?, unit.trim().parse().ok()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArpOrder {
    Up,
    Down,
    Random,
}

impl ArpOrder {
    pub fn name(&self) -> &'static str {
        match self {
            ArpOrder::Up => "up",
            ArpOrder::Down => "down",
            ArpOrder::Random => "random",
        }
    }

    pub fn parse(s: &str) -> Option<ArpOrder> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Some(ArpOrder::Up),
            "down" => Some(ArpOrder::Down),
            "random" => Some(ArpOrder::Random),
            _ => None,
        }
    }

    pub fn next(&self) -> ArpOrder {
        match self {
            ArpOrder::Up => ArpOrder::Down,
            ArpOrder::Down => ArpOrder::Random,
            ArpOrder::Random => ArpOrder::Up,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ArpeggiatorConfig::default();
        assert_eq!(config.tempo(), 120);
        assert_eq!(config.time_signature(), TimeSignature::FourFour);
        assert_eq!(config.octave_span(), 1);
        assert_eq!(config.order, ArpOrder::Up);
    }

    #[test]
    fn tempo_is_clamped() {
        let mut config = ArpeggiatorConfig::default();
        assert_eq!(config.set_tempo(10), 20);
        assert_eq!(config.set_tempo(500), 180);
        assert_eq!(config.set_tempo(96), 96);
    }

    #[test]
    fn octave_span_is_clamped() {
        let mut config = ArpeggiatorConfig::default();
        assert_eq!(config.set_octave_span(0), 1);
        assert_eq!(config.set_octave_span(7), 3);
        assert_eq!(config.set_octave_span(2), 2);
    }

    #[test]
    fn unknown_time_signature_is_refused() {
        let mut config = ArpeggiatorConfig::default();
        assert!(config.set_time_signature(7, 8).is_err());
        assert_eq!(config.time_signature(), TimeSignature::FourFour);
        assert_eq!(config.set_time_signature(3, 4), Ok(TimeSignature::ThreeFour));
    }

    #[test]
    fn note_interval_scales_beat_by_meter() {
        let mut config = ArpeggiatorConfig::default();
        assert_eq!(config.note_interval(), Duration::from_millis(500));

        config.set_time_signature(2, 4).unwrap();
        assert_eq!(config.note_interval(), Duration::from_millis(250));

        config.set_time_signature(4, 4).unwrap();
        config.set_tempo(30);
        assert_eq!(config.note_interval(), Duration::from_secs(2));
    }

    #[test]
    fn parse_time_signature() {
        assert_eq!(TimeSignature::parse("3/4"), Some(TimeSignature::ThreeFour));
        assert_eq!(TimeSignature::parse(" 2 / 4 "), Some(TimeSignature::TwoFour));
        assert_eq!(TimeSignature::parse("6/8"), None);
        assert_eq!(TimeSignature::parse("44"), None);
    }

    #[test]
    fn order_cycle() {
        let mut order = ArpOrder::Up;
        for _ in 0..3 {
            order = order.next();
        }
        assert_eq!(order, ArpOrder::Up);
        assert_eq!(ArpOrder::parse("Random"), Some(ArpOrder::Random));
    }
}
