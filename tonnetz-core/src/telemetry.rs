//! Onset timing telemetry for the arpeggiator.
//!
//! Lateness of each note onset against its scheduled deadline goes into a
//! fixed-size ring buffer; recording never allocates.

use std::time::Duration;

const ONSET_BUFFER_SIZE: usize = 128;

/// Onsets between two summary log lines.
pub const REPORT_EVERY: u64 = 64;

/// Onsets later than this count as misses.
pub const LATE_TOLERANCE: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OnsetSummary {
    pub avg_us: u32,
    pub max_us: u32,
    pub p95_us: u32,
    /// Cumulative count of onsets past `LATE_TOLERANCE`.
    pub late: u64,
}

pub struct OnsetTelemetry {
    lateness_us: [u32; ONSET_BUFFER_SIZE],
    idx: usize,
    samples: usize,
    max_us: u32,
    late: u64,
    total: u64,
}

impl Default for OnsetTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl OnsetTelemetry {
    pub fn new() -> Self {
        Self {
            lateness_us: [0; ONSET_BUFFER_SIZE],
            idx: 0,
            samples: 0,
            max_us: 0,
            late: 0,
            total: 0,
        }
    }

    /// Record how far past its deadline an onset fired.
    #[inline]
    pub fn record(&mut self, lateness: Duration) {
        let us = lateness.as_micros().min(u32::MAX as u128) as u32;
        self.lateness_us[self.idx] = us;
        self.idx = (self.idx + 1) % ONSET_BUFFER_SIZE;
        self.samples = (self.samples + 1).min(ONSET_BUFFER_SIZE);
        self.max_us = self.max_us.max(us);
        if lateness > LATE_TOLERANCE {
            self.late += 1;
        }
        self.total += 1;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// True right after every `REPORT_EVERY`-th onset.
    pub fn due(&self) -> bool {
        self.total > 0 && self.total % REPORT_EVERY == 0
    }

    /// Summarize the buffered window and reset its max.
    pub fn take_summary(&mut self) -> OnsetSummary {
        if self.samples == 0 {
            return OnsetSummary::default();
        }
        let window = &self.lateness_us[..self.samples];
        let sum: u64 = window.iter().map(|&us| us as u64).sum();

        let mut sorted = self.lateness_us;
        sorted[..self.samples].sort_unstable();
        let p95_idx = (self.samples * 95 / 100).max(1) - 1;

        let summary = OnsetSummary {
            avg_us: (sum / self.samples as u64) as u32,
            max_us: self.max_us,
            p95_us: sorted[p95_idx.min(self.samples - 1)],
            late: self.late,
        };
        self.max_us = 0;
        summary
    }
}
