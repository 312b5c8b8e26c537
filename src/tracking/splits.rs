// src/tracking/splits.rs
//! Per-kilometer split aggregation

use super::state::Split;

/// Emits one [`Split`] each time cumulative distance crosses a whole km.
#[derive(Debug, Clone)]
pub struct SplitAggregator {
    next_split_km: u32,
    split_start_sec: u64,
    heart_rate_samples: Vec<f64>,
    splits: Vec<Split>,
}

impl SplitAggregator {
    pub fn new() -> Self {
        Self {
            next_split_km: 1,
            split_start_sec: 0,
            heart_rate_samples: Vec::new(),
            splits: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Record one heart-rate sample for the kilometer in progress
    pub fn record_heart_rate(&mut self, bpm: f64) {
        if bpm.is_finite() && bpm > 0.0 {
            self.heart_rate_samples.push(bpm);
        }
    }

    /// Handle a distance update and return the last milestone crossed.
    ///
    /// Several boundaries crossed by one coarse update each get a split,
    /// all stamped with the same `elapsed_sec`.
    pub fn on_distance(&mut self, previous_km: f64, new_km: f64, elapsed_sec: u64) -> Option<u32> {
        if !new_km.is_finite() || new_km <= previous_km {
            return None;
        }

        let from = previous_km.max(0.0).floor() as u32;
        let to = new_km.floor() as u32;
        let mut milestone = None;

        for k in (from + 1)..=to {
            let avg_heart_rate_bpm = if self.heart_rate_samples.is_empty() {
                None
            } else {
                Some(self.heart_rate_samples.iter().sum::<f64>() / self.heart_rate_samples.len() as f64)
            };

            let split = Split {
                km: self.next_split_km,
                pace_sec: elapsed_sec.saturating_sub(self.split_start_sec).max(1),
                avg_heart_rate_bpm,
            };
            log::info!("Split {} completed in {} s", split.km, split.pace_sec);
            self.splits.push(split);

            self.next_split_km += 1;
            self.split_start_sec = elapsed_sec;
            self.heart_rate_samples.clear();
            milestone = Some(k);
        }

        milestone
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    pub fn next_split_km(&self) -> u32 {
        self.next_split_km
    }
}

impl Default for SplitAggregator {
    fn default() -> Self {
        Self::new()
    }
}
