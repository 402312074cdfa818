//! Rolling window of recent non-silent snapshots.

use std::collections::VecDeque;

use super::{FeatureSnapshot, BAND_COUNT};

/// Snapshots kept for averaging (~170 ms at 60 ticks/s).
pub const HISTORY_CAPACITY: usize = 10;

/// FIFO of at most `HISTORY_CAPACITY` snapshots, oldest evicted first.
///
/// The caller clears it on a zero-energy frame. The analyser's dB floor
/// keeps short pauses above zero, so only a sustained pause resets it.
#[derive(Debug, Clone, Default)]
pub struct FeatureHistory {
    entries: VecDeque<FeatureSnapshot>,
}

impl FeatureHistory {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    pub fn push(&mut self, snapshot: FeatureSnapshot) {
        if self.entries.len() == HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// Mean `volume`, `centroid`, `energy` and `bands` over the stored entries.
    ///
    /// Zero snapshot when empty. `delta_bands` is always zero.
    pub fn averaged(&self) -> FeatureSnapshot {
        let mut avg = FeatureSnapshot::default();
        if self.entries.is_empty() {
            return avg;
        }

        for s in &self.entries {
            avg.volume += s.volume;
            avg.centroid += s.centroid;
            avg.energy += s.energy;
            for i in 0..BAND_COUNT {
                avg.bands[i] += s.bands[i];
            }
        }

        let n = self.entries.len() as f32;
        avg.volume /= n;
        avg.centroid /= n;
        avg.energy /= n;
        avg.bands.iter_mut().for_each(|b| *b /= n);
        avg
    }

    /// Entry `offset` steps back from the newest (0 = newest).
    pub fn previous(&self, offset: usize) -> Option<&FeatureSnapshot> {
        let idx = self.entries.len().checked_sub(offset + 1)?;
        self.entries.get(idx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Oldest → newest.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureSnapshot> {
        self.entries.iter()
    }
}
