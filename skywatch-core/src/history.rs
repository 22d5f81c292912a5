use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use crate::model::{CityId, HistoryEntry};

#[derive(Debug)]
struct Series {
    entries: VecDeque<HistoryEntry>,
    last_append: Option<Instant>,
}

impl Series {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            last_append: None,
        }
    }
}

/// Bounded per-city log of past readings.
///
/// Appends are gated: the first sample for a city always lands, further
/// samples are dropped until `min_gap` has elapsed since the last stored
/// one, no matter how fast the poller runs. A zero `min_gap` disables the
/// gate. When a series grows past `capacity`, the oldest entries are
/// evicted first.
#[derive(Debug)]
pub struct HistoryBuffer {
    capacity: usize,
    min_gap: Duration,
    series: HashMap<CityId, Series>,
}

impl HistoryBuffer {
    pub fn new(capacity: usize, min_gap: Duration) -> Self {
        Self {
            capacity,
            min_gap,
            series: HashMap::new(),
        }
    }

    /// Create an empty series for `id` if none exists. Idempotent: an
    /// existing series keeps its samples.
    pub fn ensure(&mut self, id: CityId) {
        self.series.entry(id).or_insert_with(Series::new);
    }

    /// Append `entry` at `now`, subject to the min-gap gate.
    ///
    /// Returns `true` when the entry was stored. No-op for ids without a
    /// series (`ensure` must have been called first).
    pub fn append(&mut self, id: CityId, entry: HistoryEntry, now: Instant) -> bool {
        let Some(series) = self.series.get_mut(&id) else {
            return false;
        };

        if let Some(last) = series.last_append {
            if !self.min_gap.is_zero() && now.duration_since(last) < self.min_gap {
                return false;
            }
        }

        series.entries.push_back(entry);
        while series.entries.len() > self.capacity {
            series.entries.pop_front();
        }
        series.last_append = Some(now);
        true
    }

    /// Stored samples for `id`, oldest first; empty for unknown ids.
    pub fn entries(&self, id: CityId) -> Vec<HistoryEntry> {
        self.series
            .get(&id)
            .map(|s| s.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, id: CityId) -> usize {
        self.series.get(&id).map_or(0, |s| s.entries.len())
    }

    /// Number of cities with a series, regardless of sample counts.
    pub fn tracked(&self) -> usize {
        self.series.len()
    }

    pub fn remove(&mut self, id: CityId) {
        self.series.remove(&id);
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }
}
