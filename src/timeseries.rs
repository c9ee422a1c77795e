//! Fixed-width sliding window of time-bucketed sums.
//!
//! A [`TimeSeries`] holds at most `samples` contiguous buckets of `duration_ms`
//! each. Bucket anchors are multiples of the duration relative to the epoch and
//! the window always ends at the bucket containing the reference time used for
//! the most recent advance. Samples older than the window are dropped silently.

use crate::models::SeriesSample;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub time_anchor_ms: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "SeriesRecord")]
pub struct TimeSeries {
    duration_ms: i64,
    samples: usize,
    pub buckets: Vec<Bucket>,
}

/// Unchecked wire form of a [`TimeSeries`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeriesRecord {
    duration_ms: i64,
    samples: usize,
    #[serde(default)]
    buckets: Vec<Bucket>,
}

impl TryFrom<SeriesRecord> for TimeSeries {
    type Error = String;

    fn try_from(record: SeriesRecord) -> Result<Self, Self::Error> {
        if record.duration_ms <= 0 {
            return Err(format!("durationMs must be positive, got {}", record.duration_ms));
        }
        if record.samples == 0 {
            return Err("samples must be at least 1".to_string());
        }
        if record.buckets.len() > record.samples {
            return Err(format!(
                "{} buckets exceed the window of {} samples",
                record.buckets.len(),
                record.samples
            ));
        }
        let contiguous = record.buckets.windows(2).all(|pair| {
            pair[0].time_anchor_ms.checked_add(record.duration_ms) == Some(pair[1].time_anchor_ms)
        });
        if !contiguous {
            return Err("bucket anchors must be contiguous".to_string());
        }
        Ok(Self {
            duration_ms: record.duration_ms,
            samples: record.samples,
            buckets: record.buckets,
        })
    }
}

impl TimeSeries {
    /// Creates an empty series. Zero durations or sample counts are clamped to 1.
    pub fn new(duration_ms: i64, samples: usize) -> Self {
        Self {
            duration_ms: duration_ms.max(1),
            samples: samples.max(1),
            buckets: Vec::with_capacity(samples.max(1)),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Anchor of the bucket containing `time_ms`.
    pub fn anchor_for(&self, time_ms: i64) -> i64 {
        time_ms.div_euclid(self.duration_ms).saturating_mul(self.duration_ms)
    }

    /// Slides the window and folds `events` into it.
    ///
    /// The window is advanced to `reference_now`, or to the latest event time
    /// when no reference is given. Returns `true` if any bucket was dropped,
    /// appended or incremented.
    #[must_use = "callers use the change flag to skip redundant refreshes"]
    pub fn add_samples(&mut self, events: &[SeriesSample], reference_now: Option<i64>) -> bool {
        let now = match reference_now.or_else(|| events.iter().map(|e| e.time_ms).max()) {
            Some(now) => now,
            None => return false,
        };

        let mut changed = self.advance(now);
        for event in events {
            changed |= self.accumulate(event);
        }
        changed
    }

    /// Moves the window so it ends at the bucket containing `now`.
    ///
    /// Calling this twice with the same `now` changes nothing the second time.
    pub fn advance(&mut self, now: i64) -> bool {
        let last_anchor = self.anchor_for(now);
        let span = i64::try_from(self.samples - 1)
            .unwrap_or(i64::MAX)
            .saturating_mul(self.duration_ms);
        let first_anchor = last_anchor.saturating_sub(span);
        let mut changed = false;

        let stale = self
            .buckets
            .iter()
            .take_while(|bucket| bucket.time_anchor_ms < first_anchor)
            .count();
        if stale > 0 {
            self.buckets.drain(..stale);
            changed = true;
        }

        if self.buckets.is_empty() {
            self.buckets.push(Bucket {
                time_anchor_ms: first_anchor,
                value: 0.0,
            });
            changed = true;
        }

        while self.buckets.len() < self.samples {
            let next = self.buckets[self.buckets.len() - 1]
                .time_anchor_ms
                .saturating_add(self.duration_ms);
            self.buckets.push(Bucket {
                time_anchor_ms: next,
                value: 0.0,
            });
            changed = true;
        }

        changed
    }

    fn accumulate(&mut self, event: &SeriesSample) -> bool {
        let (Some(first), Some(last)) = (self.buckets.first(), self.buckets.last()) else {
            return false;
        };
        let first_anchor = first.time_anchor_ms;
        let end = last.time_anchor_ms.saturating_add(self.duration_ms);
        if event.time_ms < first_anchor || event.time_ms >= end {
            return false;
        }
        if event.value == 0.0 {
            return false;
        }

        let index = (event.time_ms.saturating_sub(first_anchor) / self.duration_ms) as usize;
        match self.buckets.get_mut(index) {
            Some(bucket) => {
                bucket.value += event.value;
                true
            }
            None => false,
        }
    }

    /// True if any bucket holds a non-zero value.
    pub fn has_data(&self) -> bool {
        self.buckets.iter().any(|bucket| bucket.value != 0.0)
    }

    /// Sum of all buckets in the window.
    pub fn total(&self) -> f64 {
        self.buckets.iter().map(|bucket| bucket.value).sum()
    }

    /// Average per minute across the whole window span.
    pub fn rate_per_minute(&self) -> f64 {
        let span_ms = self.duration_ms as f64 * self.samples as f64;
        self.total() * 60_000.0 / span_ms
    }
}
