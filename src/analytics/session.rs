use crate::analytics::pattern::{match_line, AnalyticsPattern};
use crate::models::{ParsedLogLine, SeriesSample};
use crate::timeseries::TimeSeries;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Key of the session a line belongs to.
pub fn session_key(user_name: &str, server_name: &str) -> String {
    format!("{user_name}@{server_name}")
}

/// Analytics for one player on one server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_name: String,
    pub server_name: String,
    /// Log files that contributed lines, in first-seen order
    pub gamelogs: Vec<String>,
    pub series: BTreeMap<String, TimeSeries>,
}

impl Session {
    fn new(user_name: &str, server_name: &str) -> Self {
        Self {
            user_name: user_name.to_string(),
            server_name: server_name.to_string(),
            gamelogs: Vec::new(),
            series: BTreeMap::new(),
        }
    }

    fn has_identity(&self) -> bool {
        !self.user_name.is_empty() && !self.server_name.is_empty()
    }

    fn has_data(&self) -> bool {
        self.series.values().any(TimeSeries::has_data)
    }

    fn record_source(&mut self, source: &str) -> bool {
        if self.gamelogs.iter().any(|seen| seen == source) {
            return false;
        }
        self.gamelogs.push(source.to_string());
        true
    }
}

/// All sessions observed so far, keyed by `user@server`.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: BTreeMap<String, Session>,
    duration_ms: i64,
    samples: usize,
}

impl SessionStore {
    pub fn new(duration_ms: i64, samples: usize) -> Self {
        Self {
            sessions: BTreeMap::new(),
            duration_ms,
            samples,
        }
    }

    /// Fold a batch of lines into their sessions.
    ///
    /// Returns `true` when anything observable changed.
    pub fn apply(&mut self, patterns: &[AnalyticsPattern], lines: &[ParsedLogLine]) -> bool {
        let mut changed = false;

        for line in lines {
            let session = self
                .sessions
                .entry(session_key(&line.user_name, &line.server_name))
                .or_insert_with(|| Session::new(&line.user_name, &line.server_name));
            changed |= session.record_source(&line.source);

            for event in match_line(patterns, line) {
                let (duration_ms, samples) = (self.duration_ms, self.samples);
                let series = session
                    .series
                    .entry(event.series)
                    .or_insert_with(|| TimeSeries::new(duration_ms, samples));
                changed |= series.add_samples(&[SeriesSample::new(event.timestamp_ms, event.value)], None);
            }
        }

        changed |= self.prune();
        changed
    }

    /// Slide every series forward to `now_ms` so idle windows keep moving.
    pub fn keep_alive(&mut self, now_ms: i64) -> bool {
        let mut changed = false;
        for series in self.sessions.values_mut().flat_map(|s| s.series.values_mut()) {
            changed |= series.add_samples(&[SeriesSample::new(now_ms, 0.0)], Some(now_ms));
        }
        changed
    }

    /// Drop placeholder sessions that have neither an identity nor data.
    fn prune(&mut self) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|key, session| {
            let keep = session.has_identity() || session.has_data();
            if !keep {
                debug!(session = %key, "Pruning placeholder session");
            }
            keep
        });
        before != self.sessions.len()
    }

    pub fn get(&self, key: &str) -> Option<&Session> {
        self.sessions.get(key)
    }

    pub fn sessions(&self) -> impl Iterator<Item = (&String, &Session)> {
        self.sessions.iter()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Serializable copy of every session.
    pub fn snapshot(&self) -> BTreeMap<String, Session> {
        self.sessions.clone()
    }
}
