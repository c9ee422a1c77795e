use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use std::path::Path;

/// Handles parsing the bracketed timestamps that prefix game log lines
pub struct TimestampParser;

impl TimestampParser {
    /// Parse the leading timestamp of a log line into epoch milliseconds.
    ///
    /// Vanilla clients write `[HH:MM:SS]`, which is placed on `date`. Lunar
    /// Client writes `[YYYY-MM-DD HH:MM:SS.mmm]`, which carries its own date.
    /// Both are read as local time.
    pub fn parse_line(line: &str, date: NaiveDate) -> Option<i64> {
        let inner = Self::bracketed_prefix(line)?;

        if inner.len() == 8 {
            if let Ok(time) = NaiveTime::parse_from_str(inner, "%H:%M:%S") {
                return Self::local_to_millis(date.and_time(time));
            }
        }

        if inner.len() == 23 {
            if let Ok(naive) = NaiveDateTime::parse_from_str(inner, "%Y-%m-%d %H:%M:%S%.3f") {
                return Self::local_to_millis(naive);
            }
        }

        None
    }

    /// Extract the date embedded in rotated log names such as `2024-05-01-3.log.gz`.
    pub fn date_from_filename(path: &Path) -> Option<NaiveDate> {
        let name = path.file_name()?.to_str()?;
        let candidate = name.get(..10)?;
        if name.as_bytes().get(10) != Some(&b'-') {
            return None;
        }
        NaiveDate::parse_from_str(candidate, "%Y-%m-%d").ok()
    }

    /// Today's date in the local timezone.
    pub fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    fn bracketed_prefix(line: &str) -> Option<&str> {
        let rest = line.strip_prefix('[')?;
        let end = rest.find(']')?;
        Some(&rest[..end])
    }

    fn local_to_millis(naive: NaiveDateTime) -> Option<i64> {
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp_millis())
    }
}
