//! Single-pass classifier for raw game log lines.

use crate::models::ParsedLogLine;
use crate::timestamp_parser::TimestampParser;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

const CONTENT_DELIMITER: &str = ": ";

fn connecting_to() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Connecting to (\S+),").expect("valid regex"))
}

fn setting_user() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Setting user: (\S+)").expect("valid regex"))
}

/// Player/server identity carried from line to line within one scan cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseContext {
    pub server_name: String,
    pub user_name: String,
    pub scan_cycle: u64,
}

impl ParseContext {
    pub fn new(scan_cycle: u64) -> Self {
        Self {
            scan_cycle,
            ..Default::default()
        }
    }

    /// Forget identity and start a new cycle.
    pub fn reset(&mut self, scan_cycle: u64) {
        self.server_name.clear();
        self.user_name.clear();
        self.scan_cycle = scan_cycle;
    }
}

/// Parse one raw line read from `source`.
///
/// Lines without the `": "` delimiter yield `None`. A line whose timestamp
/// cannot be read is stamped with `now_ms`. Connection and login markers update
/// `context` before the line is tagged, so the marker line itself carries the
/// new identity.
pub fn parse_line(
    context: &mut ParseContext,
    raw: &str,
    source: &Path,
    now_ms: i64,
) -> Option<ParsedLogLine> {
    let line = raw.trim_end_matches(&['\r', '\n'][..]);

    let delimiter = line.find(CONTENT_DELIMITER)?;
    let content = &line[delimiter + CONTENT_DELIMITER.len()..];

    let date = TimestampParser::date_from_filename(source).unwrap_or_else(TimestampParser::today);
    let timestamp_ms = match TimestampParser::parse_line(line, date) {
        Some(ts) => ts,
        None => {
            debug!(source = %source.display(), "No timestamp on log line, using current time");
            now_ms
        }
    };

    if let Some(captures) = connecting_to().captures(content) {
        context.server_name = captures[1].to_string();
    }
    if let Some(captures) = setting_user().captures(content) {
        context.user_name = captures[1].to_string();
    }

    Some(ParsedLogLine {
        user_name: context.user_name.clone(),
        server_name: context.server_name.clone(),
        content: content.to_string(),
        timestamp_ms,
        source: source.to_string_lossy().into_owned(),
    })
}
