//! Pattern matching over parsed log lines and per-session timeseries.

pub mod pattern;
pub mod session;

pub use pattern::{
    compile_patterns, default_patterns, match_line, AnalyticsPattern, AnalyticsPatternConfig,
    SeriesEvent,
};
pub use session::{session_key, Session, SessionStore};
