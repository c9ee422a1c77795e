//! Game log ingestion: discovery, parsing and live tailing.

pub mod discovery;
pub mod parser;
pub mod tailer;

pub use discovery::LogDiscovery;
pub use parser::{parse_line, ParseContext};
pub use tailer::{channel_sink, GameLogWatcher, LineSink, TailerOptions, WatchHandle};
