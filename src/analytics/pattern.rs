//! Declarative rules that turn log content into series events.

use crate::models::ParsedLogLine;
use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Stored form of an analytics rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsPatternConfig {
    pub name: String,
    pub pattern: String,
    /// Capture group that must equal the active player name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_index: Option<usize>,
    /// Capture group holding the contributed value; absent means a count of 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_index: Option<usize>,
}

impl AnalyticsPatternConfig {
    pub fn new(name: &str, pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            username_index: None,
            value_index: None,
        }
    }

    pub fn with_username_index(mut self, index: usize) -> Self {
        self.username_index = Some(index);
        self
    }

    pub fn with_value_index(mut self, index: usize) -> Self {
        self.value_index = Some(index);
        self
    }

    /// Compile and check group indices against the expression.
    pub fn compile(&self) -> Result<AnalyticsPattern> {
        if self.name.trim().is_empty() {
            bail!("Analytics pattern name cannot be empty");
        }
        let regex = Regex::new(&self.pattern)
            .with_context(|| format!("Invalid regex for analytics pattern '{}'", self.name))?;

        // captures_len counts the implicit whole-match group 0
        let groups = regex.captures_len() - 1;
        for (label, index) in [
            ("username", self.username_index),
            ("value", self.value_index),
        ] {
            if let Some(index) = index {
                if index == 0 || index > groups {
                    bail!(
                        "Analytics pattern '{}' has {} group index {} but only {} capture groups",
                        self.name,
                        label,
                        index,
                        groups
                    );
                }
            }
        }

        Ok(AnalyticsPattern {
            name: self.name.clone(),
            regex,
            username_index: self.username_index,
            value_index: self.value_index,
        })
    }
}

/// A validated, compiled analytics rule.
#[derive(Debug, Clone)]
pub struct AnalyticsPattern {
    pub name: String,
    pub regex: Regex,
    pub username_index: Option<usize>,
    pub value_index: Option<usize>,
}

/// One contribution destined for a named series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesEvent {
    pub series: String,
    pub timestamp_ms: i64,
    pub value: f64,
}

/// Compile every config, skipping malformed entries with a warning.
pub fn compile_patterns(configs: &[AnalyticsPatternConfig]) -> Vec<AnalyticsPattern> {
    configs
        .iter()
        .filter_map(|config| match config.compile() {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(pattern = %config.name, error = %e, "Skipping invalid analytics pattern");
                None
            }
        })
        .collect()
}

/// Test every pattern against `line`. All matches apply.
pub fn match_line(patterns: &[AnalyticsPattern], line: &ParsedLogLine) -> Vec<SeriesEvent> {
    patterns
        .iter()
        .filter_map(|pattern| match_pattern(pattern, line))
        .collect()
}

fn match_pattern(pattern: &AnalyticsPattern, line: &ParsedLogLine) -> Option<SeriesEvent> {
    let captures = pattern.regex.captures(&line.content)?;

    if let Some(index) = pattern.username_index {
        if captures.get(index)?.as_str() != line.user_name {
            return None;
        }
    }

    let value = match pattern.value_index {
        Some(index) => {
            let raw = captures.get(index)?.as_str();
            match parse_decimal(raw) {
                Some(value) => value,
                None => {
                    debug!(pattern = %pattern.name, raw, "Unparseable analytics value");
                    return None;
                }
            }
        }
        None => 1.0,
    };

    Some(SeriesEvent {
        series: pattern.name.clone(),
        timestamp_ms: line.timestamp_ms,
        value,
    })
}

/// Parse `1,234.50` style numbers.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', "").trim().parse::<f64>().ok()
}

/// Rules shipped with a fresh store: container sales and PVP kills/deaths.
pub fn default_patterns() -> Vec<AnalyticsPatternConfig> {
    let pvp = r"(\w+) was slain by (\w+)";
    vec![
        AnalyticsPatternConfig::new("sold", r"Successfully sold a container worth: \$([,\d]+\.\d+)!")
            .with_value_index(1),
        AnalyticsPatternConfig::new("kills", pvp).with_username_index(2),
        AnalyticsPatternConfig::new("deaths", pvp).with_username_index(1),
    ]
}
