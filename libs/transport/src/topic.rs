//! Topic subscription filters
//!
//! **Subscription Patterns**:
//! - **Exact Match**: `"alice"` → only envelopes addressed to `alice`
//! - **Wildcard Prefix**: `"sensors.*"` → `sensors.temp`, `sensors.humidity`, ...
//! - **Global Subscription**: `"*"` → every envelope (monitoring use case)
//!
//! Exact matching is the default so an actor named `alice` never sees traffic
//! for `alice2`.

use cap_config::topics::{WILDCARD_ALL, WILDCARD_SUFFIX};
use std::fmt;

/// Parsed subscription pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicFilter {
    /// Matches every topic
    All,
    /// Matches topics starting with the stored prefix (dot included)
    Prefix(String),
    /// Matches one topic exactly
    Exact(String),
}

impl TopicFilter {
    pub fn parse(pattern: &str) -> Self {
        if pattern == WILDCARD_ALL {
            Self::All
        } else if let Some(stem) = pattern.strip_suffix(WILDCARD_SUFFIX) {
            Self::Prefix(format!("{stem}."))
        } else {
            Self::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, topic: &str) -> bool {
        match self {
            Self::All => true,
            Self::Prefix(prefix) => topic.starts_with(prefix.as_str()),
            Self::Exact(exact) => exact == topic,
        }
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(WILDCARD_ALL),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
            Self::Exact(exact) => f.write_str(exact),
        }
    }
}
