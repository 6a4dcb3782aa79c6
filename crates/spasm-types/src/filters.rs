//! Typed feed filters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Filters accepted by the feed endpoint.
///
/// Every field is optional; `None` means "not applied". Fields that accept
/// repetition on the query string are modeled as sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedFilters {
    pub format: Option<String>,
    pub web_type: Option<String>,
    pub signer: Option<BTreeSet<String>>,
    pub parent_id: Option<BTreeSet<String>>,
    pub action: Option<BTreeSet<String>>,
    pub category: Option<BTreeSet<String>>,
    pub source: Option<String>,
    pub activity: Option<String>,
    pub keyword: Option<BTreeSet<String>>,
    pub limit: Option<String>,
}

impl FeedFilters {
    /// Parsed output format. Unknown or absent formats fall back to
    /// [`FeedFormat::Spasm`].
    pub fn feed_format(&self) -> FeedFormat {
        self.format
            .as_deref()
            .and_then(|f| f.parse().ok())
            .unwrap_or(FeedFormat::Spasm)
    }

    /// The requested limit as a number, if it parses as one.
    pub fn limit_count(&self) -> Option<i64> {
        self.limit.as_deref().and_then(|l| l.trim().parse().ok())
    }
}

/// Output format of the feed endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    /// JSON array of envelopes.
    Spasm,
    /// RSS syndication document.
    Rss,
}

impl FeedFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spasm => "spasm",
            Self::Rss => "rss",
        }
    }
}

impl std::fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FeedFormat {
    type Err = ParseFeedFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spasm" => Ok(Self::Spasm),
            "rss" => Ok(Self::Rss),
            _ => Err(ParseFeedFormatError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown feed format.
#[derive(Debug, Clone, Error)]
#[error("unknown feed format: {0}")]
pub struct ParseFeedFormatError(pub String);
