//! Process-wide application configuration and per-request feed configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::FeedFilters;

/// Application settings loaded once at startup.
///
/// File defaults are overlaid with the configuration stored in the database
/// (see [`AppConfig::apply_stored`]). After that the value is shared behind an
/// `Arc` and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Whether web3 event ids may be looked up by their short prefix.
    pub enable_short_urls_for_web3_actions: bool,
    /// Exact length a path identifier must have to be treated as a short id.
    pub short_urls_length_of_web3_ids: usize,
    /// Upper bound for the `commentsDepth` query parameter.
    pub max_comments_depth: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enable_short_urls_for_web3_actions: false,
            short_urls_length_of_web3_ids: 20,
            max_comments_depth: 50,
        }
    }
}

impl AppConfig {
    /// Overlays recognized keys from a stored configuration object.
    ///
    /// Unknown keys and values of the wrong shape are ignored. Numbers stored
    /// as strings are accepted. Returns the number of keys applied.
    pub fn apply_stored(&mut self, stored: &Value) -> usize {
        let Some(map) = stored.as_object() else {
            return 0;
        };
        let mut applied = 0;

        if let Some(enabled) = map
            .get("enableShortUrlsForWeb3Actions")
            .and_then(as_bool_like)
        {
            self.enable_short_urls_for_web3_actions = enabled;
            applied += 1;
        }
        if let Some(length) = map.get("shortUrlsLengthOfWeb3Ids").and_then(as_u64_like) {
            self.short_urls_length_of_web3_ids = length as usize;
            applied += 1;
        }

        applied
    }
}

fn as_bool_like(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

fn as_u64_like(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Channel metadata of a syndication feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedChannel {
    pub title: String,
    pub link: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Fully-qualified URL of the request that produced the feed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_uri: Option<String>,
}

/// Input to syndication feed generation.
///
/// A default instance is built at startup; every request clones it and
/// overlays its own filters and URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfig {
    pub channel: FeedChannel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<FeedFilters>,
    /// Base URL that item links are built from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_domain: Option<String>,
}
