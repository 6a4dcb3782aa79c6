//! Query-string normalization for the feed endpoint.
//!
//! Clients send filters as loosely typed query parameters: a key may be
//! missing, empty, repeated, or carry the literal string `"false"` to mean
//! "not set". [`normalize_filters`] turns that into a [`FeedFilters`] value
//! where every field is either a usable value or `None`.

use spasm_types::FeedFilters;
use std::collections::BTreeSet;

/// Literal value clients send to mean "this filter is not set".
pub const ABSENT_SENTINEL: &str = "false";

/// Limit applied when the query carries none of the recognized keys.
pub const BARE_FEED_LIMIT: &str = "25";

/// Query keys the feed endpoint understands.
pub const RECOGNIZED_KEYS: [&str; 10] = [
    "format", "webType", "signer", "parentId", "action", "category", "source", "activity",
    "keyword", "limit",
];

/// Query parameters in arrival order, repetition preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuery {
    pairs: Vec<(String, String)>,
}

impl From<Vec<(String, String)>> for RawQuery {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }
}

impl RawQuery {
    /// Every value supplied for `key`, in order.
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The value for `key` when it was supplied exactly once.
    pub fn single<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        let mut values = self.values(key);
        let first = values.next()?;
        values.next().is_none().then_some(first)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }
}

fn is_absent(value: &str) -> bool {
    value.is_empty() || value == ABSENT_SENTINEL
}

/// A filter field type that can be built from the raw values of one key.
trait FilterValue: Sized {
    fn from_values(values: &[&str]) -> Option<Self>;
}

impl FilterValue for String {
    /// Single-valued fields keep the first usable value.
    fn from_values(values: &[&str]) -> Option<Self> {
        values
            .iter()
            .find(|v| !is_absent(v))
            .map(|v| (*v).to_string())
    }
}

impl FilterValue for BTreeSet<String> {
    /// Repeated values are kept verbatim.
    fn from_values(values: &[&str]) -> Option<Self> {
        Some(values.iter().map(|v| (*v).to_string()).collect())
    }
}

/// Applies the absence policy to `key` and builds the field.
fn field<T: FilterValue>(raw: &RawQuery, key: &str) -> Option<T> {
    let values: Vec<&str> = raw.values(key).collect();
    match values.as_slice() {
        [] => None,
        [only] if is_absent(only) => None,
        many => T::from_values(many),
    }
}

/// Builds typed feed filters from raw query parameters.
///
/// A field is absent when its key is missing, empty, or equal to `"false"`.
/// When none of [`RECOGNIZED_KEYS`] appear at all, the limit defaults to
/// [`BARE_FEED_LIMIT`].
pub fn normalize_filters(raw: &RawQuery) -> FeedFilters {
    let mut filters = FeedFilters {
        format: field(raw, "format"),
        web_type: field(raw, "webType"),
        signer: field(raw, "signer"),
        parent_id: field(raw, "parentId"),
        action: field(raw, "action"),
        category: field(raw, "category"),
        source: field(raw, "source"),
        activity: field(raw, "activity"),
        keyword: field(raw, "keyword"),
        limit: field(raw, "limit"),
    };

    if !RECOGNIZED_KEYS.iter().any(|key| raw.contains(key)) {
        filters.limit = Some(BARE_FEED_LIMIT.to_string());
    }

    filters
}
