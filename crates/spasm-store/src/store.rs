//! The storage contract.

use serde_json::Value;
use spasm_types::{FeedFilters, SpasmEvent, SpasmEventNode, SubmitOutcome};

use crate::error::StoreError;

/// Feed size used when the filters carry no usable limit.
pub const DEFAULT_FEED_LIMIT: i64 = 100;
/// Upper bound on the feed size, whatever the filters ask for.
pub const MAX_FEED_LIMIT: i64 = 1000;

/// Storage operations the HTTP layer needs.
///
/// Implementations own their connection handling. Callers treat each method
/// as one opaque blocking operation and issue no retries.
pub trait EventStore: Send + Sync {
    /// Events matching `filters`, newest first unless an activity ordering
    /// is requested.
    fn fetch_events_by_filter(&self, filters: &FeedFilters) -> Result<Vec<SpasmEvent>, StoreError>;

    /// The event known under exactly `id`.
    fn fetch_event_by_id(&self, id: &str) -> Result<Option<SpasmEvent>, StoreError>;

    /// The first event with an id starting with `short_id`.
    fn fetch_event_by_short_id(&self, short_id: &str) -> Result<Option<SpasmEvent>, StoreError>;

    /// Expands `event` with its replies, down to `max_depth` levels below it.
    fn build_tree_down(
        &self,
        event: SpasmEvent,
        max_depth: u32,
    ) -> Result<SpasmEventNode, StoreError>;

    /// Every stored id starting with `short_id`.
    fn fetch_full_ids_from_short_id(&self, short_id: &str) -> Result<Vec<String>, StoreError>;

    /// Stores a converted event.
    fn submit_event(&self, event: SpasmEvent) -> Result<SubmitOutcome, StoreError>;

    /// The most recently stored application configuration, as stored.
    fn fetch_app_config(&self) -> Result<Option<Value>, StoreError>;
}
