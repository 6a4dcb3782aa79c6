//! Event storage for the Spasm event API.
//!
//! [`EventStore`] is the contract the HTTP layer depends on; every method is
//! synchronous and is expected to run inside `tokio::task::spawn_blocking`.
//! [`SqliteEventStore`] implements it on top of the `spasm-db` pool.
//!
//! # Tables
//!
//! | Table | Contents |
//! |-------|----------|
//! | `spasm_events` | one row per event, with the full JSON and indexed columns |
//! | `spasm_event_ids` | every id an event is known under (unique) |
//! | `spasm_event_parents` | parent ids, used for replies, reactions, and trees |
//! | `spasm_event_signers` | lowercase author addresses and signature pubkeys |
//! | `spasm_event_categories` / `spasm_event_keywords` | feed filter columns |
//! | `app_configs` | stored application configuration, newest row wins |

mod error;
mod sqlite;
mod store;

pub use error::StoreError;
pub use sqlite::SqliteEventStore;
pub use store::{EventStore, DEFAULT_FEED_LIMIT, MAX_FEED_LIMIT};

#[cfg(test)]
mod tests;
