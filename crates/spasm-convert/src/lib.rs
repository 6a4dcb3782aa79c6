//! Event conversion for the Spasm event API.
//!
//! Turns submitted wire events into [`SpasmEvent`]s, stored events into the
//! public envelope shapes, and result sets into RSS documents. Also decodes
//! Nostr `note1…` identifiers into their hex form.
//!
//! Everything here is pure: no storage access and no clock reads except
//! where an event carries no timestamp of its own.
//!
//! [`SpasmEvent`]: spasm_types::SpasmEvent

mod envelope;
mod error;
mod event;
mod nostr;
mod rss;

pub use envelope::{convert_many_to_envelopes, convert_to_envelope, convert_to_envelope_with_tree};
pub use error::ConvertError;
pub use event::{convert_to_spasm_event, spasm_id, SPASM_ID_PREFIX};
pub use nostr::{is_note_id, note_to_hex, NOTE_ID_LENGTH};
pub use rss::{generate_rss_feed, RSS_CONTENT_TYPE};
