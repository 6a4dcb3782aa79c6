//! Shared types for the Spasm event API.
//!
//! This crate holds the serde representations that cross crate boundaries:
//! stored events and their reply trees, the public envelope shapes produced
//! by conversion, typed feed filters, and process-wide configuration.
//!
//! Nothing here performs I/O. Storage lives in `spasm-store`, conversion in
//! `spasm-convert`, and request handling in `spasm-server`.

use serde::{Deserialize, Serialize};

mod config;
mod filters;

pub use config::{AppConfig, FeedChannel, FeedConfig};
pub use filters::{FeedFilters, FeedFormat, ParseFeedFormatError};

/// `type` tag carried by stored events.
pub const SPASM_EVENT_TYPE: &str = "SpasmEventV2";
/// `type` tag carried by bare envelopes.
pub const SPASM_ENVELOPE_TYPE: &str = "SpasmEventEnvelopeV2";
/// `type` tag carried by envelopes expanded with a reply tree.
pub const SPASM_ENVELOPE_WITH_TREE_TYPE: &str = "SpasmEventEnvelopeWithTreeV2";

fn default_event_type() -> String {
    SPASM_EVENT_TYPE.to_string()
}

/// Name (and optional version) of an identifier, address, or signature format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpasmFormat {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl SpasmFormat {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: None,
        }
    }
}

/// One identifier of an event. An event may be known under several ids
/// (a spasm hash, a Nostr id, a signature).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpasmEventId {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<SpasmFormat>,
}

impl SpasmEventId {
    pub fn new(value: impl Into<String>, format: &str) -> Self {
        Self {
            value: value.into(),
            format: Some(SpasmFormat::named(format)),
        }
    }
}

/// Reference to the event this one replies to or reacts on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpasmParent {
    #[serde(default)]
    pub ids: Vec<SpasmEventId>,
}

/// Where an event originally came from (a forum, an RSS source, a relay).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpasmSource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// A public address (ethereum address, Nostr pubkey) of an author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpasmAddress {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<SpasmFormat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpasmAuthor {
    #[serde(default)]
    pub addresses: Vec<SpasmAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpasmCategory {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpasmSignature {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<SpasmFormat>,
}

/// Number of direct child events carrying a given action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpasmStat {
    pub action: String,
    pub total: i64,
}

/// Storage bookkeeping attached to events read back from the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpasmDbInfo {
    pub key: i64,
    pub added_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpasmProtocol {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// The event in its original wire form (e.g. a signed Nostr event), kept
/// next to the normalized fields so clients can re-verify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpasmSibling {
    pub protocol: SpasmProtocol,
    pub original_object: serde_json::Value,
    #[serde(default)]
    pub ids: Vec<SpasmEventId>,
    #[serde(default)]
    pub signatures: Vec<SpasmSignature>,
}

/// A normalized social event as stored and queried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpasmEvent {
    #[serde(rename = "type", default = "default_event_type")]
    pub kind: String,
    #[serde(default)]
    pub ids: Vec<SpasmEventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Creation time in milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SpasmSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<SpasmParent>,
    #[serde(default)]
    pub authors: Vec<SpasmAuthor>,
    #[serde(default)]
    pub categories: Vec<SpasmCategory>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub signatures: Vec<SpasmSignature>,
    #[serde(default)]
    pub siblings: Vec<SpasmSibling>,
    #[serde(default)]
    pub stats: Vec<SpasmStat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<SpasmDbInfo>,
}

impl Default for SpasmEvent {
    fn default() -> Self {
        Self {
            kind: default_event_type(),
            ids: Vec::new(),
            action: None,
            title: None,
            content: None,
            timestamp: None,
            source: None,
            parent: None,
            authors: Vec::new(),
            categories: Vec::new(),
            keywords: Vec::new(),
            signatures: Vec::new(),
            siblings: Vec::new(),
            stats: Vec::new(),
            db: None,
        }
    }
}

impl SpasmEvent {
    /// The first id, used for links and storage-level identity.
    pub fn primary_id(&self) -> Option<&str> {
        self.ids.first().map(|id| id.value.as_str())
    }

    pub fn id_values(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(|id| id.value.as_str())
    }

    pub fn parent_id_values(&self) -> impl Iterator<Item = &str> {
        self.parent
            .iter()
            .flat_map(|p| p.ids.iter().map(|id| id.value.as_str()))
    }

    /// Every author address plus every signature pubkey.
    pub fn signer_values(&self) -> Vec<&str> {
        let mut signers: Vec<&str> = self
            .authors
            .iter()
            .flat_map(|a| a.addresses.iter().map(|addr| addr.value.as_str()))
            .collect();
        for sig in &self.signatures {
            if let Some(pubkey) = sig.pubkey.as_deref() {
                if !signers.contains(&pubkey) {
                    signers.push(pubkey);
                }
            }
        }
        signers
    }

    /// `web3` events carry at least one signature; everything else is `web2`.
    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }
}

/// An event together with its replies, expanded down to a bounded depth.
#[derive(Debug, Clone, PartialEq)]
pub struct SpasmEventNode {
    pub event: SpasmEvent,
    /// Distance from the root of the tree (the root is 0).
    pub depth: u32,
    pub children: Vec<SpasmEventNode>,
}

impl SpasmEventNode {
    pub fn leaf(event: SpasmEvent, depth: u32) -> Self {
        Self {
            event,
            depth,
            children: Vec::new(),
        }
    }
}

/// Public representation of a stored event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpasmEventEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub ids: Vec<SpasmEventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<SpasmDbInfo>,
    pub siblings: Vec<SpasmSibling>,
    #[serde(default)]
    pub stats: Vec<SpasmStat>,
}

/// An envelope plus its nested replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpasmEventEnvelopeWithTree {
    #[serde(rename = "type")]
    pub kind: String,
    pub ids: Vec<SpasmEventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<SpasmDbInfo>,
    pub siblings: Vec<SpasmSibling>,
    #[serde(default)]
    pub stats: Vec<SpasmStat>,
    pub depth: u32,
    #[serde(default)]
    pub children: Vec<SpasmEventEnvelopeWithTree>,
}

/// Result of submitting an event to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// The event was stored under `id`.
    Saved { id: String },
    /// An event with one of the submitted ids already exists.
    Duplicate { id: String },
}
