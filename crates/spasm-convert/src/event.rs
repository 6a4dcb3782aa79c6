//! Conversion of submitted wire events into [`SpasmEvent`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use spasm_types::{
    SpasmAddress, SpasmAuthor, SpasmEvent, SpasmEventId, SpasmFormat, SpasmParent,
    SpasmProtocol, SpasmSibling, SpasmSignature, SPASM_EVENT_TYPE,
};

/// Prefix of content-hash identifiers.
pub const SPASM_ID_PREFIX: &str = "spasmid01";

const NOSTR_KIND_TEXT_NOTE: u32 = 1;
const NOSTR_KIND_REACTION: u32 = 7;

#[derive(Debug, Deserialize)]
struct NostrEvent {
    id: String,
    pubkey: String,
    created_at: i64,
    kind: u32,
    #[serde(default)]
    tags: Vec<Vec<String>>,
    #[serde(default)]
    content: String,
    sig: String,
}

/// Converts a submitted event of unknown shape.
///
/// Recognized shapes are signed Nostr events (kind 1 notes and replies,
/// kind 7 reactions) and objects already tagged `"type": "SpasmEventV2"`.
/// Storage fields (`db`, `stats`) on submitted Spasm events are dropped.
/// The result always carries a `spasmid01…` content hash as its first id.
pub fn convert_to_spasm_event(unknown: &Value) -> Option<SpasmEvent> {
    let object = unknown.as_object()?;

    let mut event = if object.get("type").and_then(Value::as_str) == Some(SPASM_EVENT_TYPE) {
        let mut event: SpasmEvent = serde_json::from_value(unknown.clone())
            .map_err(|e| tracing::debug!(error = %e, "spasm-shaped event failed to parse"))
            .ok()?;
        event.db = None;
        event.stats.clear();
        event
    } else if ["pubkey", "sig", "kind"].iter().all(|k| object.contains_key(*k)) {
        let nostr: NostrEvent = serde_json::from_value(unknown.clone())
            .map_err(|e| tracing::debug!(error = %e, "nostr-shaped event failed to parse"))
            .ok()?;
        from_nostr(nostr, unknown.clone())?
    } else {
        return None;
    };

    let hash = spasm_id(&event);
    event.ids.retain(|id| !id.value.starts_with(SPASM_ID_PREFIX));
    event.ids.insert(0, SpasmEventId::new(hash, "spasmid"));

    if event.content.as_deref().unwrap_or_default().is_empty() && event.title.is_none() {
        // reactions are allowed to be empty, everything else needs a body
        if event.action.as_deref() != Some("react") {
            return None;
        }
    }

    Some(event)
}

fn from_nostr(nostr: NostrEvent, original: Value) -> Option<SpasmEvent> {
    let tag_values = |name: &str| -> Vec<&Vec<String>> {
        nostr
            .tags
            .iter()
            .filter(|t| t.first().map(String::as_str) == Some(name) && t.len() > 1)
            .collect()
    };

    let e_tags = tag_values("e");
    // NIP-10: a "reply" marker wins, otherwise the last e tag is the parent.
    let parent_id = e_tags
        .iter()
        .find(|t| t.get(3).map(String::as_str) == Some("reply"))
        .or_else(|| e_tags.last())
        .map(|t| t[1].clone());

    let action = match (nostr.kind, &parent_id) {
        (NOSTR_KIND_TEXT_NOTE, None) => "post",
        (NOSTR_KIND_TEXT_NOTE, Some(_)) => "reply",
        (NOSTR_KIND_REACTION, Some(_)) => "react",
        _ => return None,
    };

    let title = tag_values("subject").first().map(|t| t[1].clone());
    let keywords = tag_values("t").iter().map(|t| t[1].to_lowercase()).collect();

    let nostr_id = SpasmEventId::new(nostr.id.clone(), "nostr-hex");
    let signature = SpasmSignature {
        value: nostr.sig.clone(),
        pubkey: Some(nostr.pubkey.clone()),
        format: Some(SpasmFormat::named("nostr-sig")),
    };

    Some(SpasmEvent {
        ids: vec![nostr_id.clone()],
        action: Some(action.to_string()),
        title,
        content: Some(nostr.content),
        timestamp: Some(nostr.created_at.saturating_mul(1000)),
        parent: parent_id.map(|id| SpasmParent {
            ids: vec![SpasmEventId::new(id, "nostr-hex")],
        }),
        authors: vec![SpasmAuthor {
            addresses: vec![SpasmAddress {
                value: nostr.pubkey,
                format: Some(SpasmFormat::named("nostr-hex")),
            }],
        }],
        keywords,
        signatures: vec![signature.clone()],
        siblings: vec![SpasmSibling {
            protocol: SpasmProtocol {
                name: "nostr".to_string(),
                version: None,
            },
            original_object: original,
            ids: vec![nostr_id],
            signatures: vec![signature],
        }],
        ..SpasmEvent::default()
    })
}

#[derive(Serialize)]
struct HashedFields<'a> {
    action: Option<&'a str>,
    title: Option<&'a str>,
    content: Option<&'a str>,
    timestamp: Option<i64>,
    source: Option<&'a str>,
    parent_ids: Vec<&'a str>,
    authors: Vec<&'a str>,
    categories: Vec<&'a str>,
    keywords: &'a [String],
}

/// Content hash of an event: `spasmid01` followed by the hex SHA-256 of the
/// canonical JSON of its content fields. Ids, signatures, and storage
/// bookkeeping do not contribute.
pub fn spasm_id(event: &SpasmEvent) -> String {
    let fields = HashedFields {
        action: event.action.as_deref(),
        title: event.title.as_deref(),
        content: event.content.as_deref(),
        timestamp: event.timestamp,
        source: event.source.as_ref().map(|s| s.name.as_str()),
        parent_ids: event.parent_id_values().collect(),
        authors: event
            .authors
            .iter()
            .flat_map(|a| a.addresses.iter().map(|addr| addr.value.as_str()))
            .collect(),
        categories: event.categories.iter().map(|c| c.name.as_str()).collect(),
        keywords: &event.keywords,
    };

    // Serializing a struct of strings and integers cannot fail.
    let canonical = serde_json::to_vec(&fields).unwrap_or_default();
    format!("{SPASM_ID_PREFIX}{}", hex::encode(Sha256::digest(&canonical)))
}
