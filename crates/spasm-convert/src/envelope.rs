//! Stored event to public envelope conversion.

use spasm_types::{
    SpasmEvent, SpasmEventEnvelope, SpasmEventEnvelopeWithTree, SpasmEventNode, SpasmProtocol,
    SpasmSibling, SPASM_ENVELOPE_TYPE, SPASM_ENVELOPE_WITH_TREE_TYPE,
};

/// Wraps one stored event. Events without any id have no public identity
/// and convert to `None`.
pub fn convert_to_envelope(event: &SpasmEvent) -> Option<SpasmEventEnvelope> {
    if event.ids.is_empty() {
        return None;
    }

    Some(SpasmEventEnvelope {
        kind: SPASM_ENVELOPE_TYPE.to_string(),
        ids: event.ids.clone(),
        db: event.db,
        siblings: siblings_of(event),
        stats: event.stats.clone(),
    })
}

/// Converts a result set, skipping events that have no envelope.
pub fn convert_many_to_envelopes(events: &[SpasmEvent]) -> Vec<SpasmEventEnvelope> {
    events.iter().filter_map(convert_to_envelope).collect()
}

/// Converts an expanded reply tree. A root without ids yields `None`;
/// children without ids are pruned together with their subtrees.
pub fn convert_to_envelope_with_tree(node: &SpasmEventNode) -> Option<SpasmEventEnvelopeWithTree> {
    if node.event.ids.is_empty() {
        return None;
    }

    Some(SpasmEventEnvelopeWithTree {
        kind: SPASM_ENVELOPE_WITH_TREE_TYPE.to_string(),
        ids: node.event.ids.clone(),
        db: node.event.db,
        siblings: siblings_of(&node.event),
        stats: node.event.stats.clone(),
        depth: node.depth,
        children: node
            .children
            .iter()
            .filter_map(convert_to_envelope_with_tree)
            .collect(),
    })
}

/// Events submitted over a signed protocol keep their original object.
/// Anything else is published as a `web2` sibling built from the
/// normalized fields.
fn siblings_of(event: &SpasmEvent) -> Vec<SpasmSibling> {
    if !event.siblings.is_empty() {
        return event.siblings.clone();
    }

    let original = SpasmEvent {
        siblings: Vec::new(),
        stats: Vec::new(),
        db: None,
        ..event.clone()
    };

    serde_json::to_value(&original)
        .map(|original_object| SpasmSibling {
            protocol: SpasmProtocol {
                name: "web2".to_string(),
                version: None,
            },
            original_object,
            ids: event.ids.clone(),
            signatures: event.signatures.clone(),
        })
        .into_iter()
        .collect()
}
