//! Response shaping for the event endpoints.
//!
//! A single event goes out as a bare envelope or, when a comment depth is
//! requested, as an envelope with its reply tree. A feed goes out as an RSS
//! document or a JSON array of envelopes. Empty results are JSON `null`.

use axum::{
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use spasm_convert::{
    convert_many_to_envelopes, convert_to_envelope, convert_to_envelope_with_tree,
    generate_rss_feed, RSS_CONTENT_TYPE,
};
use spasm_types::{
    FeedConfig, FeedFilters, FeedFormat, SpasmEvent, SpasmEventEnvelope,
    SpasmEventEnvelopeWithTree, SpasmEventNode,
};

/// Body sent when a single-event request names no stored event.
pub const NOT_FOUND_MESSAGE: &str = "event has not been found";

/// Outcome of a single-event request.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// No event was found. Sent with status 200.
    NotFound,
    /// The event converted to nothing.
    Empty,
    Envelope(SpasmEventEnvelope),
    Tree(SpasmEventEnvelopeWithTree),
}

impl IntoResponse for EventOutcome {
    fn into_response(self) -> Response {
        match self {
            EventOutcome::NotFound => Json(json!({ "error": NOT_FOUND_MESSAGE })).into_response(),
            EventOutcome::Empty => Json(Value::Null).into_response(),
            EventOutcome::Envelope(envelope) => Json(envelope).into_response(),
            EventOutcome::Tree(tree) => Json(tree).into_response(),
        }
    }
}

/// Outcome of a feed request.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedOutcome {
    Rss(String),
    Envelopes(Vec<SpasmEventEnvelope>),
    Empty,
}

impl IntoResponse for FeedOutcome {
    fn into_response(self) -> Response {
        match self {
            FeedOutcome::Rss(document) => {
                ([(CONTENT_TYPE, RSS_CONTENT_TYPE)], document).into_response()
            }
            FeedOutcome::Envelopes(envelopes) => Json(envelopes).into_response(),
            FeedOutcome::Empty => Json(Value::Null).into_response(),
        }
    }
}

/// Parses `commentsDepth`. Only numbers greater than zero request a tree;
/// fractions round up and values above `max_depth` are clamped to it.
pub fn requested_depth(raw: Option<&str>, max_depth: u32) -> Option<u32> {
    let value: f64 = raw?.trim().parse().ok()?;
    if value.is_nan() || value <= 0.0 {
        return None;
    }
    let depth = value.ceil().min(f64::from(max_depth)) as u32;
    (depth > 0).then_some(depth)
}

/// Shapes a standalone event.
pub fn event_outcome(event: &SpasmEvent) -> EventOutcome {
    convert_to_envelope(event).map_or(EventOutcome::Empty, EventOutcome::Envelope)
}

/// Shapes an expanded reply tree.
pub fn tree_outcome(tree: &SpasmEventNode) -> EventOutcome {
    convert_to_envelope_with_tree(tree).map_or(EventOutcome::Empty, EventOutcome::Tree)
}

/// Shapes a feed result set according to the requested format.
///
/// For RSS, a copy of `template` receives the request's filters and its
/// full URI; the template itself is never modified.
pub fn feed_outcome(
    filters: &FeedFilters,
    events: &[SpasmEvent],
    template: &FeedConfig,
    full_uri: Option<String>,
) -> FeedOutcome {
    if filters.feed_format() == FeedFormat::Rss {
        let mut config = template.clone();
        config.filters = Some(filters.clone());
        if full_uri.is_some() {
            config.channel.full_uri = full_uri;
        }
        return match generate_rss_feed(events, &config) {
            Some(document) if !document.is_empty() => FeedOutcome::Rss(document),
            _ => FeedOutcome::Empty,
        };
    }

    if events.is_empty() {
        return FeedOutcome::Empty;
    }
    let envelopes = convert_many_to_envelopes(events);
    if envelopes.is_empty() {
        FeedOutcome::Empty
    } else {
        FeedOutcome::Envelopes(envelopes)
    }
}
