//! Event read handlers.
//!
//! Provides:
//! - `GET /api/events` - filtered feed as JSON envelopes or RSS
//! - `GET /api/events/{id}` - one event, optionally with its reply tree

use crate::api::{run_store, ApiError};
use crate::dispatch::{event_outcome, feed_outcome, requested_depth, tree_outcome, EventOutcome};
use crate::filters::{normalize_filters, RawQuery};
use crate::resolver::{resolve_identifier, Lookup};
use crate::AppState;
use axum::{
    extract::{Extension, OriginalUri, Path, Query},
    http::{HeaderMap, Uri},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Reconstructs the URL the client requested, for feed self links.
///
/// The scheme comes from `X-Forwarded-Proto` (default `http`), the host from
/// the `Host` header or, failing that, the configured public URL.
pub fn request_full_uri(headers: &HeaderMap, uri: &Uri, public_url: Option<&str>) -> Option<String> {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty());

    match host {
        Some(host) => {
            let scheme = headers
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("http");
            Some(format!("{scheme}://{host}{path}"))
        }
        None => public_url.map(|base| format!("{}{}", base.trim_end_matches('/'), path)),
    }
}

/// Handler for `GET /api/events`.
pub async fn get_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let filters = normalize_filters(&RawQuery::from(pairs));
    tracing::debug!(?filters, "feed request");

    let store_filters = filters.clone();
    let events = run_store(&state.store, "fetch_events_by_filter", move |store| {
        store.fetch_events_by_filter(&store_filters)
    })
    .await?;

    let full_uri = request_full_uri(&headers, &uri, state.public_url.as_deref());
    let outcome = feed_outcome(&filters, &events, &state.feed_config, full_uri);

    state.pacing.before_feed_response().await;
    Ok(outcome.into_response())
}

/// Handler for `GET /api/events/{id}`.
///
/// The id may also come from the `e` query parameter, in which case the
/// path segment is usually `search`. Exactly one storage lookup is issued.
pub async fn get_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let raw = RawQuery::from(pairs);
    // A repeated commentsDepth is not a number, so it requests no tree.
    let depth = requested_depth(
        raw.single("commentsDepth"),
        state.app_config.max_comments_depth,
    );

    let outcome = match resolve_identifier(raw.single("e"), Some(id.as_str()), &state.app_config) {
        None => EventOutcome::NotFound,
        Some(resolved) => {
            tracing::debug!(id = %resolved.value, lookup = ?resolved.lookup, "event request");
            let event = run_store(&state.store, "fetch_event", move |store| {
                match resolved.lookup {
                    Lookup::ShortId => store.fetch_event_by_short_id(&resolved.value),
                    Lookup::FullId => store.fetch_event_by_id(&resolved.value),
                }
            })
            .await?;

            match (event, depth) {
                (None, _) => EventOutcome::NotFound,
                (Some(event), None) => event_outcome(&event),
                (Some(event), Some(max_depth)) => {
                    let tree = run_store(&state.store, "build_tree_down", move |store| {
                        store.build_tree_down(event, max_depth)
                    })
                    .await?;
                    tree_outcome(&tree)
                }
            }
        }
    };

    state.pacing.before_event_response().await;
    Ok(outcome.into_response())
}
