//! Shared fixtures for the HTTP integration tests.
#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::Value;
use spasm_db::{open_database, DbRuntimeSettings};
use spasm_server::{app, config::RssConfig, pacing::Pacing, AppState};
use spasm_store::{EventStore, SqliteEventStore, StoreError};
use spasm_types::{
    AppConfig, FeedFilters, SpasmEvent, SpasmEventId, SpasmEventNode, SpasmParent, SubmitOutcome,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt; // for oneshot

/// On-disk SQLite store in a temporary directory, migrations applied.
pub fn sqlite_store() -> (SqliteEventStore, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spasm.db");
    let pool = open_database(path.to_str().unwrap(), DbRuntimeSettings::default()).unwrap();
    (SqliteEventStore::new(pool), dir)
}

/// State with no pacing and the default RSS channel.
pub fn state(store: Arc<dyn EventStore>, app_config: AppConfig) -> AppState {
    AppState {
        store,
        app_config: Arc::new(app_config),
        feed_config: Arc::new(RssConfig::default().feed_config()),
        pacing: Pacing::none(),
        public_url: None,
    }
}

pub fn sqlite_app(app_config: AppConfig) -> (Router, SqliteEventStore, TempDir) {
    let (store, dir) = sqlite_store();
    let router = app(state(Arc::new(store.clone()), app_config));
    (router, store, dir)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

pub async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

pub fn post_event(id: &str, content: &str) -> SpasmEvent {
    SpasmEvent {
        ids: vec![SpasmEventId::new(id, "spasmid")],
        action: Some("post".to_string()),
        content: Some(content.to_string()),
        timestamp: Some(1_700_000_000_000),
        ..SpasmEvent::default()
    }
}

pub fn reply_event(id: &str, parent: &str) -> SpasmEvent {
    SpasmEvent {
        action: Some("reply".to_string()),
        parent: Some(SpasmParent {
            ids: vec![SpasmEventId::new(parent, "spasmid")],
        }),
        ..post_event(id, &format!("reply to {parent}"))
    }
}

/// Every [`EventStore`] call the fake received, with its argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FetchByFilter(FeedFilters),
    FetchById(String),
    FetchByShortId(String),
    BuildTreeDown(u32),
    FullIdsFromShortId(String),
    Submit(SpasmEvent),
    FetchAppConfig,
}

/// In-memory store that records calls and answers from fixed data.
#[derive(Default)]
pub struct CountingStore {
    /// Returned by every single-event lookup.
    pub event: Option<SpasmEvent>,
    pub feed: Vec<SpasmEvent>,
    pub app_config: Option<Value>,
    /// Fail every call with a storage error.
    pub fail: bool,
    pub calls: Mutex<Vec<Call>>,
}

impl CountingStore {
    pub fn returning(event: Option<SpasmEvent>) -> Self {
        Self {
            event,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of single-event lookups (full or short).
    pub fn lookups(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::FetchById(_) | Call::FetchByShortId(_)))
            .count()
    }

    fn record(&self, call: Call) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push(call);
        if self.fail {
            let err = serde_json::from_str::<Value>("{").unwrap_err();
            return Err(StoreError::Serialization(err));
        }
        Ok(())
    }
}

impl EventStore for CountingStore {
    fn fetch_events_by_filter(&self, filters: &FeedFilters) -> Result<Vec<SpasmEvent>, StoreError> {
        self.record(Call::FetchByFilter(filters.clone()))?;
        Ok(self.feed.clone())
    }

    fn fetch_event_by_id(&self, id: &str) -> Result<Option<SpasmEvent>, StoreError> {
        self.record(Call::FetchById(id.to_string()))?;
        Ok(self.event.clone())
    }

    fn fetch_event_by_short_id(&self, short_id: &str) -> Result<Option<SpasmEvent>, StoreError> {
        self.record(Call::FetchByShortId(short_id.to_string()))?;
        Ok(self.event.clone())
    }

    fn build_tree_down(
        &self,
        event: SpasmEvent,
        max_depth: u32,
    ) -> Result<SpasmEventNode, StoreError> {
        self.record(Call::BuildTreeDown(max_depth))?;
        Ok(SpasmEventNode::leaf(event, 0))
    }

    fn fetch_full_ids_from_short_id(&self, short_id: &str) -> Result<Vec<String>, StoreError> {
        self.record(Call::FullIdsFromShortId(short_id.to_string()))?;
        Ok(Vec::new())
    }

    fn submit_event(&self, event: SpasmEvent) -> Result<SubmitOutcome, StoreError> {
        let id = event.primary_id().unwrap_or_default().to_string();
        self.record(Call::Submit(event))?;
        Ok(SubmitOutcome::Saved { id })
    }

    fn fetch_app_config(&self) -> Result<Option<Value>, StoreError> {
        self.record(Call::FetchAppConfig)?;
        Ok(self.app_config.clone())
    }
}

/// Router over a [`CountingStore`], returning both.
pub fn counting_app(store: CountingStore, app_config: AppConfig) -> (Router, Arc<CountingStore>) {
    let store = Arc::new(store);
    let router = app(state(store.clone(), app_config));
    (router, store)
}
