//! SQLite implementation of [`EventStore`].

use rusqlite::{params, types::ToSql, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use spasm_db::DbPool;
use spasm_types::{
    FeedFilters, SpasmDbInfo, SpasmEvent, SpasmEventNode, SpasmStat, SubmitOutcome,
};
use std::collections::{BTreeSet, HashSet};

use crate::error::StoreError;
use crate::store::{EventStore, DEFAULT_FEED_LIMIT, MAX_FEED_LIMIT};

const EVENT_COLUMNS: &str = "e.db_key, e.spasm_event_json, e.db_added_timestamp";

/// Category value meaning "every category".
const ANY_CATEGORY: &str = "any";
/// Activity value meaning "no activity ordering".
const ALL_ACTIVITY: &str = "all";

/// [`EventStore`] backed by the SQLite pool from `spasm-db`.
///
/// Each method takes one pooled connection for its whole duration.
#[derive(Clone)]
pub struct SqliteEventStore {
    pool: DbPool,
}

impl SqliteEventStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Appends a configuration row; later reads return the newest one.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` on SQL failure.
    pub fn save_app_config(&self, config: &Value) -> Result<i64, StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO app_configs (config_json) VALUES (?1)",
            [config.to_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

/// Positional parameters collected while a query is assembled.
#[derive(Default)]
struct SqlParams {
    values: Vec<Box<dyn ToSql>>,
}

impl SqlParams {
    /// Binds `value` and returns its placeholder.
    fn push(&mut self, value: impl ToSql + 'static) -> String {
        self.values.push(Box::new(value));
        format!("?{}", self.values.len())
    }

    /// Binds every value and returns a comma separated placeholder list.
    fn push_all(&mut self, values: impl IntoIterator<Item = String>) -> String {
        values
            .into_iter()
            .map(|v| self.push(v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn as_refs(&self) -> Vec<&dyn ToSql> {
        self.values.iter().map(|p| &**p).collect()
    }
}

fn non_empty(set: &Option<BTreeSet<String>>) -> Option<&BTreeSet<String>> {
    set.as_ref().filter(|s| !s.is_empty())
}

/// Lowercased title and content, matched by keyword search.
///
/// Folding happens here because SQLite's `lower()` only folds ASCII.
fn search_text(event: &SpasmEvent) -> String {
    format!(
        "{}\n{}",
        event.title.as_deref().unwrap_or_default(),
        event.content.as_deref().unwrap_or_default()
    )
    .to_lowercase()
}

/// True when `err` is a UNIQUE constraint violation.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn query_events(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<SpasmEvent>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(key, json, added_timestamp)| -> Result<SpasmEvent, StoreError> {
            let mut event: SpasmEvent = serde_json::from_str(&json)?;
            event.db = Some(SpasmDbInfo {
                key,
                added_timestamp,
            });
            event.stats = child_stats(conn, key)?;
            Ok(event)
        })
        .collect()
}

/// Counts direct children of the event stored under `key`, per action.
fn child_stats(conn: &Connection, key: i64) -> Result<Vec<SpasmStat>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT COALESCE(c.action, 'unknown'), COUNT(DISTINCT c.db_key)
         FROM spasm_event_ids i
         JOIN spasm_event_parents p ON p.parent_id = i.value
         JOIN spasm_events c ON c.db_key = p.event_key
         WHERE i.event_key = ?1
         GROUP BY 1
         ORDER BY 1",
    )?;
    let stats = stmt
        .query_map([key], |row| {
            Ok(SpasmStat {
                action: row.get(0)?,
                total: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(stats)
}

fn expand(
    conn: &Connection,
    node: &mut SpasmEventNode,
    max_depth: u32,
    visited: &mut HashSet<i64>,
) -> Result<(), StoreError> {
    if node.depth >= max_depth {
        return Ok(());
    }

    let mut params = SqlParams::default();
    let ids: Vec<String> = node.event.id_values().map(str::to_string).collect();
    if ids.is_empty() {
        return Ok(());
    }
    let list = params.push_all(ids);
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM spasm_events e
         WHERE e.db_key IN (SELECT event_key FROM spasm_event_parents WHERE parent_id IN ({list}))
         ORDER BY e.db_added_timestamp ASC, e.db_key ASC"
    );

    for child in query_events(conn, &sql, &params.as_refs())? {
        if let Some(db) = child.db {
            if !visited.insert(db.key) {
                continue;
            }
        }
        let mut child_node = SpasmEventNode::leaf(child, node.depth + 1);
        expand(conn, &mut child_node, max_depth, visited)?;
        node.children.push(child_node);
    }

    Ok(())
}

impl EventStore for SqliteEventStore {
    fn fetch_events_by_filter(&self, filters: &FeedFilters) -> Result<Vec<SpasmEvent>, StoreError> {
        // Clauses and bind values are collected separately; nothing from the
        // request is interpolated into the SQL text.
        let mut clauses: Vec<String> = Vec::new();
        let mut params = SqlParams::default();

        match filters.web_type.as_deref() {
            Some("web3") => clauses.push("e.signed = 1".to_string()),
            Some("web2") => clauses.push("e.signed = 0".to_string()),
            _ => {}
        }

        if let Some(signers) = non_empty(&filters.signer) {
            let list = params.push_all(signers.iter().map(|s| s.to_lowercase()));
            clauses.push(format!(
                "e.db_key IN (SELECT event_key FROM spasm_event_signers WHERE signer IN ({list}))"
            ));
        }

        if let Some(parent_ids) = non_empty(&filters.parent_id) {
            let list = params.push_all(parent_ids.iter().cloned());
            clauses.push(format!(
                "e.db_key IN (SELECT event_key FROM spasm_event_parents WHERE parent_id IN ({list}))"
            ));
        }

        if let Some(actions) = non_empty(&filters.action) {
            let list = params.push_all(actions.iter().cloned());
            clauses.push(format!("e.action IN ({list})"));
        }

        if let Some(categories) = non_empty(&filters.category) {
            if !categories.contains(ANY_CATEGORY) {
                let list = params.push_all(categories.iter().map(|c| c.to_lowercase()));
                clauses.push(format!(
                    "e.db_key IN (SELECT event_key FROM spasm_event_categories WHERE category IN ({list}))"
                ));
            }
        }

        if let Some(source) = filters.source.as_deref() {
            let p = params.push(source.to_string());
            clauses.push(format!("e.source_name = {p}"));
        }

        if let Some(keywords) = non_empty(&filters.keyword) {
            let any_keyword = keywords
                .iter()
                .map(|kw| {
                    let p = params.push(kw.to_lowercase());
                    format!(
                        "instr(e.search_text, {p}) > 0
                         OR e.db_key IN (SELECT event_key FROM spasm_event_keywords WHERE keyword = {p})"
                    )
                })
                .collect::<Vec<_>>()
                .join(" OR ");
            clauses.push(format!("({any_keyword})"));
        }

        let order = match filters.activity.as_deref() {
            Some(activity) if activity != ALL_ACTIVITY => {
                "(SELECT COUNT(*) FROM spasm_event_parents p
                  JOIN spasm_event_ids i ON i.value = p.parent_id
                  WHERE i.event_key = e.db_key) DESC,
                 e.db_added_timestamp DESC, e.db_key DESC"
            }
            _ => "e.db_added_timestamp DESC, e.db_key DESC",
        };

        let limit = filters
            .limit_count()
            .unwrap_or(DEFAULT_FEED_LIMIT)
            .clamp(1, MAX_FEED_LIMIT);
        let limit_param = params.push(limit);

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM spasm_events e
             {where_clause}
             ORDER BY {order}
             LIMIT {limit_param}"
        );

        let conn = self.pool.get()?;
        let events = query_events(&conn, &sql, &params.as_refs())?;
        tracing::debug!(count = events.len(), limit, "fetched feed events");
        Ok(events)
    }

    fn fetch_event_by_id(&self, id: &str) -> Result<Option<SpasmEvent>, StoreError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM spasm_events e
             JOIN spasm_event_ids i ON i.event_key = e.db_key
             WHERE i.value = ?1"
        );
        Ok(query_events(&conn, &sql, &[&id as &dyn ToSql])?.into_iter().next())
    }

    fn fetch_event_by_short_id(&self, short_id: &str) -> Result<Option<SpasmEvent>, StoreError> {
        if short_id.is_empty() {
            return Ok(None);
        }
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM spasm_events e
             JOIN spasm_event_ids i ON i.event_key = e.db_key
             WHERE substr(i.value, 1, length(?1)) = ?1
             ORDER BY e.db_key ASC
             LIMIT 1"
        );
        Ok(query_events(&conn, &sql, &[&short_id as &dyn ToSql])?.into_iter().next())
    }

    fn build_tree_down(
        &self,
        event: SpasmEvent,
        max_depth: u32,
    ) -> Result<SpasmEventNode, StoreError> {
        let conn = self.pool.get()?;
        let mut visited = HashSet::new();
        if let Some(db) = event.db {
            visited.insert(db.key);
        }
        let mut root = SpasmEventNode::leaf(event, 0);
        expand(&conn, &mut root, max_depth, &mut visited)?;
        Ok(root)
    }

    fn fetch_full_ids_from_short_id(&self, short_id: &str) -> Result<Vec<String>, StoreError> {
        if short_id.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT value FROM spasm_event_ids
             WHERE substr(value, 1, length(?1)) = ?1
             ORDER BY value",
        )?;
        let ids = stmt
            .query_map([short_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn submit_event(&self, event: SpasmEvent) -> Result<SubmitOutcome, StoreError> {
        let Some(primary_id) = event.primary_id().map(str::to_string) else {
            return Err(StoreError::InvalidEvent("event has no ids".to_string()));
        };

        // Repeated ids inside one event are stored once.
        let mut seen = HashSet::new();
        let ids: Vec<&str> = event.id_values().filter(|id| seen.insert(*id)).collect();

        let mut conn = self.pool.get()?;
        // Take the write lock before the duplicate check so concurrent
        // submits of the same event serialize here.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        for id in &ids {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM spasm_event_ids WHERE value = ?1)",
                [id],
                |row| row.get(0),
            )?;
            if exists {
                tracing::debug!(id, "event already stored");
                return Ok(SubmitOutcome::Duplicate { id: id.to_string() });
            }
        }

        let json = serde_json::to_string(&SpasmEvent {
            db: None,
            stats: Vec::new(),
            ..event.clone()
        })?;
        let added_timestamp = chrono::Utc::now().timestamp_millis();

        tx.execute(
            "INSERT INTO spasm_events
                (action, source_name, signed, title, content, search_text, spasm_event_json, db_added_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.action,
                event.source.as_ref().map(|s| s.name.as_str()),
                event.is_signed(),
                event.title,
                event.content,
                search_text(&event),
                json,
                added_timestamp,
            ],
        )?;
        let key = tx.last_insert_rowid();

        for id in &ids {
            match tx.execute(
                "INSERT INTO spasm_event_ids (event_key, value) VALUES (?1, ?2)",
                params![key, id],
            ) {
                Ok(_) => {}
                // Another writer stored this id first; dropping `tx` rolls back.
                Err(e) if is_unique_violation(&e) => {
                    tracing::debug!(id, "event id stored concurrently");
                    return Ok(SubmitOutcome::Duplicate { id: id.to_string() });
                }
                Err(e) => return Err(e.into()),
            }
        }
        for parent_id in event.parent_id_values() {
            tx.execute(
                "INSERT INTO spasm_event_parents (event_key, parent_id) VALUES (?1, ?2)",
                params![key, parent_id],
            )?;
        }
        let signers: BTreeSet<String> = event
            .signer_values()
            .into_iter()
            .map(str::to_lowercase)
            .collect();
        for signer in &signers {
            tx.execute(
                "INSERT INTO spasm_event_signers (event_key, signer) VALUES (?1, ?2)",
                params![key, signer],
            )?;
        }
        let categories: BTreeSet<String> = event
            .categories
            .iter()
            .map(|c| c.name.to_lowercase())
            .collect();
        for category in &categories {
            tx.execute(
                "INSERT INTO spasm_event_categories (event_key, category) VALUES (?1, ?2)",
                params![key, category],
            )?;
        }
        let keywords: BTreeSet<String> = event.keywords.iter().map(|k| k.to_lowercase()).collect();
        for keyword in &keywords {
            tx.execute(
                "INSERT INTO spasm_event_keywords (event_key, keyword) VALUES (?1, ?2)",
                params![key, keyword],
            )?;
        }

        tx.commit()?;
        tracing::info!(id = %primary_id, db_key = key, "stored event");

        Ok(SubmitOutcome::Saved { id: primary_id })
    }

    fn fetch_app_config(&self) -> Result<Option<Value>, StoreError> {
        let conn = self.pool.get()?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT config_json FROM app_configs ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        Ok(stored.and_then(|text| match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "stored app config is not valid JSON");
                None
            }
        }))
    }
}
