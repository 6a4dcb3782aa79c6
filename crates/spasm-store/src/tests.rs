//! Unit tests for the SQLite event store.

use serde_json::json;
use spasm_db::{open_database, DbPool, DbRuntimeSettings};
use spasm_types::{
    FeedFilters, SpasmAddress, SpasmAuthor, SpasmCategory, SpasmEvent, SpasmEventId, SpasmParent,
    SpasmSignature, SubmitOutcome,
};
use std::collections::BTreeSet;

use crate::{EventStore, SqliteEventStore, StoreError};

/// In-memory pool (always a single connection) with migrations applied.
fn test_pool() -> DbPool {
    open_database(
        ":memory:",
        DbRuntimeSettings {
            busy_timeout_ms: 1_000,
            pool_max_size: 1,
        },
    )
    .expect("should open database")
}

fn test_store() -> SqliteEventStore {
    SqliteEventStore::new(test_pool())
}

fn post(id: &str, content: &str) -> SpasmEvent {
    SpasmEvent {
        ids: vec![SpasmEventId::new(id, "spasmid")],
        action: Some("post".to_string()),
        content: Some(content.to_string()),
        ..SpasmEvent::default()
    }
}

fn reply(id: &str, parent: &str) -> SpasmEvent {
    SpasmEvent {
        action: Some("reply".to_string()),
        parent: Some(SpasmParent {
            ids: vec![SpasmEventId::new(parent, "spasmid")],
        }),
        ..post(id, &format!("reply to {parent}"))
    }
}

fn signed(mut event: SpasmEvent, signer: &str) -> SpasmEvent {
    event.authors = vec![SpasmAuthor {
        addresses: vec![SpasmAddress {
            value: signer.to_string(),
            format: None,
        }],
    }];
    event.signatures = vec![SpasmSignature {
        value: format!("sig-{}", event.primary_id().unwrap_or_default()),
        pubkey: Some(signer.to_string()),
        format: None,
    }];
    event
}

fn set(values: &[&str]) -> Option<BTreeSet<String>> {
    Some(values.iter().map(|v| v.to_string()).collect())
}

fn ids_of(events: &[SpasmEvent]) -> Vec<&str> {
    events.iter().filter_map(|e| e.primary_id()).collect()
}

// ── submit_event ─────────────────────────────────────────────────────

#[test]
fn submit_then_fetch_by_each_id() {
    let store = test_store();
    let mut event = post("spasmid01aaa", "hello");
    event.ids.push(SpasmEventId::new("nostr-hex-1", "nostr-hex"));

    let outcome = store.submit_event(event).expect("submit should succeed");
    assert_eq!(
        outcome,
        SubmitOutcome::Saved {
            id: "spasmid01aaa".to_string()
        }
    );

    for id in ["spasmid01aaa", "nostr-hex-1"] {
        let fetched = store
            .fetch_event_by_id(id)
            .expect("fetch should succeed")
            .expect("event should exist");
        assert_eq!(fetched.content.as_deref(), Some("hello"));
        assert!(fetched.db.is_some());
    }
}

#[test]
fn submitting_a_known_id_is_a_duplicate() {
    let store = test_store();
    store.submit_event(post("dup", "first")).unwrap();

    let outcome = store.submit_event(post("dup", "second")).unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::Duplicate {
            id: "dup".to_string()
        }
    );
}

#[test]
fn repeated_ids_inside_one_event_are_stored_once() {
    let store = test_store();
    let mut event = post("x1", "hi");
    event.ids.push(SpasmEventId::new("x1", "spasmid"));

    let outcome = store.submit_event(event).unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::Saved {
            id: "x1".to_string()
        }
    );
    assert_eq!(store.fetch_full_ids_from_short_id("x1").unwrap(), vec!["x1"]);
    assert!(store.fetch_event_by_id("x1").unwrap().is_some());
}

#[test]
fn id_claimed_after_the_duplicate_check_is_a_duplicate() {
    let pool = test_pool();
    // Stands in for a writer that stores the same id between the check
    // and the insert.
    pool.get()
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER claim_id AFTER INSERT ON spasm_events
             BEGIN
                 INSERT INTO spasm_event_ids (event_key, value) VALUES (NEW.db_key, 'claimed');
             END;",
        )
        .unwrap();
    let store = SqliteEventStore::new(pool.clone());

    let outcome = store.submit_event(post("claimed", "late")).unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::Duplicate {
            id: "claimed".to_string()
        }
    );

    let rows: i64 = pool
        .get()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM spasm_events", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0, "the losing insert should roll back");
}

#[test]
fn concurrent_identical_submits_save_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.db");
    let pool = open_database(
        path.to_str().unwrap(),
        DbRuntimeSettings {
            busy_timeout_ms: 5_000,
            pool_max_size: 4,
        },
    )
    .unwrap();
    let store = SqliteEventStore::new(pool);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || store.submit_event(post("race", "same")))
        })
        .collect();
    let outcomes: Vec<SubmitOutcome> = handles
        .into_iter()
        .map(|h| h.join().unwrap().expect("submit should not fail"))
        .collect();

    let saved = outcomes
        .iter()
        .filter(|o| matches!(o, SubmitOutcome::Saved { .. }))
        .count();
    assert_eq!(saved, 1);
    assert!(outcomes
        .iter()
        .all(|o| o == &SubmitOutcome::Saved { id: "race".to_string() }
            || o == &SubmitOutcome::Duplicate { id: "race".to_string() }));
}

#[test]
fn submitting_without_ids_is_rejected() {
    let store = test_store();
    let err = store
        .submit_event(SpasmEvent::default())
        .expect_err("event without ids should be rejected");
    assert!(matches!(err, StoreError::InvalidEvent(_)));
}

// ── lookups ──────────────────────────────────────────────────────────

#[test]
fn missing_id_is_none() {
    let store = test_store();
    assert!(store.fetch_event_by_id("nope").unwrap().is_none());
}

#[test]
fn short_id_lookup_matches_prefix() {
    let store = test_store();
    store.submit_event(post("abcdef0123456789", "first")).unwrap();
    store.submit_event(post("abcdff0000000000", "second")).unwrap();

    let event = store.fetch_event_by_short_id("abcdf").unwrap().unwrap();
    assert_eq!(event.primary_id(), Some("abcdff0000000000"));

    let ids = store.fetch_full_ids_from_short_id("abcd").unwrap();
    assert_eq!(ids, vec!["abcdef0123456789", "abcdff0000000000"]);

    assert!(store.fetch_event_by_short_id("").unwrap().is_none());
    assert!(store.fetch_full_ids_from_short_id("").unwrap().is_empty());
}

#[test]
fn short_id_lookup_treats_like_wildcards_literally() {
    let store = test_store();
    store.submit_event(post("abc", "x")).unwrap();
    assert!(store.fetch_event_by_short_id("%").unwrap().is_none());
    assert!(store.fetch_full_ids_from_short_id("a_c").unwrap().is_empty());
}

// ── fetch_events_by_filter ───────────────────────────────────────────

#[test]
fn feed_is_newest_first_and_limited() {
    let store = test_store();
    for i in 0..5 {
        store.submit_event(post(&format!("e{i}"), "x")).unwrap();
    }

    let filters = FeedFilters {
        limit: Some("3".to_string()),
        ..FeedFilters::default()
    };
    let events = store.fetch_events_by_filter(&filters).unwrap();
    assert_eq!(ids_of(&events), vec!["e4", "e3", "e2"]);
}

#[test]
fn feed_filters_by_action_and_parent() {
    let store = test_store();
    store.submit_event(post("p1", "root one")).unwrap();
    store.submit_event(post("p2", "root two")).unwrap();
    store.submit_event(reply("r1", "p1")).unwrap();
    store.submit_event(reply("r2", "p2")).unwrap();

    let replies = store
        .fetch_events_by_filter(&FeedFilters {
            action: set(&["reply"]),
            ..FeedFilters::default()
        })
        .unwrap();
    assert_eq!(ids_of(&replies), vec!["r2", "r1"]);

    let under_p1 = store
        .fetch_events_by_filter(&FeedFilters {
            parent_id: set(&["p1"]),
            ..FeedFilters::default()
        })
        .unwrap();
    assert_eq!(ids_of(&under_p1), vec!["r1"]);

    let both_actions = store
        .fetch_events_by_filter(&FeedFilters {
            action: set(&["post", "reply"]),
            ..FeedFilters::default()
        })
        .unwrap();
    assert_eq!(both_actions.len(), 4);
}

#[test]
fn feed_filters_by_web_type_and_signer() {
    let store = test_store();
    store.submit_event(post("unsigned", "x")).unwrap();
    store
        .submit_event(signed(post("signed-a", "x"), "0xAbC"))
        .unwrap();
    store
        .submit_event(signed(post("signed-b", "x"), "npub1other"))
        .unwrap();

    let web3 = store
        .fetch_events_by_filter(&FeedFilters {
            web_type: Some("web3".to_string()),
            ..FeedFilters::default()
        })
        .unwrap();
    assert_eq!(ids_of(&web3), vec!["signed-b", "signed-a"]);

    let web2 = store
        .fetch_events_by_filter(&FeedFilters {
            web_type: Some("web2".to_string()),
            ..FeedFilters::default()
        })
        .unwrap();
    assert_eq!(ids_of(&web2), vec!["unsigned"]);

    let by_signer = store
        .fetch_events_by_filter(&FeedFilters {
            signer: set(&["0xabc"]),
            ..FeedFilters::default()
        })
        .unwrap();
    assert_eq!(ids_of(&by_signer), vec!["signed-a"]);
}

#[test]
fn feed_filters_by_category_and_keyword() {
    let store = test_store();
    let mut defi = post("defi", "Lending markets");
    defi.categories = vec![SpasmCategory {
        name: "DeFi".to_string(),
    }];
    let mut privacy = post("privacy", "Monero ring signatures");
    privacy.categories = vec![SpasmCategory {
        name: "privacy".to_string(),
    }];
    privacy.keywords = vec!["xmr".to_string()];
    store.submit_event(defi).unwrap();
    store.submit_event(privacy).unwrap();
    store.submit_event(post("other", "nothing here")).unwrap();

    let defi_only = store
        .fetch_events_by_filter(&FeedFilters {
            category: set(&["defi"]),
            ..FeedFilters::default()
        })
        .unwrap();
    assert_eq!(ids_of(&defi_only), vec!["defi"]);

    let any = store
        .fetch_events_by_filter(&FeedFilters {
            category: set(&["any"]),
            ..FeedFilters::default()
        })
        .unwrap();
    assert_eq!(any.len(), 3);

    let keyword = store
        .fetch_events_by_filter(&FeedFilters {
            keyword: set(&["XMR", "lending"]),
            ..FeedFilters::default()
        })
        .unwrap();
    assert_eq!(ids_of(&keyword), vec!["privacy", "defi"]);
}

#[test]
fn keyword_search_folds_non_ascii_case() {
    let store = test_store();
    let mut event = post("umlaut", "GRÜNE Energie im Überblick");
    event.title = Some("ÉTUDE".to_string());
    store.submit_event(event).unwrap();
    store.submit_event(post("plain", "nothing here")).unwrap();

    for keyword in ["grüne", "überblick", "étude"] {
        let found = store
            .fetch_events_by_filter(&FeedFilters {
                keyword: set(&[keyword]),
                ..FeedFilters::default()
            })
            .unwrap();
        assert_eq!(ids_of(&found), vec!["umlaut"], "keyword {keyword}");
    }
}

#[test]
fn activity_orders_by_reply_count() {
    let store = test_store();
    store.submit_event(post("quiet", "x")).unwrap();
    store.submit_event(post("busy", "x")).unwrap();
    store.submit_event(post("newest", "x")).unwrap();
    store.submit_event(reply("r1", "busy")).unwrap();
    store.submit_event(reply("r2", "busy")).unwrap();
    store.submit_event(reply("r3", "quiet")).unwrap();

    let hot = store
        .fetch_events_by_filter(&FeedFilters {
            action: set(&["post"]),
            activity: Some("hot".to_string()),
            ..FeedFilters::default()
        })
        .unwrap();
    assert_eq!(ids_of(&hot), vec!["busy", "quiet", "newest"]);

    let busy = &hot[0];
    assert_eq!(busy.stats.len(), 1);
    assert_eq!(busy.stats[0].action, "reply");
    assert_eq!(busy.stats[0].total, 2);
}

// ── build_tree_down ──────────────────────────────────────────────────

#[test]
fn tree_is_bounded_by_depth() {
    let store = test_store();
    store.submit_event(post("root", "x")).unwrap();
    store.submit_event(reply("c1", "root")).unwrap();
    store.submit_event(reply("c2", "root")).unwrap();
    store.submit_event(reply("g1", "c1")).unwrap();
    store.submit_event(reply("gg1", "g1")).unwrap();

    let root = store.fetch_event_by_id("root").unwrap().unwrap();

    let shallow = store.build_tree_down(root.clone(), 1).unwrap();
    assert_eq!(shallow.children.len(), 2);
    assert!(shallow.children.iter().all(|c| c.children.is_empty()));

    let deep = store.build_tree_down(root, 2).unwrap();
    assert_eq!(deep.depth, 0);
    let c1 = &deep.children[0];
    assert_eq!(c1.event.primary_id(), Some("c1"));
    assert_eq!(c1.depth, 1);
    assert_eq!(c1.children[0].event.primary_id(), Some("g1"));
    assert_eq!(c1.children[0].depth, 2);
    assert!(c1.children[0].children.is_empty());
}

// ── app config ───────────────────────────────────────────────────────

#[test]
fn app_config_newest_row_wins() {
    let store = test_store();
    assert!(store.fetch_app_config().unwrap().is_none());

    store
        .save_app_config(&json!({ "enableShortUrlsForWeb3Actions": false }))
        .unwrap();
    store
        .save_app_config(&json!({ "enableShortUrlsForWeb3Actions": true }))
        .unwrap();

    let config = store.fetch_app_config().unwrap().unwrap();
    assert_eq!(config["enableShortUrlsForWeb3Actions"], true);
}

#[test]
fn unparsable_app_config_reads_as_missing() {
    let pool = test_pool();
    pool.get()
        .unwrap()
        .execute(
            "INSERT INTO app_configs (config_json) VALUES ('{not json')",
            [],
        )
        .unwrap();

    let store = SqliteEventStore::new(pool);
    assert!(store.fetch_app_config().unwrap().is_none());
}
