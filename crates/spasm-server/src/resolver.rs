//! Identifier resolution for the single-event endpoint.

use spasm_convert::{is_note_id, note_to_hex};
use spasm_types::AppConfig;

/// Path segment that means "take the id from the `e` query parameter".
pub const SEARCH_PATH_SEGMENT: &str = "search";

/// Which storage lookup a resolved identifier goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Prefix match on stored ids.
    ShortId,
    /// Exact match on stored ids.
    FullId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentifier {
    pub value: String,
    pub lookup: Lookup,
}

/// Picks the raw identifier: the `e` query value first, then the path
/// segment unless it is [`SEARCH_PATH_SEGMENT`].
pub fn identifier_candidate<'a>(query_e: Option<&'a str>, path_id: Option<&'a str>) -> Option<&'a str> {
    if let Some(e) = query_e.filter(|e| !e.is_empty()) {
        return Some(e);
    }
    path_id.filter(|id| !id.is_empty() && *id != SEARCH_PATH_SEGMENT)
}

/// Rewrites bech32 nostr note ids to hex. Anything else passes through.
///
/// A note id that fails to decode is kept as given, so the lookup simply
/// finds nothing.
pub fn canonicalize(candidate: &str) -> String {
    if !is_note_id(candidate) {
        return candidate.to_string();
    }
    match note_to_hex(candidate) {
        Ok(hex) => hex,
        Err(e) => {
            tracing::warn!(id = candidate, error = %e, "note id did not decode, using it as is");
            candidate.to_string()
        }
    }
}

/// Short lookups only apply to identifiers of exactly the configured length
/// that are not URLs.
pub fn choose_lookup(id: &str, config: &AppConfig) -> Lookup {
    let short = config.enable_short_urls_for_web3_actions
        && id.chars().count() == config.short_urls_length_of_web3_ids
        && url::Url::parse(id).is_err();
    if short {
        Lookup::ShortId
    } else {
        Lookup::FullId
    }
}

/// Resolves the identifier of a single-event request, or `None` when the
/// request names no event.
pub fn resolve_identifier(
    query_e: Option<&str>,
    path_id: Option<&str>,
    config: &AppConfig,
) -> Option<ResolvedIdentifier> {
    let value = canonicalize(identifier_candidate(query_e, path_id)?);
    let lookup = choose_lookup(&value, config);
    Some(ResolvedIdentifier { value, lookup })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE: &str = "note1tjpa5aa0rhkx6u5fsdye3tt6477eugv389khtmpucfl45aezdumqkkhgwy";
    const NOTE_HEX: &str = "5c83da77af1dec6d7289834998ad7aafbd9e2191396d75ec3cc27f5a77226f36";

    fn short_urls(length: usize) -> AppConfig {
        AppConfig {
            enable_short_urls_for_web3_actions: true,
            short_urls_length_of_web3_ids: length,
            ..AppConfig::default()
        }
    }

    #[test]
    fn query_parameter_wins_over_path() {
        assert_eq!(identifier_candidate(Some("abc"), Some("xyz")), Some("abc"));
        assert_eq!(identifier_candidate(Some(""), Some("xyz")), Some("xyz"));
        assert_eq!(identifier_candidate(None, Some("xyz")), Some("xyz"));
    }

    #[test]
    fn search_segment_without_query_names_nothing() {
        assert_eq!(identifier_candidate(None, Some("search")), None);
        assert_eq!(identifier_candidate(Some(""), Some("search")), None);
        assert_eq!(identifier_candidate(Some("abc"), Some("search")), Some("abc"));
        assert_eq!(identifier_candidate(None, None), None);
    }

    #[test]
    fn note_ids_become_hex() {
        let resolved = resolve_identifier(None, Some(NOTE), &AppConfig::default()).unwrap();
        assert_eq!(resolved.value, NOTE_HEX);
        assert_eq!(resolved.lookup, Lookup::FullId);
    }

    #[test]
    fn other_identifiers_pass_through_unchanged() {
        let plain = "note_not_really_an_id";
        assert_eq!(canonicalize(plain), plain);

        // 63 chars but not "note"-prefixed.
        let other = format!("spasmid01{}", "a".repeat(54));
        assert_eq!(other.len(), 63);
        assert_eq!(canonicalize(&other), other);
    }

    #[test]
    fn undecodable_note_id_is_kept() {
        let bogus = format!("note1{}", "b".repeat(58));
        assert_eq!(bogus.len(), 63);
        assert_eq!(canonicalize(&bogus), bogus);
    }

    #[test]
    fn short_lookup_needs_flag_and_exact_length() {
        let id = "0123456789abcdefghij";
        assert_eq!(id.len(), 20);

        assert_eq!(choose_lookup(id, &AppConfig::default()), Lookup::FullId);
        assert_eq!(choose_lookup(id, &short_urls(20)), Lookup::ShortId);
        assert_eq!(choose_lookup(id, &short_urls(21)), Lookup::FullId);
        assert_eq!(choose_lookup("0123456789", &short_urls(20)), Lookup::FullId);
    }

    #[test]
    fn urls_never_take_the_short_lookup() {
        let url = "https://example.org/";
        assert_eq!(choose_lookup(url, &short_urls(url.len())), Lookup::FullId);
    }

    #[test]
    fn query_identifier_drives_the_lookup_choice() {
        let resolved =
            resolve_identifier(Some("0123456789abcdefghij"), Some("search"), &short_urls(20))
                .unwrap();
        assert_eq!(resolved.value, "0123456789abcdefghij");
        assert_eq!(resolved.lookup, Lookup::ShortId);
    }
}
