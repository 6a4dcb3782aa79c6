//! RSS 2.0 feed generation.

use chrono::{DateTime, Utc};
use spasm_types::{FeedConfig, SpasmEvent};
use std::fmt::Write as _;

/// Content type of documents produced by [`generate_rss_feed`].
pub const RSS_CONTENT_TYPE: &str = "application/rss+xml";

const UNTITLED_PREVIEW_CHARS: usize = 60;

/// Renders `events` as an RSS 2.0 document described by `config`.
///
/// Returns `None` when the channel has no title, since such a document is
/// not a valid feed.
pub fn generate_rss_feed(events: &[SpasmEvent], config: &FeedConfig) -> Option<String> {
    let channel = &config.channel;
    if channel.title.trim().is_empty() {
        return None;
    }

    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">"#);
    xml.push_str("\n<channel>\n");
    push_element(&mut xml, "title", &channel.title);
    push_element(&mut xml, "link", &channel.link);
    push_element(&mut xml, "description", &channel.description);
    if let Some(full_uri) = channel.full_uri.as_deref() {
        let _ = writeln!(
            xml,
            r#"<atom:link href="{}" rel="self" type="{RSS_CONTENT_TYPE}"/>"#,
            escape(full_uri)
        );
    }
    if let Some(image_url) = channel.image_url.as_deref() {
        xml.push_str("<image>\n");
        push_element(&mut xml, "url", image_url);
        push_element(&mut xml, "title", &channel.title);
        push_element(&mut xml, "link", &channel.link);
        xml.push_str("</image>\n");
    }

    let base = config
        .custom_domain
        .as_deref()
        .unwrap_or(channel.link.as_str())
        .trim_end_matches('/');

    for event in events {
        let Some(id) = event.primary_id() else {
            continue;
        };
        xml.push_str("<item>\n");
        push_element(&mut xml, "title", &item_title(event));
        push_element(&mut xml, "link", &format!("{base}/{id}"));
        if let Some(content) = event.content.as_deref() {
            push_element(&mut xml, "description", content);
        }
        for category in &event.categories {
            push_element(&mut xml, "category", &category.name);
        }
        if let Some(date) = event.timestamp.and_then(DateTime::<Utc>::from_timestamp_millis) {
            push_element(&mut xml, "pubDate", &date.to_rfc2822());
        }
        let _ = writeln!(xml, r#"<guid isPermaLink="false">{}</guid>"#, escape(id));
        xml.push_str("</item>\n");
    }

    xml.push_str("</channel>\n</rss>\n");
    Some(xml)
}

fn item_title(event: &SpasmEvent) -> String {
    if let Some(title) = event.title.as_deref().filter(|t| !t.trim().is_empty()) {
        return title.to_string();
    }
    let content = event.content.as_deref().unwrap_or_default().trim();
    let mut preview: String = content.chars().take(UNTITLED_PREVIEW_CHARS).collect();
    if content.chars().count() > UNTITLED_PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

fn push_element(xml: &mut String, name: &str, text: &str) {
    let _ = writeln!(xml, "<{name}>{}</{name}>", escape(text));
}

/// Characters XML 1.0 does not allow anywhere in a document.
fn is_forbidden_in_xml(c: char) -> bool {
    matches!(
        c,
        '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}'
    )
}

/// Escapes markup characters and drops characters XML cannot carry.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().filter(|c| !is_forbidden_in_xml(*c)) {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
