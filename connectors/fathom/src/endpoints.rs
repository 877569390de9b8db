//! Candidate shapes of the meetings list endpoint, tried in order during
//! discovery. The first strategy whose response parses wins.

use serde_json::Value;
use std::path::Path;

use crate::config::DomainsType;
use crate::error::{FathomError, Result};
use crate::models::MeetingsPage;

const LIST_KEYS: &[&str] = &["items", "data", "results", "meetings", "calls", "transcripts"];
const DEFAULT_LIMIT: u32 = 50;

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub cursor: Option<String>,
    pub domains_type: DomainsType,
    pub page_size: Option<u32>,
    pub include_transcript: bool,
}

pub type QueryBuilder = fn(&ListQuery) -> Vec<(&'static str, String)>;
pub type PageParser = fn(&Value) -> Option<MeetingsPage>;

#[derive(Clone, Copy)]
pub struct EndpointStrategy {
    pub path: &'static str,
    pub query: QueryBuilder,
    pub parse: PageParser,
}

impl std::fmt::Debug for EndpointStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointStrategy")
            .field("path", &self.path)
            .finish()
    }
}

pub const STRATEGIES: &[EndpointStrategy] = &[
    EndpointStrategy {
        path: "external/v1/meetings",
        query: external_meetings_query,
        parse: parse_items_envelope,
    },
    EndpointStrategy {
        path: "external/v1/meetings",
        query: filtered_limit_query,
        parse: parse_generic,
    },
    EndpointStrategy {
        path: "v1/meetings",
        query: limit_query,
        parse: parse_generic,
    },
    EndpointStrategy {
        path: "v1/calls",
        query: limit_query,
        parse: parse_generic,
    },
    EndpointStrategy {
        path: "v1/transcripts",
        query: limit_query,
        parse: parse_generic,
    },
];

fn external_meetings_query(q: &ListQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![(
        "calendar_invitees_domains_type",
        q.domains_type.as_str().to_string(),
    )];
    if let Some(cursor) = q.cursor.as_deref().filter(|c| !c.is_empty()) {
        params.push(("cursor", cursor.to_string()));
    }
    if let Some(size) = q.page_size {
        params.push(("page_size", size.to_string()));
    }
    if q.include_transcript {
        params.push(("include_transcript", "true".to_string()));
    }
    params
}

// Same path as the primary strategy, so the invitee filter must survive the
// fallback.
fn filtered_limit_query(q: &ListQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![(
        "calendar_invitees_domains_type",
        q.domains_type.as_str().to_string(),
    )];
    params.extend(limit_query(q));
    params
}

fn limit_query(q: &ListQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![("limit", q.page_size.unwrap_or(DEFAULT_LIMIT).to_string())];
    if let Some(cursor) = q.cursor.as_deref().filter(|c| !c.is_empty()) {
        params.push(("cursor", cursor.to_string()));
    }
    params
}

/// `{ "items": [...], "next_cursor": "..." | null }`
pub fn parse_items_envelope(payload: &Value) -> Option<MeetingsPage> {
    let items = payload.get("items")?.as_array()?;
    Some(MeetingsPage {
        items: objects_only(items),
        next_cursor: next_cursor(payload),
    })
}

/// Accepts a bare array, or an array under any of the usual list keys, at the
/// top level or one level down inside `data`.
pub fn parse_generic(payload: &Value) -> Option<MeetingsPage> {
    if let Some(items) = payload.as_array() {
        return Some(MeetingsPage {
            items: objects_only(items),
            next_cursor: None,
        });
    }

    let items = find_list(payload).or_else(|| {
        payload
            .get("data")
            .filter(|d| d.is_object())
            .and_then(find_list)
    })?;

    Some(MeetingsPage {
        items: objects_only(items),
        next_cursor: next_cursor(payload),
    })
}

fn find_list(obj: &Value) -> Option<&Vec<Value>> {
    LIST_KEYS
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(Value::as_array)
}

fn objects_only(items: &[Value]) -> Vec<Value> {
    items.iter().filter(|i| i.is_object()).cloned().collect()
}

fn next_cursor(payload: &Value) -> Option<String> {
    ["next_cursor", "nextCursor"]
        .iter()
        .filter_map(|k| payload.get(*k))
        .find_map(Value::as_str)
        .map(str::to_string)
        .filter(|c| !c.is_empty())
}

/// Reads a saved list response from disk instead of calling the API.
pub fn parse_source_json(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)?;
    let payload: Value = serde_json::from_str(&text).map_err(|e| {
        FathomError::Protocol(format!("{} is not valid JSON: {}", path.display(), e))
    })?;
    parse_generic(&payload)
        .map(|page| page.items)
        .ok_or_else(|| {
            FathomError::Protocol(format!(
                "{} does not contain a recognizable meeting list",
                path.display()
            ))
        })
}
