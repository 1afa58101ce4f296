//! Filtering, search scoring, and response shaping shared by both storage
//! backends.
//!
//! Filters are validated up front so a malformed query fails fast with a
//! descriptive error instead of silently matching nothing. Response modes
//! let callers trade completeness for output size.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::{LearnedRecord, PlanRecord, PlanStatus, SessionRecord, SessionStatus};

// ============ Filters ============

#[derive(Debug, Clone, Default)]
pub struct PlanFilters {
    pub status: Option<String>,
    pub author: Option<String>,
    pub topic: Option<String>,
    pub updated_after: Option<String>,
    pub updated_before: Option<String>,
}

impl PlanFilters {
    /// Fail fast on values outside the fixed enumerations. Distinguishes
    /// "no results" from "malformed query".
    pub fn validate(&self) -> Result<()> {
        if let Some(ref s) = self.status {
            s.parse::<PlanStatus>()?;
        }
        validate_date_filter("updatedAfter", &self.updated_after)?;
        validate_date_filter("updatedBefore", &self.updated_before)?;
        Ok(())
    }

    /// All provided filters are ANDed together.
    pub fn matches(&self, plan: &PlanRecord) -> bool {
        if let Some(ref status) = self.status {
            match status.parse::<PlanStatus>() {
                Ok(wanted) if plan.status == wanted => {}
                _ => return false,
            }
        }
        if let Some(ref author) = self.author {
            if plan.author.as_deref() != Some(author.as_str()) {
                return false;
            }
        }
        if let Some(ref topic) = self.topic {
            if !topic_matches(topic, &plan.topics, Some(&plan.title)) {
                return false;
            }
        }
        // Lexical comparison is correct: ISO dates are fixed-width and
        // zero-padded. Both bounds are inclusive.
        if let Some(ref after) = self.updated_after {
            match &plan.updated {
                Some(updated) if updated.as_str() >= after.as_str() => {}
                _ => return false,
            }
        }
        if let Some(ref before) = self.updated_before {
            match &plan.updated {
                Some(updated) if updated.as_str() <= before.as_str() => {}
                _ => return false,
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionFilters {
    pub status: Option<String>,
    pub topic: Option<String>,
    pub date_after: Option<String>,
    pub date_before: Option<String>,
}

impl SessionFilters {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref s) = self.status {
            s.parse::<SessionStatus>()?;
        }
        validate_date_filter("dateAfter", &self.date_after)?;
        validate_date_filter("dateBefore", &self.date_before)?;
        Ok(())
    }

    pub fn matches(&self, session: &SessionRecord) -> bool {
        if let Some(ref status) = self.status {
            match status.parse::<SessionStatus>() {
                Ok(wanted) if session.status == wanted => {}
                _ => return false,
            }
        }
        if let Some(ref topic) = self.topic {
            if !topic_matches(topic, &session.topics, None) {
                return false;
            }
        }
        if let Some(ref after) = self.date_after {
            if session.date.as_str() < after.as_str() {
                return false;
            }
        }
        if let Some(ref before) = self.date_before {
            if session.date.as_str() > before.as_str() {
                return false;
            }
        }
        true
    }
}

fn validate_date_filter(name: &str, value: &Option<String>) -> Result<()> {
    if let Some(v) = value {
        NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map_err(|_| anyhow::anyhow!("Invalid {} date: '{}'. Use YYYY-MM-DD.", name, v))?;
    }
    Ok(())
}

fn topic_matches(needle: &str, topics: &[String], title: Option<&str>) -> bool {
    let needle = needle.to_lowercase();
    if topics.iter().any(|t| t.to_lowercase().contains(&needle)) {
        return true;
    }
    title
        .map(|t| t.to_lowercase().contains(&needle))
        .unwrap_or(false)
}

// ============ Search ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    All,
    Plans,
    Sessions,
    Learned,
}

impl std::str::FromStr for SearchScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(SearchScope::All),
            "plans" => Ok(SearchScope::Plans),
            "sessions" => Ok(SearchScope::Sessions),
            "learned" => Ok(SearchScope::Learned),
            other => bail!(
                "Unknown search scope: '{}'. Must be all, plans, sessions, or learned.",
                other
            ),
        }
    }
}

/// One ranked search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub kind: String,
    pub id: String,
    pub title: String,
    pub score: i64,
    pub snippet: String,
    /// ISO date used for tie-breaking; empty when the record has none.
    pub updated: String,
}

const SCORE_PHRASE_TITLE: i64 = 8;
const SCORE_PHRASE_BODY: i64 = 4;
const SCORE_KEYWORD: i64 = 1;

/// Score a record against a query: exact phrase in the title outranks an
/// exact phrase in the body, which outranks individual keyword hits.
/// Returns 0 for a non-match.
pub fn score_match(query: &str, title: &str, topics: &[String], body: &str) -> i64 {
    let q = query.to_lowercase();
    if q.trim().is_empty() {
        return 0;
    }
    let title_l = title.to_lowercase();
    let body_l = body.to_lowercase();

    let mut score = 0;
    if title_l.contains(&q) {
        score += SCORE_PHRASE_TITLE;
    }
    if body_l.contains(&q) {
        score += SCORE_PHRASE_BODY;
    }
    for keyword in q.split_whitespace() {
        if title_l.contains(keyword) {
            score += SCORE_KEYWORD;
        }
        if topics.iter().any(|t| t.to_lowercase().contains(keyword)) {
            score += SCORE_KEYWORD;
        }
        if body_l.contains(keyword) {
            score += SCORE_KEYWORD;
        }
    }
    score
}

/// Short excerpt around the first occurrence of the query (or its first
/// keyword) in the body.
pub fn make_snippet(body: &str, query: &str) -> String {
    const CONTEXT: usize = 80;

    let body_l = body.to_lowercase();
    let q = query.to_lowercase();
    let pos = body_l
        .find(&q)
        .or_else(|| q.split_whitespace().find_map(|kw| body_l.find(kw)));

    let Some(pos) = pos else {
        let end = floor_char_boundary(body, body.len().min(CONTEXT));
        return body[..end].replace('\n', " ").trim().to_string();
    };

    let start = floor_char_boundary(body, pos.saturating_sub(CONTEXT / 2));
    let end = floor_char_boundary(body, (pos + CONTEXT).min(body.len()));
    body[start..end].replace('\n', " ").trim().to_string()
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Sort hits by descending score, ties broken most-recent-first, then by
/// id for determinism.
pub fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(b.updated.cmp(&a.updated))
            .then(a.id.cmp(&b.id))
    });
}

// ============ Response envelopes ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanQueryResponse {
    pub count: usize,
    pub plans: Vec<PlanRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionQueryResponse {
    pub count: usize,
    pub sessions: Vec<SessionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub count: usize,
    pub results: Vec<SearchHit>,
}

// ============ Response modes ============

/// How much of each record to return. Trades completeness for output size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseMode {
    /// Identity plus counts, no body.
    Preview,
    /// All structured fields, no body.
    Metadata,
    /// Structured fields plus one named body section.
    Section(String),
    /// Everything, including the body.
    Full,
}

impl ResponseMode {
    pub fn from_flags(mode: &str, section: Option<String>) -> Result<ResponseMode> {
        match mode {
            "preview" => Ok(ResponseMode::Preview),
            "metadata" => Ok(ResponseMode::Metadata),
            "section" => match section {
                Some(name) => Ok(ResponseMode::Section(name)),
                None => bail!("Mode 'section' requires a section name."),
            },
            "full" => Ok(ResponseMode::Full),
            other => bail!(
                "Unknown response mode: '{}'. Must be preview, metadata, section, or full.",
                other
            ),
        }
    }
}

/// Extract one named markdown section from a body: the heading line plus
/// everything up to the next heading of the same or higher level.
pub fn extract_section(body: &str, name: &str) -> Option<String> {
    let name_l = name.to_lowercase();
    let mut section = String::new();
    let mut level = 0usize;
    let mut capturing = false;

    for line in body.lines() {
        let hashes = line.chars().take_while(|c| *c == '#').count();
        let is_heading = hashes > 0 && line[hashes..].starts_with(' ');

        if capturing {
            if is_heading && hashes <= level {
                break;
            }
            section.push_str(line);
            section.push('\n');
        } else if is_heading && line[hashes..].trim().to_lowercase() == name_l {
            capturing = true;
            level = hashes;
            section.push_str(line);
            section.push('\n');
        }
    }

    capturing.then_some(section)
}

// ============ Shaping ============

fn without_body(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            map.remove("body");
            Value::Object(map)
        }
        other => other,
    }
}

pub fn shape_plan(plan: &PlanRecord, mode: &ResponseMode) -> Value {
    match mode {
        ResponseMode::Preview => json!({
            "id": plan.id,
            "title": plan.title,
            "status": plan.status,
            "topics": plan.topics.len(),
            "lines": plan.body.lines().count(),
        }),
        ResponseMode::Metadata => without_body(json!(plan)),
        ResponseMode::Section(name) => {
            let mut value = without_body(json!(plan));
            if let Value::Object(ref mut map) = value {
                map.insert("section".to_string(), json!(name));
                map.insert("content".to_string(), json!(extract_section(&plan.body, name)));
            }
            value
        }
        ResponseMode::Full => json!(plan),
    }
}

pub fn shape_session(session: &SessionRecord, mode: &ResponseMode) -> Value {
    match mode {
        ResponseMode::Preview => json!({
            "id": session.id,
            "date": session.date,
            "status": session.status,
            "topics": session.topics.len(),
            "files": session.files.len(),
            "lines": session.body.lines().count(),
        }),
        ResponseMode::Metadata => without_body(json!(session)),
        ResponseMode::Section(name) => {
            let mut value = without_body(json!(session));
            if let Value::Object(ref mut map) = value {
                map.insert("section".to_string(), json!(name));
                map.insert(
                    "content".to_string(),
                    json!(extract_section(&session.body, name)),
                );
            }
            value
        }
        ResponseMode::Full => json!(session),
    }
}

pub fn shape_plans(response: &PlanQueryResponse, mode: &ResponseMode) -> Value {
    json!({
        "count": response.count,
        "plans": response.plans.iter().map(|p| shape_plan(p, mode)).collect::<Vec<_>>(),
    })
}

pub fn shape_sessions(response: &SessionQueryResponse, mode: &ResponseMode) -> Value {
    json!({
        "count": response.count,
        "sessions": response.sessions.iter().map(|s| shape_session(s, mode)).collect::<Vec<_>>(),
    })
}

// ============ Search over in-memory records ============

/// Shared search implementation: both backends reduce to scoring typed
/// records with the same function so ranking is identical.
pub fn search_records(
    query: &str,
    scope: SearchScope,
    plans: &[PlanRecord],
    sessions: &[SessionRecord],
    learned: &[LearnedRecord],
) -> SearchResponse {
    let mut hits = Vec::new();

    if matches!(scope, SearchScope::All | SearchScope::Plans) {
        for plan in plans {
            let score = score_match(query, &plan.title, &plan.topics, &plan.body);
            if score > 0 {
                hits.push(SearchHit {
                    kind: "plan".to_string(),
                    id: plan.id.clone(),
                    title: plan.title.clone(),
                    score,
                    snippet: make_snippet(&plan.body, query),
                    updated: plan.updated.clone().unwrap_or_default(),
                });
            }
        }
    }

    if matches!(scope, SearchScope::All | SearchScope::Sessions) {
        for session in sessions {
            let score = score_match(query, &session.date, &session.topics, &session.body);
            if score > 0 {
                hits.push(SearchHit {
                    kind: "session".to_string(),
                    id: session.id.clone(),
                    title: session.date.clone(),
                    score,
                    snippet: make_snippet(&session.body, query),
                    updated: session.date.clone(),
                });
            }
        }
    }

    if matches!(scope, SearchScope::All | SearchScope::Learned) {
        for pattern in learned {
            let score = score_match(query, &pattern.path, &pattern.keywords, &pattern.body);
            if score > 0 {
                hits.push(SearchHit {
                    kind: "learned".to_string(),
                    id: pattern.id.clone(),
                    title: pattern.path.clone(),
                    score,
                    snippet: make_snippet(&pattern.body, query),
                    updated: pattern.updated.clone().unwrap_or_default(),
                });
            }
        }
    }

    sort_hits(&mut hits);
    SearchResponse {
        count: hits.len(),
        results: hits,
    }
}
