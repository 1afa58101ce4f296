//! Structured-header parsing and serialization.
//!
//! A knowledge document is an optional header block delimited by `---` lines,
//! followed by a free-text body. The header grammar is a deliberately small
//! subset of YAML: `key: scalar` pairs and single-line bracketed lists of
//! double-quoted strings. No nesting, no multi-line lists, no anchors.
//!
//! Parsing is tolerant: a document without delimiters is all body; a header
//! that fails to parse yields an empty map plus a recorded error, and body
//! extraction still proceeds. [`serialize`] round-trips through [`parse`]
//! for any header of string / string-list values.

use std::collections::BTreeMap;

use crate::models::{
    FieldValue, Header, LearnedRecord, PlanRecord, PlanStatus, SessionRecord, SessionStatus,
};

pub const DELIMITER: &str = "---";

/// Result of splitting a document into header and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub header: Header,
    pub body: String,
    pub errors: Vec<String>,
}

/// Parse a raw document into a header map and body.
///
/// Never fails: malformed headers are reported through
/// [`ParsedDocument::errors`] with an empty header, and the body is still
/// recovered from the text after the closing delimiter.
pub fn parse(text: &str) -> ParsedDocument {
    // Normalize line endings first so delimiter matching is
    // platform-independent.
    let text = text.replace("\r\n", "\n");

    let Some(rest) = text.strip_prefix("---\n") else {
        return ParsedDocument {
            header: BTreeMap::new(),
            body: text,
            errors: Vec::new(),
        };
    };

    // An empty header block closes at offset 0, where `find("\n---\n")`
    // cannot see it.
    let (inner, body) = if let Some(after) = rest.strip_prefix("---\n") {
        ("", after.to_string())
    } else if rest == "---" {
        ("", String::new())
    } else {
        match rest.find("\n---\n") {
            Some(at) => (&rest[..at], rest[at + 5..].to_string()),
            None if rest.ends_with("\n---") => {
                let at = rest.len() - 4;
                (&rest[..at], String::new())
            }
            None => {
                return ParsedDocument {
                    header: BTreeMap::new(),
                    body: text.clone(),
                    errors: vec!["header parse error: missing closing delimiter".to_string()],
                };
            }
        }
    };

    match parse_header_block(inner) {
        Ok(header) => ParsedDocument {
            header,
            body,
            errors: Vec::new(),
        },
        Err(e) => ParsedDocument {
            header: BTreeMap::new(),
            body,
            errors: vec![format!("header parse error: {}", e)],
        },
    }
}

fn parse_header_block(inner: &str) -> Result<Header, String> {
    let mut header = BTreeMap::new();

    for (lineno, line) in inner.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            return Err(format!("line {}: expected 'key: value'", lineno + 1));
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() {
            return Err(format!("line {}: empty key", lineno + 1));
        }
        if value.is_empty() {
            return Err(format!(
                "line {}: '{}' has no value (multi-line lists are not supported)",
                lineno + 1,
                key
            ));
        }

        let parsed = if value.starts_with('[') {
            if !value.ends_with(']') {
                return Err(format!("line {}: unterminated list for '{}'", lineno + 1, key));
            }
            FieldValue::List(parse_list_items(&value[1..value.len() - 1]).map_err(
                |e| format!("line {}: {} in list for '{}'", lineno + 1, e, key),
            )?)
        } else {
            FieldValue::Scalar(parse_scalar(value).map_err(|e| {
                format!("line {}: {} for '{}'", lineno + 1, e, key)
            })?)
        };

        header.insert(key.to_string(), parsed);
    }

    Ok(header)
}

fn parse_scalar(value: &str) -> Result<String, String> {
    if value.starts_with('"') {
        let (s, used) = parse_quoted(value)?;
        if used != value.len() {
            return Err("trailing characters after closing quote".to_string());
        }
        Ok(s)
    } else {
        Ok(value.to_string())
    }
}

/// Parse the interior of a bracketed list. Items are double-quoted strings;
/// bare items are tolerated for hand-edited files.
fn parse_list_items(inner: &str) -> Result<Vec<String>, String> {
    let mut items = Vec::new();
    let mut rest = inner.trim_start();

    while !rest.is_empty() {
        if rest.starts_with('"') {
            let (item, used) = parse_quoted(rest)?;
            items.push(item);
            rest = rest[used..].trim_start();
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            let bare = rest[..end].trim();
            if !bare.is_empty() {
                items.push(bare.to_string());
            }
            rest = &rest[end..];
        }

        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix(',') {
            rest = after.trim_start();
        } else if !rest.is_empty() {
            return Err("expected ',' between items".to_string());
        }
    }

    Ok(items)
}

/// Parse a leading double-quoted string with `\"` and `\\` escapes.
/// Returns the unescaped string and the byte length consumed.
fn parse_quoted(s: &str) -> Result<(String, usize), String> {
    let mut out = String::new();
    let mut chars = s.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, i + 1)),
            '\\' => match chars.next() {
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, 'n')) => out.push('\n'),
                Some((_, other)) => return Err(format!("unknown escape '\\{}'", other)),
                None => return Err("unterminated string".to_string()),
            },
            other => out.push(other),
        }
    }

    Err("unterminated string".to_string())
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Serialize a header map and body back into document text.
///
/// Values are always double-quoted so the output survives re-parsing:
/// `parse(serialize(h, b))` yields `h` and `b` unchanged.
pub fn serialize(header: &Header, body: &str) -> String {
    if header.is_empty() {
        return body.to_string();
    }

    let mut out = String::new();
    out.push_str(DELIMITER);
    out.push('\n');
    for (key, value) in header {
        match value {
            FieldValue::Scalar(s) => {
                out.push_str(&format!("{}: {}\n", key, quote(s)));
            }
            FieldValue::List(items) => {
                let quoted: Vec<String> = items.iter().map(|i| quote(i)).collect();
                out.push_str(&format!("{}: [{}]\n", key, quoted.join(", ")));
            }
        }
    }
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(body);
    out
}

// ============ Header accessors ============

pub fn get_scalar(header: &Header, key: &str) -> Option<String> {
    header.get(key).and_then(|v| v.as_scalar()).map(String::from)
}

pub fn get_list(header: &Header, key: &str) -> Vec<String> {
    match header.get(key) {
        Some(FieldValue::List(items)) => items.clone(),
        // A bare scalar where a list is expected is tolerated as a
        // one-element list.
        Some(FieldValue::Scalar(s)) => vec![s.clone()],
        None => Vec::new(),
    }
}

// ============ Typed-record normalization ============
//
// Known fields are validated here, at the boundary; the rest of the crate
// works with typed records. Unknown keys ride along in `extra`.

const PLAN_KEYS: [&str; 8] = [
    "title", "status", "author", "created", "updated", "started", "completed", "topics",
];
const SESSION_KEYS: [&str; 6] = ["date", "status", "topics", "files", "plan", "title"];
const LEARNED_KEYS: [&str; 4] = ["category", "keywords", "author", "updated"];

fn extra_fields(header: &Header, known: &[&str]) -> BTreeMap<String, FieldValue> {
    header
        .iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Build a [`PlanRecord`] from a parsed document. Fails only on an invalid
/// `status`, which names the full enumeration in the error.
pub fn plan_from_document(id: &str, header: &Header, body: &str) -> anyhow::Result<PlanRecord> {
    let status = match get_scalar(header, "status") {
        Some(s) => s.parse::<PlanStatus>()?,
        None => PlanStatus::Proposed,
    };

    Ok(PlanRecord {
        id: id.to_string(),
        title: get_scalar(header, "title").unwrap_or_else(|| id.to_string()),
        status,
        author: get_scalar(header, "author"),
        created: get_scalar(header, "created"),
        updated: get_scalar(header, "updated"),
        started: get_scalar(header, "started"),
        completed: get_scalar(header, "completed"),
        topics: get_list(header, "topics"),
        body: body.to_string(),
        extra: extra_fields(header, &PLAN_KEYS),
    })
}

/// Build a [`SessionRecord`] from a parsed document. `file_stem` (the
/// date-named filename) doubles as identity and as the date fallback when
/// the header lacks one.
pub fn session_from_document(
    file_stem: &str,
    header: &Header,
    body: &str,
) -> anyhow::Result<SessionRecord> {
    let status = match get_scalar(header, "status") {
        Some(s) => s.parse::<SessionStatus>()?,
        None => SessionStatus::InProgress,
    };

    Ok(SessionRecord {
        id: file_stem.to_string(),
        date: get_scalar(header, "date").unwrap_or_else(|| file_stem.to_string()),
        status,
        topics: get_list(header, "topics"),
        files: get_list(header, "files"),
        plan: get_scalar(header, "plan"),
        body: body.to_string(),
        extra: extra_fields(header, &SESSION_KEYS),
    })
}

/// Build a [`LearnedRecord`] from a parsed document. Identity is the
/// relative path with separators and non-alphanumerics collapsed to `-`.
pub fn learned_from_document(rel_path: &str, header: &Header, body: &str) -> LearnedRecord {
    LearnedRecord {
        id: learned_id(rel_path),
        path: rel_path.to_string(),
        category: get_scalar(header, "category"),
        keywords: get_list(header, "keywords"),
        author: get_scalar(header, "author"),
        updated: get_scalar(header, "updated"),
        body: body.to_string(),
        extra: extra_fields(header, &LEARNED_KEYS),
    }
}

/// Collapse a relative path into a stable row-key-safe identifier:
/// `rust/error-handling.md` becomes `rust-error-handling-md`.
pub fn learned_id(rel_path: &str) -> String {
    let mut out = String::with_capacity(rel_path.len());
    let mut last_dash = true; // suppress a leading dash
    for c in rel_path.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}
