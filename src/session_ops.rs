//! Session lifecycle operations.
//!
//! One session per calendar day by convention. The body grows all day via
//! append/prepend/insert-relative edits; header fields (topics, files,
//! status, plan link) are updated in place through the same parse-edit-
//! serialize rewrite plans use.

use std::path::Path;

use anyhow::{bail, Result};
use chrono::Utc;

use crate::frontmatter::{self, get_list};
use crate::models::{CreateOutcome, FieldValue, Header, SessionStatus};
use crate::plan_ops::{load_document, write_document};
use crate::scanner;

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

const SESSION_TEMPLATE: &str = "## Goal\n\n## Progress\n";

/// Create the day's session document. An existing one is reported via
/// `created: false`, never clobbered.
pub fn create_session(root: &Path, date: Option<&str>, topics: &[String]) -> Result<CreateOutcome> {
    let date = match date {
        Some(d) => {
            chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|_| anyhow::anyhow!("Invalid session date: '{}'. Use YYYY-MM-DD.", d))?;
            d.to_string()
        }
        None => today(),
    };

    let path = scanner::session_path(root, &date);
    if path.exists() {
        return Ok(CreateOutcome {
            created: false,
            id: date,
        });
    }

    let mut header = Header::new();
    header.insert("date".to_string(), FieldValue::Scalar(date.clone()));
    header.insert(
        "status".to_string(),
        FieldValue::Scalar(SessionStatus::InProgress.to_string()),
    );
    header.insert("topics".to_string(), FieldValue::List(topics.to_vec()));
    header.insert("files".to_string(), FieldValue::List(Vec::new()));

    write_document(&path, &header, SESSION_TEMPLATE)?;
    Ok(CreateOutcome {
        created: true,
        id: date,
    })
}

// ============ Body edits ============

pub fn append_to_session(root: &Path, date: &str, text: &str) -> Result<()> {
    edit_body(root, date, |body| {
        if !body.is_empty() && !body.ends_with('\n') {
            body.push('\n');
        }
        body.push_str(text);
        body.push('\n');
        Ok(())
    })
}

pub fn prepend_to_session(root: &Path, date: &str, text: &str) -> Result<()> {
    edit_body(root, date, |body| {
        let mut new_body = String::with_capacity(text.len() + 1 + body.len());
        new_body.push_str(text);
        new_body.push('\n');
        new_body.push_str(body);
        *body = new_body;
        Ok(())
    })
}

/// Splice text after the first body line containing `pattern`. No match is
/// a validation error, so a typo surfaces instead of silently appending.
pub fn insert_after_pattern(root: &Path, date: &str, pattern: &str, text: &str) -> Result<()> {
    edit_body(root, date, |body| {
        let mut out = String::with_capacity(body.len() + text.len() + 1);
        let mut inserted = false;

        for line in body.lines() {
            out.push_str(line);
            out.push('\n');
            if !inserted && line.contains(pattern) {
                out.push_str(text);
                out.push('\n');
                inserted = true;
            }
        }

        if !inserted {
            bail!("no line matching '{}' in session {}", pattern, date);
        }
        *body = out;
        Ok(())
    })
}

fn edit_body<F>(root: &Path, date: &str, edit: F) -> Result<()>
where
    F: FnOnce(&mut String) -> Result<()>,
{
    let path = scanner::session_path(root, date);
    let (header, body) = load_document(&path, date)?;
    let mut body = body;
    edit(&mut body)?;
    write_document(&path, &header, &body)
}

// ============ Header edits ============

pub fn add_session_topic(root: &Path, date: &str, topic: &str) -> Result<()> {
    add_to_list(root, date, "topics", topic)
}

pub fn add_session_file(root: &Path, date: &str, file: &str) -> Result<()> {
    add_to_list(root, date, "files", file)
}

fn add_to_list(root: &Path, date: &str, key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{} entry must be non-empty", key);
    }

    let path = scanner::session_path(root, date);
    let (mut header, body) = load_document(&path, date)?;

    let mut items = get_list(&header, key);
    if items.iter().any(|i| i == value) {
        return Ok(()); // already present
    }
    items.push(value.to_string());
    header.insert(key.to_string(), FieldValue::List(items));

    write_document(&path, &header, &body)
}

pub fn set_session_status(root: &Path, date: &str, status: SessionStatus) -> Result<()> {
    let path = scanner::session_path(root, date);
    let (mut header, body) = load_document(&path, date)?;
    header.insert("status".to_string(), FieldValue::Scalar(status.to_string()));
    write_document(&path, &header, &body)
}

/// Link the session to the plan it advanced.
pub fn set_session_plan(root: &Path, date: &str, plan_id: &str) -> Result<()> {
    let path = scanner::session_path(root, date);
    let (mut header, body) = load_document(&path, date)?;
    header.insert(
        "plan".to_string(),
        FieldValue::Scalar(plan_id.to_string()),
    );
    write_document(&path, &header, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session_text(root: &Path, date: &str) -> (Header, String) {
        load_document(&scanner::session_path(root, date), date).unwrap()
    }

    #[test]
    fn test_create_session_once_per_day() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        let first = create_session(root, Some("2026-08-26"), &["auth".to_string()]).unwrap();
        assert!(first.created);
        assert_eq!(first.id, "2026-08-26");

        let second = create_session(root, Some("2026-08-26"), &[]).unwrap();
        assert!(!second.created);
        assert_eq!(second.id, "2026-08-26");

        // The original document is untouched.
        let (header, _) = session_text(root, "2026-08-26");
        assert_eq!(get_list(&header, "topics"), vec!["auth".to_string()]);
    }

    #[test]
    fn test_create_session_rejects_bad_date() {
        let tmp = TempDir::new().unwrap();
        assert!(create_session(tmp.path(), Some("August 26"), &[]).is_err());
    }

    #[test]
    fn test_append_and_prepend() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        create_session(root, Some("2026-08-26"), &[]).unwrap();

        append_to_session(root, "2026-08-26", "- wrapped up").unwrap();
        prepend_to_session(root, "2026-08-26", "> carried over from yesterday").unwrap();

        let (_, body) = session_text(root, "2026-08-26");
        assert!(body.starts_with("> carried over from yesterday\n"));
        assert!(body.ends_with("- wrapped up\n"));
    }

    #[test]
    fn test_insert_after_pattern() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        create_session(root, Some("2026-08-26"), &[]).unwrap();

        insert_after_pattern(root, "2026-08-26", "## Progress", "- fixed the scanner").unwrap();
        let (_, body) = session_text(root, "2026-08-26");
        assert!(body.contains("## Progress\n- fixed the scanner\n"));

        let err = insert_after_pattern(root, "2026-08-26", "## Nope", "x")
            .unwrap_err()
            .to_string();
        assert!(err.contains("## Nope"));
    }

    #[test]
    fn test_header_list_edits_deduplicate() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        create_session(root, Some("2026-08-26"), &[]).unwrap();

        add_session_topic(root, "2026-08-26", "auth").unwrap();
        add_session_topic(root, "2026-08-26", "auth").unwrap();
        add_session_file(root, "2026-08-26", "src/scanner.rs").unwrap();

        let (header, _) = session_text(root, "2026-08-26");
        assert_eq!(get_list(&header, "topics"), vec!["auth".to_string()]);
        assert_eq!(get_list(&header, "files"), vec!["src/scanner.rs".to_string()]);
    }

    #[test]
    fn test_status_and_plan_link() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        create_session(root, Some("2026-08-26"), &[]).unwrap();

        set_session_status(root, "2026-08-26", SessionStatus::Complete).unwrap();
        set_session_plan(root, "2026-08-26", "auth-rework").unwrap();

        let (header, _) = session_text(root, "2026-08-26");
        assert_eq!(
            frontmatter::get_scalar(&header, "status").as_deref(),
            Some("complete")
        );
        assert_eq!(
            frontmatter::get_scalar(&header, "plan").as_deref(),
            Some("auth-rework")
        );
    }
}
