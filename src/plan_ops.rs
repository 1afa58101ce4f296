//! Plan lifecycle operations.
//!
//! Plans are mutated only through these controlled rewrites: the header is
//! parsed, edited as a map, and serialized back, so unknown fields survive
//! every update. Status transitions append timestamp fields and never
//! overwrite one that is already set.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;

use crate::frontmatter;
use crate::models::{CreateOutcome, FieldValue, Header, PlanStatus};
use crate::scanner;

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

const PLAN_TEMPLATE: &str = "## Goal\n\n## Progress\n";

/// Create a new plan document plus the author's active-pointer side-record.
/// An existing plan with the same slug is reported, not raised.
pub fn create_plan(
    root: &Path,
    slug: &str,
    title: &str,
    author: &str,
    topics: &[String],
) -> Result<CreateOutcome> {
    if slug.is_empty() || !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        bail!("Invalid plan slug: '{}'. Use lowercase words joined by '-'.", slug);
    }
    if title.trim().is_empty() {
        bail!("Plan title must be non-empty.");
    }

    let path = scanner::plan_path(root, slug);
    if path.exists() {
        return Ok(CreateOutcome {
            created: false,
            id: slug.to_string(),
        });
    }

    let mut header = Header::new();
    header.insert("title".to_string(), FieldValue::Scalar(title.to_string()));
    header.insert(
        "status".to_string(),
        FieldValue::Scalar(PlanStatus::Proposed.to_string()),
    );
    header.insert("author".to_string(), FieldValue::Scalar(author.to_string()));
    header.insert("created".to_string(), FieldValue::Scalar(today()));
    header.insert("updated".to_string(), FieldValue::Scalar(today()));
    header.insert("topics".to_string(), FieldValue::List(topics.to_vec()));

    write_document(&path, &header, PLAN_TEMPLATE)?;
    write_pointer(root, author, slug)?;

    Ok(CreateOutcome {
        created: true,
        id: slug.to_string(),
    })
}

/// Transition a plan to a new status.
///
/// First entry into `active` sets `started`; entry into `complete` or
/// `cancelled` sets `completed`; neither is ever overwritten once present.
/// The author's active pointer follows the plan in and out of `active`.
pub fn set_plan_status(root: &Path, id: &str, new_status: PlanStatus) -> Result<()> {
    let path = scanner::plan_path(root, id);
    let (mut header, body) = load_document(&path, id)?;

    let current = match frontmatter::get_scalar(&header, "status") {
        Some(s) => s.parse::<PlanStatus>()?,
        None => PlanStatus::Proposed,
    };

    if current == new_status {
        bail!("Plan '{}' is already {}.", id, new_status);
    }
    if current == PlanStatus::Cancelled {
        bail!("Plan '{}' is cancelled; create a new plan instead.", id);
    }
    if current == PlanStatus::Complete && new_status != PlanStatus::Active {
        bail!(
            "Plan '{}' is complete; the only valid transition is back to active.",
            id
        );
    }

    header.insert(
        "status".to_string(),
        FieldValue::Scalar(new_status.to_string()),
    );
    header.insert("updated".to_string(), FieldValue::Scalar(today()));

    if new_status == PlanStatus::Active && !header.contains_key("started") {
        header.insert("started".to_string(), FieldValue::Scalar(today()));
    }
    if new_status.is_terminal() && !header.contains_key("completed") {
        header.insert("completed".to_string(), FieldValue::Scalar(today()));
    }

    write_document(&path, &header, &body)?;

    if let Some(author) = frontmatter::get_scalar(&header, "author") {
        if new_status == PlanStatus::Active {
            write_pointer(root, &author, id)?;
        } else {
            clear_pointer(root, &author, id)?;
        }
    }

    Ok(())
}

/// Append a progress note to the plan body and bump `updated`.
pub fn append_plan_progress(root: &Path, id: &str, text: &str) -> Result<()> {
    let path = scanner::plan_path(root, id);
    let (mut header, body) = load_document(&path, id)?;

    let mut body = body;
    if !body.is_empty() && !body.ends_with('\n') {
        body.push('\n');
    }
    body.push_str(text);
    body.push('\n');

    header.insert("updated".to_string(), FieldValue::Scalar(today()));
    write_document(&path, &header, &body)
}

/// Move a plan to the archival directory. Never hard-deletes: archived
/// plans sit outside the flat scan, so they drop out of the index while
/// the document itself survives.
pub fn archive_plan(root: &Path, id: &str) -> Result<()> {
    let path = scanner::plan_path(root, id);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("plan not found: {}", id))?;

    // Resolve the author before the move: failing afterwards would report
    // an error for an archive that already happened. A malformed header
    // does not block archiving; it only means no pointer to clear.
    let doc = frontmatter::parse(&text);
    let author = frontmatter::get_scalar(&doc.header, "author");

    let dest = scanner::archived_plan_path(root, id);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(&path, &dest)
        .with_context(|| format!("cannot archive {}", path.display()))?;

    // The pointer must not dangle into the archive.
    if let Some(author) = author {
        clear_pointer(root, &author, id)?;
    }
    Ok(())
}

/// Read the plan an author currently has in progress, if any.
pub fn read_pointer(root: &Path, author: &str) -> Result<Option<String>> {
    match std::fs::read_to_string(scanner::pointer_path(root, author)) {
        Ok(text) => {
            let id = text.trim().to_string();
            Ok((!id.is_empty()).then_some(id))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_pointer(root: &Path, author: &str, id: &str) -> Result<()> {
    let path = scanner::pointer_path(root, author);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, format!("{}\n", id))
        .with_context(|| format!("cannot write pointer {}", path.display()))?;
    Ok(())
}

/// Remove the pointer only if it still points at this plan; another plan
/// may have claimed it since.
fn clear_pointer(root: &Path, author: &str, id: &str) -> Result<()> {
    if read_pointer(root, author)?.as_deref() == Some(id) {
        std::fs::remove_file(scanner::pointer_path(root, author))?;
    }
    Ok(())
}

pub(crate) fn load_document(path: &Path, id: &str) -> Result<(Header, String)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("document not found: {}", id))?;
    let doc = frontmatter::parse(&text);
    if let Some(e) = doc.errors.first() {
        // A controlled rewrite on top of a header we could not parse would
        // destroy whatever the author meant; surface it instead.
        bail!("{}: {}", path.display(), e);
    }
    Ok((doc.header, doc.body))
}

pub(crate) fn write_document(path: &Path, header: &Header, body: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, frontmatter::serialize(header, body))
        .with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}
