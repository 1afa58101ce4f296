//! One-time (but safely re-runnable) migration of a flat-file corpus into
//! the relational backend.
//!
//! Ordering: plans, then learned patterns, then sessions — sessions may
//! reference a plan id and the schema enforces that reference, so plans
//! must land first. Idempotence comes from an explicit existence probe
//! before every insert: a repeated run skips everything it already moved.
//! Per-file failures are collected in the summary; only an unopenable
//! destination is fatal (and that is raised by [`SqliteStore::open`],
//! before this coordinator ever runs).

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::frontmatter;
use crate::models::MigrationSummary;
use crate::scanner;
use crate::sqlite_store::SqliteStore;

pub async fn migrate_corpus(root: &Path, store: &SqliteStore) -> Result<MigrationSummary> {
    let scan = scanner::scan_root(root)?;

    let mut summary = MigrationSummary {
        total_files: scan.total as u64,
        errors: scan.errors.clone(),
        ..Default::default()
    };

    // Plans first: sessions reference them.
    for path in &scan.plans {
        let Some(id) = scanner::plan_id_from_path(path) else {
            continue;
        };
        let Some(doc) = read_parsed(path, &mut summary.errors) else {
            continue;
        };

        let mut plan = match frontmatter::plan_from_document(&id, &doc.header, &doc.body) {
            Ok(plan) => plan,
            Err(e) => {
                summary.errors.push(format!("{}: {}", path.display(), e));
                continue;
            }
        };
        fill_timestamps(path, &mut plan.created, &mut plan.updated);

        match store.plan_exists(&plan.id).await? {
            true => summary.skipped += 1,
            false => match store.insert_plan(&plan).await {
                Ok(()) => summary.plans_migrated += 1,
                Err(e) => summary.errors.push(format!("{}: {}", path.display(), e)),
            },
        }
    }

    // Learned patterns: plan-like rows, unordered relative to sessions.
    for file in &scan.learned {
        let Some(doc) = read_parsed(&file.path, &mut summary.errors) else {
            continue;
        };

        let mut pattern =
            frontmatter::learned_from_document(&file.rel_path, &doc.header, &doc.body);
        let mut created = None;
        fill_timestamps(&file.path, &mut created, &mut pattern.updated);

        match store.plan_exists(&pattern.id).await? {
            true => summary.skipped += 1,
            false => match store.insert_learned(&pattern).await {
                Ok(()) => summary.learned_migrated += 1,
                Err(e) => summary
                    .errors
                    .push(format!("{}: {}", file.path.display(), e)),
            },
        }
    }

    // Sessions last.
    for path in &scan.sessions {
        let Some(stem) = scanner::session_id_from_path(path) else {
            continue;
        };
        let Some(doc) = read_parsed(path, &mut summary.errors) else {
            continue;
        };

        let mut session = match frontmatter::session_from_document(&stem, &doc.header, &doc.body)
        {
            Ok(session) => session,
            Err(e) => {
                summary.errors.push(format!("{}: {}", path.display(), e));
                continue;
            }
        };

        // Identity is the header date. A session without one is never
        // dropped: it gets a synthesized identity, and we flag the loss of
        // date-based queryability instead of hiding it.
        match frontmatter::get_scalar(&doc.header, "date") {
            Some(date) => session.id = date,
            None => {
                session.id = format!("session-{}", Uuid::new_v4());
                let mut created = None;
                let mut modified = None;
                fill_timestamps(path, &mut created, &mut modified);
                session.date = modified.unwrap_or_default();
                summary.errors.push(format!(
                    "{}: missing date field; migrated with synthesized identity {}",
                    path.display(),
                    session.id
                ));
            }
        }

        match store.session_exists(&session.id).await? {
            true => summary.skipped += 1,
            false => match store.insert_session(&session).await {
                Ok(()) => summary.sessions_migrated += 1,
                Err(e) => summary.errors.push(format!("{}: {}", path.display(), e)),
            },
        }
    }

    Ok(summary)
}

fn read_parsed(
    path: &Path,
    errors: &mut Vec<String>,
) -> Option<frontmatter::ParsedDocument> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            errors.push(format!("{}: {}", path.display(), e));
            return None;
        }
    };

    let doc = frontmatter::parse(&text);
    if !doc.errors.is_empty() {
        for e in &doc.errors {
            errors.push(format!("{}: {}", path.display(), e));
        }
        return None;
    }
    Some(doc)
}

/// Every migrated record gets non-null temporal fields: a header without
/// created/updated falls back to filesystem timestamps (creation time is
/// not available on every platform, so it degrades to modification time,
/// then to today).
fn fill_timestamps(path: &Path, created: &mut Option<String>, updated: &mut Option<String>) {
    if created.is_some() && updated.is_some() {
        return;
    }

    let metadata = std::fs::metadata(path).ok();
    let modified = metadata
        .as_ref()
        .and_then(|m| m.modified().ok())
        .map(system_time_date);
    let born = metadata
        .as_ref()
        .and_then(|m| m.created().ok())
        .map(system_time_date)
        .or_else(|| modified.clone());

    let today = Utc::now().format("%Y-%m-%d").to_string();
    if created.is_none() {
        *created = Some(born.unwrap_or_else(|| today.clone()));
    }
    if updated.is_none() {
        *updated = Some(modified.unwrap_or(today));
    }
}

fn system_time_date(t: std::time::SystemTime) -> String {
    DateTime::<Utc>::from(t).format("%Y-%m-%d").to_string()
}
