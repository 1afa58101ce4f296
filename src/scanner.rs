//! Knowledge-root scanning.
//!
//! Walks a knowledge root and partitions its files into the three document
//! categories. `sessions/` and `plans/` are flat listings; `learned/` is a
//! recursive walk. Per-file I/O failures are collected, never thrown, so
//! one unreadable entry cannot abandon a category.

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

pub const SESSIONS_DIR: &str = "sessions";
pub const PLANS_DIR: &str = "plans";
pub const LEARNED_DIR: &str = "learned";
pub const ARCHIVE_DIR: &str = "archive";

/// Filename prefix distinguishing plan documents from their sibling
/// active-pointer files.
pub const PLAN_PREFIX: &str = "plan-";

const DOC_EXTENSION: &str = "md";
const POINTER_EXTENSION: &str = "active";

/// A file found under `learned/`, with its root-relative path preserved
/// for identity derivation.
#[derive(Debug, Clone)]
pub struct LearnedFile {
    pub path: PathBuf,
    pub rel_path: String,
}

/// Everything discovered under a knowledge root.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub sessions: Vec<PathBuf>,
    pub plans: Vec<PathBuf>,
    pub learned: Vec<LearnedFile>,
    pub total: usize,
    pub errors: Vec<String>,
}

/// Scan a knowledge root. A missing root or missing category directory is
/// not an error — it yields an empty result for that category.
pub fn scan_root(root: &Path) -> Result<ScanResult> {
    let mut result = ScanResult::default();

    result.sessions = scan_flat(
        &root.join(SESSIONS_DIR),
        None,
        &mut result.errors,
    );
    result.plans = scan_flat(
        &root.join(PLANS_DIR),
        Some(PLAN_PREFIX),
        &mut result.errors,
    );
    result.learned = scan_learned(&root.join(LEARNED_DIR), &mut result.errors)?;

    result.total = result.sessions.len() + result.plans.len() + result.learned.len();
    Ok(result)
}

/// Flat (non-recursive) listing filtered by the `.md` extension and an
/// optional filename prefix.
fn scan_flat(dir: &Path, prefix: Option<&str>, errors: &mut Vec<String>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return files,
        Err(e) => {
            errors.push(format!("cannot read {}: {}", dir.display(), e));
            return files;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                errors.push(format!("cannot read entry in {}: {}", dir.display(), e));
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(DOC_EXTENSION) {
            continue;
        }
        if let Some(prefix) = prefix {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(prefix) {
                continue;
            }
        }

        files.push(path);
    }

    // Sort for deterministic ordering
    files.sort();
    files
}

/// Recursive walk of `learned/`, collecting every `**/*.md` file and
/// preserving its relative path.
fn scan_learned(dir: &Path, errors: &mut Vec<String>) -> Result<Vec<LearnedFile>> {
    let mut files = Vec::new();

    if !dir.exists() {
        return Ok(files);
    }

    let include_set = build_globset(&["**/*.md".to_string()])?;

    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                errors.push(format!("cannot walk {}: {}", dir.display(), e));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(LearnedFile {
            path: path.to_path_buf(),
            rel_path: rel_str,
        });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

// ============ Path derivation ============

/// Derive a plan identity from its filename: `plan-auth-rework.md`
/// becomes `auth-rework`.
pub fn plan_id_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix(PLAN_PREFIX).map(String::from)
}

pub fn session_id_from_path(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(String::from)
}

pub fn plan_path(root: &Path, id: &str) -> PathBuf {
    root.join(PLANS_DIR)
        .join(format!("{}{}.{}", PLAN_PREFIX, id, DOC_EXTENSION))
}

pub fn session_path(root: &Path, date: &str) -> PathBuf {
    root.join(SESSIONS_DIR).join(format!("{}.{}", date, DOC_EXTENSION))
}

/// Per-author active-pointer file. The `.active` extension keeps pointers
/// out of the flat plan scan.
pub fn pointer_path(root: &Path, author: &str) -> PathBuf {
    root.join(PLANS_DIR).join(format!("{}.{}", author, POINTER_EXTENSION))
}

pub fn archived_plan_path(root: &Path, id: &str) -> PathBuf {
    root.join(PLANS_DIR)
        .join(ARCHIVE_DIR)
        .join(format!("{}{}.{}", PLAN_PREFIX, id, DOC_EXTENSION))
}
