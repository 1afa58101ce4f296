//! Flat-index storage backend.
//!
//! Maintains two serialized JSON indexes — team (derived from the shared,
//! version-controlled corpus) and personal (derived from the private
//! corpus) — each rebuilt by scanning and parsing its source tree. The
//! indexes are caches, not sources of truth: either can be regenerated at
//! any time from its documents. Queries run against a merged view in which
//! personal entries take precedence on identity collision.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::config::Config;
use crate::frontmatter;
use crate::models::{KnowledgeIndex, RebuildSummary, INDEX_VERSION};
use crate::query::{
    self, PlanFilters, PlanQueryResponse, SearchResponse, SearchScope, SessionFilters,
    SessionQueryResponse,
};
use crate::scanner;
use crate::store::KnowledgeStore;

/// One source tree and the index file derived from it.
#[derive(Debug, Clone)]
struct IndexSource {
    root: PathBuf,
    index_path: PathBuf,
}

pub struct IndexStore {
    team: IndexSource,
    personal: Option<IndexSource>,
    auto_rebuild: bool,
}

impl IndexStore {
    pub fn new(config: &Config) -> Self {
        Self {
            team: IndexSource {
                root: config.knowledge.root.clone(),
                index_path: config.index.team_path.clone(),
            },
            personal: config.knowledge.personal_root.as_ref().map(|root| IndexSource {
                root: root.clone(),
                index_path: config.index.personal_path.clone(),
            }),
            auto_rebuild: config.index.auto_rebuild,
        }
    }

    /// Rebuild one index file from its source tree and write it atomically.
    fn rebuild_one(source: &IndexSource) -> Result<(KnowledgeIndex, Vec<String>)> {
        let (index, errors) = build_index(&source.root)?;
        write_index_atomic(&source.index_path, &index)?;
        Ok((index, errors))
    }

    /// The merged team + personal view queries run against. Honors the
    /// freshness policy: with `auto_rebuild` every call rescans first,
    /// otherwise the serialized files are trusted as-is.
    fn merged_view(&self) -> Result<KnowledgeIndex> {
        let team = if self.auto_rebuild {
            Self::rebuild_one(&self.team)?.0
        } else {
            load_index(&self.team.index_path)?
        };

        let personal = match &self.personal {
            Some(source) if self.auto_rebuild => Some(Self::rebuild_one(source)?.0),
            Some(source) => Some(load_index(&source.index_path)?),
            None => None,
        };

        Ok(match personal {
            Some(personal) => merge_indexes(team, personal),
            None => team,
        })
    }
}

#[async_trait]
impl KnowledgeStore for IndexStore {
    async fn query_plans(&self, filters: &PlanFilters) -> Result<PlanQueryResponse> {
        filters.validate()?;
        let view = self.merged_view()?;
        let plans: Vec<_> = view.plans.into_iter().filter(|p| filters.matches(p)).collect();
        Ok(PlanQueryResponse {
            count: plans.len(),
            plans,
        })
    }

    async fn query_sessions(&self, filters: &SessionFilters) -> Result<SessionQueryResponse> {
        filters.validate()?;
        let view = self.merged_view()?;
        let sessions: Vec<_> = view
            .sessions
            .into_iter()
            .filter(|s| filters.matches(s))
            .collect();
        Ok(SessionQueryResponse {
            count: sessions.len(),
            sessions,
        })
    }

    async fn search(&self, query: &str, scope: SearchScope) -> Result<SearchResponse> {
        let view = self.merged_view()?;
        Ok(query::search_records(
            query,
            scope,
            &view.plans,
            &view.sessions,
            &view.learned,
        ))
    }

    async fn rebuild_index(&self) -> Result<RebuildSummary> {
        let (team, mut errors) = Self::rebuild_one(&self.team)?;
        let mut summary = RebuildSummary {
            plans: team.plans.len(),
            sessions: team.sessions.len(),
            learned: team.learned.len(),
            errors: Vec::new(),
        };

        if let Some(source) = &self.personal {
            let (personal, personal_errors) = Self::rebuild_one(source)?;
            summary.plans += personal.plans.len();
            summary.sessions += personal.sessions.len();
            summary.learned += personal.learned.len();
            errors.extend(personal_errors);
        }

        summary.errors = errors;
        Ok(summary)
    }

    async fn close(&self) {
        // Index files are opened per operation; nothing to release.
    }
}

/// Scan and parse a source tree into an in-memory index. A document that
/// fails to parse is excluded and reported; the rebuild never aborts.
pub fn build_index(root: &Path) -> Result<(KnowledgeIndex, Vec<String>)> {
    let scan = scanner::scan_root(root)?;
    let mut errors = scan.errors.clone();

    let mut index = KnowledgeIndex {
        version: INDEX_VERSION,
        updated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        ..Default::default()
    };

    for path in &scan.plans {
        let Some(id) = scanner::plan_id_from_path(path) else {
            continue;
        };
        match read_and_parse(path, &mut errors) {
            Some(doc) => match frontmatter::plan_from_document(&id, &doc.header, &doc.body) {
                Ok(plan) => index.plans.push(plan),
                Err(e) => errors.push(format!("{}: {}", path.display(), e)),
            },
            None => continue,
        }
    }

    for path in &scan.sessions {
        let Some(stem) = scanner::session_id_from_path(path) else {
            continue;
        };
        match read_and_parse(path, &mut errors) {
            Some(doc) => match frontmatter::session_from_document(&stem, &doc.header, &doc.body) {
                Ok(session) => index.sessions.push(session),
                Err(e) => errors.push(format!("{}: {}", path.display(), e)),
            },
            None => continue,
        }
    }

    for file in &scan.learned {
        if let Some(doc) = read_and_parse(&file.path, &mut errors) {
            index
                .learned
                .push(frontmatter::learned_from_document(&file.rel_path, &doc.header, &doc.body));
        }
    }

    Ok((index, errors))
}

/// Read and parse one document. Parse errors disqualify the document from
/// the index (the raw file is still the source of truth); read errors are
/// recorded the same way.
fn read_and_parse(path: &Path, errors: &mut Vec<String>) -> Option<frontmatter::ParsedDocument> {
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

/// Load a serialized index. A missing file is an empty index, not an error.
pub fn load_index(path: &Path) -> Result<KnowledgeIndex> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text)
            .with_context(|| format!("corrupt index file: {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(KnowledgeIndex {
            version: INDEX_VERSION,
            ..Default::default()
        }),
        Err(e) => Err(e).with_context(|| format!("cannot read index: {}", path.display())),
    }
}

/// Serialize to a temp file, then rename over the target, so a concurrent
/// reader never observes a half-written index.
pub fn write_index_atomic(path: &Path, index: &KnowledgeIndex) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    let text = serde_json::to_string_pretty(index)?;
    std::fs::write(&tmp, text)
        .with_context(|| format!("cannot write index: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("cannot replace index: {}", path.display()))?;
    Ok(())
}

/// Pure merge of the two read-only views: concatenation with personal
/// entries winning on identity collision. Neither input is mutated on
/// disk, so no three-way merge can ever be needed.
pub fn merge_indexes(team: KnowledgeIndex, personal: KnowledgeIndex) -> KnowledgeIndex {
    fn merge_by_id<T, F>(team: Vec<T>, personal: Vec<T>, id: F) -> Vec<T>
    where
        F: Fn(&T) -> String,
    {
        let mut by_id: BTreeMap<String, T> = BTreeMap::new();
        for item in team {
            by_id.insert(id(&item), item);
        }
        for item in personal {
            by_id.insert(id(&item), item);
        }
        by_id.into_values().collect()
    }

    KnowledgeIndex {
        version: team.version,
        updated_at: team.updated_at.max(personal.updated_at),
        plans: merge_by_id(team.plans, personal.plans, |p| p.id.clone()),
        sessions: merge_by_id(team.sessions, personal.sessions, |s| s.id.clone()),
        learned: merge_by_id(team.learned, personal.learned, |l| l.id.clone()),
    }
}
