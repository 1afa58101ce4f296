//! Relational storage backend.
//!
//! Stores parsed records in SQLite tables with indexed columns, scoped by a
//! project row that is created on first use. Learned patterns live in the
//! `plans` table as plan-like rows with `kind = 'learned'`; plan queries
//! constrain `kind = 'plan'` so the two never mix, while search spans both.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::db;
use crate::models::{
    FieldValue, LearnedRecord, PlanRecord, PlanStatus, RebuildSummary, SessionRecord,
    SessionStatus,
};
use crate::query::{
    self, PlanFilters, PlanQueryResponse, SearchResponse, SearchScope, SessionFilters,
    SessionQueryResponse,
};
use crate::store::KnowledgeStore;

pub const KIND_PLAN: &str = "plan";
pub const KIND_LEARNED: &str = "learned";

pub struct SqliteStore {
    pool: SqlitePool,
    project: String,
}

impl SqliteStore {
    /// Open the database, run schema migrations, and ensure the project
    /// row exists. Failure to open is the one fatal precondition.
    pub async fn open(db_path: &std::path::Path, project: &str) -> Result<Self> {
        let pool = db::connect(db_path)
            .await
            .with_context(|| format!("cannot open storage at {}", db_path.display()))?;
        run_migrations(&pool).await?;
        ensure_project(&pool, project).await?;
        Ok(Self {
            pool,
            project: project.to_string(),
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    // ============ Existence probes ============

    pub async fn plan_exists(&self, id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM plans WHERE project_id = ? AND id = ?")
            .bind(&self.project)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn session_exists(&self, id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM sessions WHERE project_id = ? AND id = ?")
            .bind(&self.project)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    // ============ Inserts ============

    pub async fn insert_plan(&self, plan: &PlanRecord) -> Result<()> {
        self.insert_plan_row(plan, KIND_PLAN).await
    }

    /// Learned patterns are specialized plan-like rows: path as title,
    /// keywords as topics.
    pub async fn insert_learned(&self, pattern: &LearnedRecord) -> Result<()> {
        let mut extra = pattern.extra.clone();
        if let Some(category) = &pattern.category {
            extra.insert("category".to_string(), FieldValue::Scalar(category.clone()));
        }
        extra.insert(
            "path".to_string(),
            FieldValue::Scalar(pattern.path.clone()),
        );

        let row = PlanRecord {
            id: pattern.id.clone(),
            title: pattern.path.clone(),
            status: PlanStatus::Complete,
            author: pattern.author.clone(),
            created: None,
            updated: pattern.updated.clone(),
            started: None,
            completed: None,
            topics: pattern.keywords.clone(),
            body: pattern.body.clone(),
            extra,
        };
        self.insert_plan_row(&row, KIND_LEARNED).await
    }

    async fn insert_plan_row(&self, plan: &PlanRecord, kind: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO plans (project_id, id, kind, title, status, author,
                               created, updated, started, completed, topics, body, extra)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.project)
        .bind(&plan.id)
        .bind(kind)
        .bind(&plan.title)
        .bind(plan.status.as_str())
        .bind(&plan.author)
        .bind(&plan.created)
        .bind(&plan.updated)
        .bind(&plan.started)
        .bind(&plan.completed)
        .bind(serde_json::to_string(&plan.topics)?)
        .bind(&plan.body)
        .bind(serde_json::to_string(&plan.extra)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a session. A `plan` reference to a plan id not yet migrated
    /// fails the foreign key check — the schema enforces the plans-first
    /// ordering the migration coordinator guarantees.
    pub async fn insert_session(&self, session: &SessionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (project_id, id, date, status, topics, files, plan_id, body, extra)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.project)
        .bind(&session.id)
        .bind(&session.date)
        .bind(session.status.as_str())
        .bind(serde_json::to_string(&session.topics)?)
        .bind(serde_json::to_string(&session.files)?)
        .bind(&session.plan)
        .bind(&session.body)
        .bind(serde_json::to_string(&session.extra)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ============ Row fetching ============

    /// Indexable filters compile to WHERE clauses; the substring topic
    /// filter cannot use an index and stays in memory.
    async fn fetch_plan_rows(
        &self,
        kind: &str,
        filters: Option<&PlanFilters>,
    ) -> Result<Vec<PlanRecord>> {
        let mut sql = String::from(
            "SELECT id, title, status, author, created, updated, started, completed, \
             topics, body, extra FROM plans WHERE project_id = ? AND kind = ?",
        );
        let mut binds = vec![self.project.clone(), kind.to_string()];

        if let Some(filters) = filters {
            if let Some(ref status) = filters.status {
                sql.push_str(" AND status = ?");
                binds.push(status.parse::<PlanStatus>()?.as_str().to_string());
            }
            if let Some(ref author) = filters.author {
                sql.push_str(" AND author = ?");
                binds.push(author.clone());
            }
            // `updated >= ?` is false for NULL, matching the flat backend's
            // treatment of records without an updated date.
            if let Some(ref after) = filters.updated_after {
                sql.push_str(" AND updated >= ?");
                binds.push(after.clone());
            }
            if let Some(ref before) = filters.updated_before {
                sql.push_str(" AND updated <= ?");
                binds.push(before.clone());
            }
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_plan).collect()
    }

    async fn fetch_session_rows(
        &self,
        filters: Option<&SessionFilters>,
    ) -> Result<Vec<SessionRecord>> {
        let mut sql = String::from(
            "SELECT id, date, status, topics, files, plan_id, body, extra \
             FROM sessions WHERE project_id = ?",
        );
        let mut binds = vec![self.project.clone()];

        if let Some(filters) = filters {
            if let Some(ref status) = filters.status {
                sql.push_str(" AND status = ?");
                binds.push(status.parse::<SessionStatus>()?.as_str().to_string());
            }
            if let Some(ref after) = filters.date_after {
                sql.push_str(" AND date >= ?");
                binds.push(after.clone());
            }
            if let Some(ref before) = filters.date_before {
                sql.push_str(" AND date <= ?");
                binds.push(before.clone());
            }
        }
        sql.push_str(" ORDER BY date");

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_session).collect()
    }

    /// Fetch rows where any query keyword appears in the title, topics, or
    /// body. A phrase hit implies a hit for each of its keywords, so this
    /// is a superset of everything the scorer can rank; candidates are
    /// re-scored in memory. SQLite `lower()` folds ASCII only.
    async fn fetch_plan_candidates(
        &self,
        kind: &str,
        patterns: &[String],
    ) -> Result<Vec<PlanRecord>> {
        let mut sql = String::from(
            "SELECT id, title, status, author, created, updated, started, completed, \
             topics, body, extra FROM plans WHERE project_id = ? AND kind = ? AND (",
        );
        let per_keyword =
            vec!["lower(title) LIKE ? OR lower(topics) LIKE ? OR lower(body) LIKE ?"; patterns.len()];
        sql.push_str(&per_keyword.join(" OR "));
        sql.push_str(") ORDER BY id");

        let mut query = sqlx::query(&sql).bind(&self.project).bind(kind);
        for pattern in patterns {
            query = query.bind(pattern).bind(pattern).bind(pattern);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_plan).collect()
    }

    async fn fetch_session_candidates(&self, patterns: &[String]) -> Result<Vec<SessionRecord>> {
        let mut sql = String::from(
            "SELECT id, date, status, topics, files, plan_id, body, extra \
             FROM sessions WHERE project_id = ? AND (",
        );
        let per_keyword =
            vec!["lower(date) LIKE ? OR lower(topics) LIKE ? OR lower(body) LIKE ?"; patterns.len()];
        sql.push_str(&per_keyword.join(" OR "));
        sql.push_str(") ORDER BY date");

        let mut query = sqlx::query(&sql).bind(&self.project);
        for pattern in patterns {
            query = query.bind(pattern).bind(pattern).bind(pattern);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_session).collect()
    }
}

fn like_patterns(query_text: &str) -> Vec<String> {
    query_text
        .to_lowercase()
        .split_whitespace()
        .map(|kw| format!("%{}%", kw))
        .collect()
}

fn parse_json_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn parse_json_extra(raw: &str) -> BTreeMap<String, FieldValue> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn row_to_plan(row: &sqlx::sqlite::SqliteRow) -> Result<PlanRecord> {
    let status: String = row.get("status");
    let topics: String = row.get("topics");
    let extra: String = row.get("extra");
    Ok(PlanRecord {
        id: row.get("id"),
        title: row.get("title"),
        status: status.parse()?,
        author: row.get("author"),
        created: row.get("created"),
        updated: row.get("updated"),
        started: row.get("started"),
        completed: row.get("completed"),
        topics: parse_json_list(&topics),
        body: row.get("body"),
        extra: parse_json_extra(&extra),
    })
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord> {
    let status: String = row.get("status");
    let topics: String = row.get("topics");
    let files: String = row.get("files");
    let extra: String = row.get("extra");
    Ok(SessionRecord {
        id: row.get("id"),
        date: row.get("date"),
        status: status.parse()?,
        topics: parse_json_list(&topics),
        files: parse_json_list(&files),
        plan: row.get("plan_id"),
        body: row.get("body"),
        extra: parse_json_extra(&extra),
    })
}

fn row_to_learned(plan: PlanRecord) -> LearnedRecord {
    let mut extra = plan.extra;
    let category = match extra.remove("category") {
        Some(FieldValue::Scalar(s)) => Some(s),
        other => {
            if let Some(v) = other {
                extra.insert("category".to_string(), v);
            }
            None
        }
    };
    let path = match extra.remove("path") {
        Some(FieldValue::Scalar(s)) => s,
        _ => plan.title.clone(),
    };
    LearnedRecord {
        id: plan.id,
        path,
        category,
        keywords: plan.topics,
        author: plan.author,
        updated: plan.updated,
        body: plan.body,
        extra,
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn query_plans(&self, filters: &PlanFilters) -> Result<PlanQueryResponse> {
        filters.validate()?;
        let plans: Vec<_> = self
            .fetch_plan_rows(KIND_PLAN, Some(filters))
            .await?
            .into_iter()
            .filter(|p| filters.matches(p))
            .collect();
        Ok(PlanQueryResponse {
            count: plans.len(),
            plans,
        })
    }

    async fn query_sessions(&self, filters: &SessionFilters) -> Result<SessionQueryResponse> {
        filters.validate()?;
        let sessions: Vec<_> = self
            .fetch_session_rows(Some(filters))
            .await?
            .into_iter()
            .filter(|s| filters.matches(s))
            .collect();
        Ok(SessionQueryResponse {
            count: sessions.len(),
            sessions,
        })
    }

    async fn search(&self, query: &str, scope: SearchScope) -> Result<SearchResponse> {
        let patterns = like_patterns(query);
        if patterns.is_empty() {
            return Ok(SearchResponse {
                count: 0,
                results: Vec::new(),
            });
        }

        let plans = if matches!(scope, SearchScope::All | SearchScope::Plans) {
            self.fetch_plan_candidates(KIND_PLAN, &patterns).await?
        } else {
            Vec::new()
        };
        let sessions = if matches!(scope, SearchScope::All | SearchScope::Sessions) {
            self.fetch_session_candidates(&patterns).await?
        } else {
            Vec::new()
        };
        let learned: Vec<_> = if matches!(scope, SearchScope::All | SearchScope::Learned) {
            self.fetch_plan_candidates(KIND_LEARNED, &patterns)
                .await?
                .into_iter()
                .map(row_to_learned)
                .collect()
        } else {
            Vec::new()
        };

        // Same scoring as the flat backend, so ranking is identical.
        Ok(query::search_records(query, scope, &plans, &sessions, &learned))
    }

    async fn rebuild_index(&self) -> Result<RebuildSummary> {
        // Schema migration is the derived state here; re-running it is an
        // idempotent no-op when current.
        run_migrations(&self.pool).await?;

        let plans: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM plans WHERE project_id = ? AND kind = 'plan'",
        )
        .bind(&self.project)
        .fetch_one(&self.pool)
        .await?;
        let learned: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM plans WHERE project_id = ? AND kind = 'learned'",
        )
        .bind(&self.project)
        .fetch_one(&self.pool)
        .await?;
        let sessions: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE project_id = ?")
                .bind(&self.project)
                .fetch_one(&self.pool)
                .await?;

        Ok(RebuildSummary {
            plans: plans as usize,
            sessions: sessions as usize,
            learned: learned as usize,
            errors: Vec::new(),
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

// ============ Schema ============

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plans (
            project_id TEXT NOT NULL,
            id TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'plan',
            title TEXT NOT NULL,
            status TEXT NOT NULL,
            author TEXT,
            created TEXT,
            updated TEXT,
            started TEXT,
            completed TEXT,
            topics TEXT NOT NULL DEFAULT '[]',
            body TEXT NOT NULL DEFAULT '',
            extra TEXT NOT NULL DEFAULT '{}',
            PRIMARY KEY (project_id, id),
            FOREIGN KEY (project_id) REFERENCES projects(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            project_id TEXT NOT NULL,
            id TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            topics TEXT NOT NULL DEFAULT '[]',
            files TEXT NOT NULL DEFAULT '[]',
            plan_id TEXT,
            body TEXT NOT NULL DEFAULT '',
            extra TEXT NOT NULL DEFAULT '{}',
            PRIMARY KEY (project_id, id),
            FOREIGN KEY (project_id) REFERENCES projects(id),
            FOREIGN KEY (project_id, plan_id) REFERENCES plans(project_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Secondary indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_plans_status ON plans(project_id, status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_plans_updated ON plans(project_id, updated)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_date ON sessions(project_id, date)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the project row on first use; a duplicate key is not an error.
pub async fn ensure_project(pool: &SqlitePool, project: &str) -> Result<()> {
    let now = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    sqlx::query(
        "INSERT OR IGNORE INTO projects (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(project)
    .bind(project)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlanStatus, SessionStatus};
    use tempfile::TempDir;

    async fn open_store(tmp: &TempDir) -> SqliteStore {
        SqliteStore::open(&tmp.path().join("test.sqlite"), "default")
            .await
            .unwrap()
    }

    fn sample_plan(id: &str, status: PlanStatus) -> PlanRecord {
        PlanRecord {
            id: id.to_string(),
            title: format!("Plan {}", id),
            status,
            author: Some("alice".to_string()),
            created: Some("2026-08-01".to_string()),
            updated: Some("2026-08-20".to_string()),
            started: None,
            completed: None,
            topics: vec!["auth".to_string()],
            body: "## Goal\nShip.\n".to_string(),
            extra: BTreeMap::new(),
        }
    }

    fn sample_session(id: &str, plan: Option<&str>) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            date: id.to_string(),
            status: SessionStatus::Complete,
            topics: vec!["auth".to_string()],
            files: vec!["src/lib.rs".to_string()],
            plan: plan.map(String::from),
            body: "## Progress\nWorked on auth.\n".to_string(),
            extra: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store.close().await;
        let store = open_store(&tmp).await;
        store.close().await;
    }

    #[tokio::test]
    async fn test_insert_and_query_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        store.insert_plan(&sample_plan("auth", PlanStatus::Active)).await.unwrap();
        store.insert_plan(&sample_plan("docs", PlanStatus::Complete)).await.unwrap();

        let response = store
            .query_plans(&PlanFilters {
                status: Some("active".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.count, 1);
        assert_eq!(response.plans[0], sample_plan("auth", PlanStatus::Active));
        store.close().await;
    }

    #[tokio::test]
    async fn test_session_fk_requires_plan() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        // Referencing an unmigrated plan fails the foreign key.
        let orphan = sample_session("2026-08-20", Some("auth"));
        assert!(store.insert_session(&orphan).await.is_err());

        store.insert_plan(&sample_plan("auth", PlanStatus::Active)).await.unwrap();
        store.insert_session(&orphan).await.unwrap();

        let response = store.query_sessions(&SessionFilters::default()).await.unwrap();
        assert_eq!(response.count, 1);
        assert_eq!(response.sessions[0].plan.as_deref(), Some("auth"));
        store.close().await;
    }

    #[tokio::test]
    async fn test_learned_rows_do_not_leak_into_plan_queries() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        store.insert_plan(&sample_plan("auth", PlanStatus::Active)).await.unwrap();
        store
            .insert_learned(&LearnedRecord {
                id: "rust-errors-md".to_string(),
                path: "rust/errors.md".to_string(),
                category: Some("rust".to_string()),
                keywords: vec!["errors".to_string()],
                author: None,
                updated: Some("2026-08-10".to_string()),
                body: "Use anyhow at the edges.".to_string(),
                extra: BTreeMap::new(),
            })
            .await
            .unwrap();

        let plans = store.query_plans(&PlanFilters::default()).await.unwrap();
        assert_eq!(plans.count, 1);
        assert_eq!(plans.plans[0].id, "auth");

        let hits = store.search("anyhow", SearchScope::Learned).await.unwrap();
        assert_eq!(hits.count, 1);
        assert_eq!(hits.results[0].kind, "learned");
        assert_eq!(hits.results[0].title, "rust/errors.md");
        store.close().await;
    }

    #[tokio::test]
    async fn test_date_filter_excludes_rows_without_updated() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        store.insert_plan(&sample_plan("dated", PlanStatus::Active)).await.unwrap();
        let mut undated = sample_plan("undated", PlanStatus::Active);
        undated.updated = None;
        store.insert_plan(&undated).await.unwrap();

        let response = store
            .query_plans(&PlanFilters {
                updated_after: Some("2026-08-01".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.count, 1);
        assert_eq!(response.plans[0].id, "dated");
        store.close().await;
    }

    #[tokio::test]
    async fn test_author_status_and_date_filters_intersect() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        store.insert_plan(&sample_plan("auth", PlanStatus::Active)).await.unwrap();
        let mut by_bob = sample_plan("docs", PlanStatus::Active);
        by_bob.author = Some("bob".to_string());
        store.insert_plan(&by_bob).await.unwrap();
        store.insert_plan(&sample_plan("infra", PlanStatus::Complete)).await.unwrap();

        let response = store
            .query_plans(&PlanFilters {
                status: Some("active".to_string()),
                author: Some("alice".to_string()),
                updated_after: Some("2026-08-01".to_string()),
                updated_before: Some("2026-08-31".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.count, 1);
        assert_eq!(response.plans[0].id, "auth");
        store.close().await;
    }

    #[tokio::test]
    async fn test_topic_filter_narrows_sql_results() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        store.insert_plan(&sample_plan("auth", PlanStatus::Active)).await.unwrap();
        let mut other = sample_plan("infra", PlanStatus::Active);
        other.title = "Terraform cleanup".to_string();
        other.topics = vec!["infra".to_string()];
        store.insert_plan(&other).await.unwrap();

        // The substring topic match is applied on top of the SQL rows.
        let response = store
            .query_plans(&PlanFilters {
                status: Some("active".to_string()),
                topic: Some("AUTH".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.count, 1);
        assert_eq!(response.plans[0].id, "auth");
        store.close().await;
    }

    #[tokio::test]
    async fn test_search_phrase_candidates_survive_keyword_fetch() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        let mut titled = sample_plan("rework", PlanStatus::Active);
        titled.title = "The auth rework plan".to_string();
        store.insert_plan(&titled).await.unwrap();
        let mut body_only = sample_plan("notes", PlanStatus::Active);
        body_only.title = "Untitled".to_string();
        body_only.topics = Vec::new();
        body_only.body = "notes on the auth rework effort\n".to_string();
        store.insert_plan(&body_only).await.unwrap();
        let mut unrelated = sample_plan("unrelated", PlanStatus::Active);
        unrelated.title = "Deploy pipeline".to_string();
        unrelated.topics = vec!["infra".to_string()];
        store.insert_plan(&unrelated).await.unwrap();

        let hits = store.search("auth rework", SearchScope::Plans).await.unwrap();
        assert_eq!(hits.count, 2);
        assert_eq!(hits.results[0].id, "rework"); // phrase in title outranks body
        assert_eq!(hits.results[1].id, "notes");

        let empty = store.search("   ", SearchScope::All).await.unwrap();
        assert_eq!(empty.count, 0);
        store.close().await;
    }

    #[tokio::test]
    async fn test_ensure_project_ignores_duplicates() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        // open() already ensured it once.
        ensure_project(&store.pool, "default").await.unwrap();
        store.close().await;
    }

    #[tokio::test]
    async fn test_rebuild_reports_counts() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store.insert_plan(&sample_plan("auth", PlanStatus::Active)).await.unwrap();
        store.insert_session(&sample_session("2026-08-20", None)).await.unwrap();

        let summary = store.rebuild_index().await.unwrap();
        assert_eq!(summary.plans, 1);
        assert_eq!(summary.sessions, 1);
        assert_eq!(summary.learned, 0);
        store.close().await;
    }
}
