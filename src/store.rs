//! The storage adapter seam.
//!
//! Both backends — the flat serialized index and the relational database —
//! implement [`KnowledgeStore`]. Callers (CLI commands, protocol wrappers)
//! only ever see this trait, so switching `storage.backend` in the config
//! changes nothing above it.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::RebuildSummary;
use crate::query::{
    PlanFilters, PlanQueryResponse, SearchResponse, SearchScope, SessionFilters,
    SessionQueryResponse,
};

/// Operations every storage backend must support.
///
/// All operations are I/O-bound and idempotent: reads may be repeated
/// freely, and [`rebuild_index`](KnowledgeStore::rebuild_index) is safe to
/// call speculatively before every query when freshness matters more than
/// latency.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Query plans with all provided filters ANDed together. Invalid
    /// filter values (e.g. an unknown status) fail fast.
    async fn query_plans(&self, filters: &PlanFilters) -> Result<PlanQueryResponse>;

    /// Query sessions by date range, topic, and status.
    async fn query_sessions(&self, filters: &SessionFilters) -> Result<SessionQueryResponse>;

    /// Ranked full-text search across the requested scope.
    async fn search(&self, query: &str, scope: SearchScope) -> Result<SearchResponse>;

    /// Bring the backend's derived state up to date with the document
    /// corpus. Idempotent; per-document failures are reported in the
    /// summary, never raised.
    async fn rebuild_index(&self) -> Result<RebuildSummary>;

    /// Release held resources. Safe to call more than once.
    async fn close(&self);
}
