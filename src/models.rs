//! Core data models used throughout Devlore.
//!
//! These types represent the plans, sessions, and learned patterns that flow
//! through the scan, index, and migration pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Proposed,
    Active,
    Paused,
    Complete,
    Cancelled,
}

impl PlanStatus {
    pub const ALL: [PlanStatus; 5] = [
        PlanStatus::Proposed,
        PlanStatus::Active,
        PlanStatus::Paused,
        PlanStatus::Complete,
        PlanStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Proposed => "proposed",
            PlanStatus::Active => "active",
            PlanStatus::Paused => "paused",
            PlanStatus::Complete => "complete",
            PlanStatus::Cancelled => "cancelled",
        }
    }

    /// True once the plan has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Complete | PlanStatus::Cancelled)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "proposed" => Ok(PlanStatus::Proposed),
            "active" => Ok(PlanStatus::Active),
            "paused" => Ok(PlanStatus::Paused),
            "complete" => Ok(PlanStatus::Complete),
            "cancelled" => Ok(PlanStatus::Cancelled),
            other => anyhow::bail!(
                "Unknown plan status: '{}'. Must be proposed, active, paused, complete, or cancelled.",
                other
            ),
        }
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "complete")]
    Complete,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in-progress",
            SessionStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in-progress" => Ok(SessionStatus::InProgress),
            "complete" => Ok(SessionStatus::Complete),
            other => anyhow::bail!(
                "Unknown session status: '{}'. Must be in-progress or complete.",
                other
            ),
        }
    }
}

/// A single value in a structured header: either a scalar string or an
/// ordered list of strings. These are the only shapes the header subset
/// allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(s) => Some(s),
            FieldValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::Scalar(_) => None,
            FieldValue::List(items) => Some(items),
        }
    }
}

/// Generic header map produced by the frontmatter parser.
pub type Header = BTreeMap<String, FieldValue>;

/// A plan document, normalized from its header and body.
///
/// Known fields are typed here; anything else the header carried rides
/// along in `extra` so a rewrite never loses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub id: String,
    pub title: String,
    pub status: PlanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, FieldValue>,
}

/// A work-session document, one per calendar day by convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub date: String,
    pub status: SessionStatus,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, FieldValue>,
}

/// A learned-pattern document, identified by its path under `learned/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedRecord {
    pub id: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, FieldValue>,
}

/// On-disk envelope for a serialized index file (team or personal).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeIndex {
    pub version: u32,
    pub updated_at: String,
    #[serde(default)]
    pub plans: Vec<PlanRecord>,
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
    #[serde(default)]
    pub learned: Vec<LearnedRecord>,
}

pub const INDEX_VERSION: u32 = 1;

/// Summary returned by a full-corpus migration. Per-file failures land in
/// `errors`; they never abort the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub sessions_migrated: u64,
    pub plans_migrated: u64,
    pub learned_migrated: u64,
    pub total_files: u64,
    pub skipped: u64,
    pub errors: Vec<String>,
}

/// Summary returned by an index rebuild.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RebuildSummary {
    pub plans: usize,
    pub sessions: usize,
    pub learned: usize,
    pub errors: Vec<String>,
}

/// Outcome of a create operation. An already-existing identity is reported
/// here, not raised as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOutcome {
    pub created: bool,
    pub id: String,
}
