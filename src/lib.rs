//! # Devlore
//!
//! A local-first project knowledge base for development teams and their
//! agent tooling.
//!
//! Devlore keeps project knowledge — implementation plans, daily work
//! sessions, and learned patterns — as human-editable markdown documents
//! with structured headers, while maintaining a queryable index so
//! automated agents can filter and search the same knowledge efficiently.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────────┐
//! │   Scanner    │──▶│ Frontmatter   │──▶│  Storage backend   │
//! │ sessions/    │   │   parser      │   │ flat JSON index or │
//! │ plans/       │   │ header + body │   │   SQLite tables    │
//! │ learned/     │   └──────────────┘   └────────┬──────────┘
//! └──────────────┘          ▲                    │
//!                           │                    ▼
//!                  ┌────────┴───────┐      ┌──────────┐
//!                  │   Migration     │      │  Query    │
//!                  │  coordinator    │      │  layer    │
//!                  └────────────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! devlore init                        # create the database / index
//! devlore plan new auth-rework --title "Auth rework" --author alice
//! devlore session new --topic auth
//! devlore plans --status active
//! devlore search "token refresh"
//! devlore migrate                     # move the corpus into SQLite
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`scanner`] | Knowledge-root scanning and categorization |
//! | [`frontmatter`] | Structured-header parsing and serialization |
//! | [`store`] | The storage adapter trait |
//! | [`index_store`] | Flat JSON index backend (team + personal) |
//! | [`sqlite_store`] | Relational SQLite backend |
//! | [`migration`] | Corpus-to-relational migration coordinator |
//! | [`query`] | Filters, search ranking, response shaping |
//! | [`plan_ops`] | Plan lifecycle operations |
//! | [`session_ops`] | Session lifecycle operations |
//! | [`db`] | Database connection |

pub mod config;
pub mod db;
pub mod frontmatter;
pub mod index_store;
pub mod migration;
pub mod models;
pub mod plan_ops;
pub mod query;
pub mod scanner;
pub mod session_ops;
pub mod sqlite_store;
pub mod store;

use anyhow::Result;

use crate::config::Config;
use crate::store::KnowledgeStore;

/// Open the backend the config selects. Both implement [`KnowledgeStore`],
/// so callers never branch on the choice again.
pub async fn open_store(config: &Config) -> Result<Box<dyn KnowledgeStore>> {
    match config.storage.backend.as_str() {
        "sqlite" => {
            let store = sqlite_store::SqliteStore::open(&config.db.path, &config.db.project).await?;
            Ok(Box::new(store))
        }
        _ => Ok(Box::new(index_store::IndexStore::new(config))),
    }
}
