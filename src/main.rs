//! # Devlore CLI
//!
//! The `devlore` binary is a thin wrapper over the engine: every command
//! loads the config, opens the configured storage backend, calls one
//! library function, and prints the result. No command adds logic of its
//! own.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `devlore init` | Create the backend (index files or SQLite schema) |
//! | `devlore scan` | Scan the knowledge root and report what was found |
//! | `devlore rebuild` | Rebuild the index from the document corpus |
//! | `devlore plans` | Query plans by status/author/topic/date |
//! | `devlore sessions` | Query sessions by date range/topic/status |
//! | `devlore search "<query>"` | Ranked full-text search |
//! | `devlore migrate` | Migrate the flat corpus into SQLite |
//! | `devlore plan <op>` | Create / transition / log / archive a plan |
//! | `devlore session <op>` | Create / edit the day's session |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use devlore::config::{load_config, Config};
use devlore::models::{PlanStatus, SessionStatus};
use devlore::query::{self, PlanFilters, ResponseMode, SearchScope, SessionFilters};
use devlore::sqlite_store::SqliteStore;
use devlore::store::KnowledgeStore;
use devlore::{migration, plan_ops, scanner, session_ops};

/// Devlore — a local-first project knowledge base.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/devlore.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "devlore",
    about = "Devlore — plans, sessions, and learned patterns, indexed and queryable",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/devlore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the configured storage backend.
    ///
    /// For the index backend this builds both index files; for the SQLite
    /// backend it creates the database and schema. Idempotent.
    Init,

    /// Scan the knowledge root and report counts and per-file errors.
    Scan,

    /// Rebuild the backend's derived state from the document corpus.
    Rebuild,

    /// Query plans. All provided filters are ANDed together.
    Plans {
        /// Filter by status: proposed, active, paused, complete, cancelled.
        #[arg(long)]
        status: Option<String>,
        /// Filter by exact author.
        #[arg(long)]
        author: Option<String>,
        /// Filter by topic (case-insensitive substring of topics or title).
        #[arg(long)]
        topic: Option<String>,
        /// Only plans updated on or after this date (YYYY-MM-DD).
        #[arg(long)]
        updated_after: Option<String>,
        /// Only plans updated on or before this date (YYYY-MM-DD).
        #[arg(long)]
        updated_before: Option<String>,
        /// Response mode: preview, metadata, section, or full.
        #[arg(long, default_value = "metadata")]
        mode: String,
        /// Section name required by `--mode section`.
        #[arg(long)]
        section: Option<String>,
    },

    /// Query sessions by date range, topic, and status.
    Sessions {
        /// Filter by status: in-progress or complete.
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        topic: Option<String>,
        /// Only sessions on or after this date (YYYY-MM-DD).
        #[arg(long)]
        date_after: Option<String>,
        /// Only sessions on or before this date (YYYY-MM-DD).
        #[arg(long)]
        date_before: Option<String>,
        /// Response mode: preview, metadata, section, or full.
        #[arg(long, default_value = "metadata")]
        mode: String,
        #[arg(long)]
        section: Option<String>,
    },

    /// Ranked full-text search across the knowledge base.
    Search {
        /// The search query string.
        query: String,
        /// Scope: all, plans, sessions, or learned.
        #[arg(long, default_value = "all")]
        scope: String,
    },

    /// Migrate the flat-file corpus into the SQLite backend.
    ///
    /// Safe to re-run: already-migrated records are skipped, not
    /// duplicated. Prints a summary with per-file errors.
    Migrate,

    /// Plan lifecycle operations.
    Plan {
        #[command(subcommand)]
        op: PlanOp,
    },

    /// Session lifecycle operations.
    Session {
        #[command(subcommand)]
        op: SessionOp,
    },
}

#[derive(Subcommand)]
enum PlanOp {
    /// Create a new plan and point the author's active pointer at it.
    New {
        /// Slug identifier, e.g. `auth-rework`.
        slug: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long = "topic")]
        topics: Vec<String>,
    },
    /// Transition a plan to a new status.
    Status {
        id: String,
        /// proposed, active, paused, complete, or cancelled.
        status: String,
    },
    /// Append a progress note to a plan.
    Log { id: String, text: String },
    /// Move a plan to the archive directory.
    Archive { id: String },
}

#[derive(Subcommand)]
enum SessionOp {
    /// Create the day's session.
    New {
        /// Session date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<String>,
        #[arg(long = "topic")]
        topics: Vec<String>,
    },
    /// Append to the session body (or insert relative to a pattern).
    Log {
        date: String,
        #[arg(allow_hyphen_values = true)]
        text: String,
        /// Insert at the top of the body instead of the end.
        #[arg(long, conflicts_with = "after")]
        prepend: bool,
        /// Insert after the first line containing this pattern.
        #[arg(long)]
        after: Option<String>,
    },
    /// Add a topic to the session header.
    Topic { date: String, topic: String },
    /// Add a referenced file to the session header.
    File { date: String, file: String },
    /// Link the session to a plan.
    Link { date: String, plan: String },
    /// Mark the session complete.
    Done { date: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&config).await,
        Commands::Scan => run_scan(&config),
        Commands::Rebuild => run_rebuild(&config).await,
        Commands::Plans {
            status,
            author,
            topic,
            updated_after,
            updated_before,
            mode,
            section,
        } => {
            let filters = PlanFilters {
                status,
                author,
                topic,
                updated_after,
                updated_before,
            };
            let mode = ResponseMode::from_flags(&mode, section)?;
            let store = devlore::open_store(&config).await?;
            let response = store.query_plans(&filters).await?;
            store.close().await;
            println!("{}", serde_json::to_string_pretty(&query::shape_plans(&response, &mode))?);
            Ok(())
        }
        Commands::Sessions {
            status,
            topic,
            date_after,
            date_before,
            mode,
            section,
        } => {
            let filters = SessionFilters {
                status,
                topic,
                date_after,
                date_before,
            };
            let mode = ResponseMode::from_flags(&mode, section)?;
            let store = devlore::open_store(&config).await?;
            let response = store.query_sessions(&filters).await?;
            store.close().await;
            println!(
                "{}",
                serde_json::to_string_pretty(&query::shape_sessions(&response, &mode))?
            );
            Ok(())
        }
        Commands::Search { query, scope } => {
            let scope: SearchScope = scope.parse()?;
            let store = devlore::open_store(&config).await?;
            let response = store.search(&query, scope).await?;
            store.close().await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Commands::Migrate => run_migrate(&config).await,
        Commands::Plan { op } => run_plan_op(&config, op),
        Commands::Session { op } => run_session_op(&config, op),
    }
}

async fn run_init(config: &Config) -> Result<()> {
    let store = devlore::open_store(config).await?;
    let summary = store.rebuild_index().await?;
    store.close().await;
    println!(
        "initialized: {} plans, {} sessions, {} learned",
        summary.plans, summary.sessions, summary.learned
    );
    report_errors(&summary.errors);
    Ok(())
}

fn run_scan(config: &Config) -> Result<()> {
    let result = scanner::scan_root(&config.knowledge.root)?;
    println!(
        "scanned {}: {} sessions, {} plans, {} learned ({} total)",
        config.knowledge.root.display(),
        result.sessions.len(),
        result.plans.len(),
        result.learned.len(),
        result.total
    );
    report_errors(&result.errors);
    Ok(())
}

async fn run_rebuild(config: &Config) -> Result<()> {
    let store = devlore::open_store(config).await?;
    let summary = store.rebuild_index().await?;
    store.close().await;
    println!(
        "rebuilt: {} plans, {} sessions, {} learned",
        summary.plans, summary.sessions, summary.learned
    );
    report_errors(&summary.errors);
    Ok(())
}

async fn run_migrate(config: &Config) -> Result<()> {
    let store = SqliteStore::open(&config.db.path, &config.db.project).await?;

    let mut summary = migration::migrate_corpus(&config.knowledge.root, &store).await?;
    if let Some(personal_root) = &config.knowledge.personal_root {
        let personal = migration::migrate_corpus(personal_root, &store).await?;
        summary.plans_migrated += personal.plans_migrated;
        summary.sessions_migrated += personal.sessions_migrated;
        summary.learned_migrated += personal.learned_migrated;
        summary.total_files += personal.total_files;
        summary.skipped += personal.skipped;
        summary.errors.extend(personal.errors);
    }

    store.close().await;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_plan_op(config: &Config, op: PlanOp) -> Result<()> {
    let root = &config.knowledge.root;
    match op {
        PlanOp::New {
            slug,
            title,
            author,
            topics,
        } => {
            let outcome = plan_ops::create_plan(root, &slug, &title, &author, &topics)?;
            if outcome.created {
                println!("created plan {}", outcome.id);
            } else {
                println!("plan {} already exists", outcome.id);
            }
        }
        PlanOp::Status { id, status } => {
            let status: PlanStatus = status.parse()?;
            plan_ops::set_plan_status(root, &id, status)?;
            println!("plan {} -> {}", id, status);
        }
        PlanOp::Log { id, text } => {
            plan_ops::append_plan_progress(root, &id, &text)?;
            println!("logged to plan {}", id);
        }
        PlanOp::Archive { id } => {
            plan_ops::archive_plan(root, &id)?;
            println!("archived plan {}", id);
        }
    }
    Ok(())
}

fn run_session_op(config: &Config, op: SessionOp) -> Result<()> {
    let root = &config.knowledge.root;
    match op {
        SessionOp::New { date, topics } => {
            let outcome = session_ops::create_session(root, date.as_deref(), &topics)?;
            if outcome.created {
                println!("created session {}", outcome.id);
            } else {
                println!("session {} already exists", outcome.id);
            }
        }
        SessionOp::Log {
            date,
            text,
            prepend,
            after,
        } => {
            if let Some(pattern) = after {
                session_ops::insert_after_pattern(root, &date, &pattern, &text)?;
            } else if prepend {
                session_ops::prepend_to_session(root, &date, &text)?;
            } else {
                session_ops::append_to_session(root, &date, &text)?;
            }
            println!("logged to session {}", date);
        }
        SessionOp::Topic { date, topic } => {
            session_ops::add_session_topic(root, &date, &topic)?;
            println!("added topic to session {}", date);
        }
        SessionOp::File { date, file } => {
            session_ops::add_session_file(root, &date, &file)?;
            println!("added file to session {}", date);
        }
        SessionOp::Link { date, plan } => {
            session_ops::set_session_plan(root, &date, &plan)?;
            println!("linked session {} to plan {}", date, plan);
        }
        SessionOp::Done { date } => {
            session_ops::set_session_status(root, &date, SessionStatus::Complete)?;
            println!("session {} complete", date);
        }
    }
    Ok(())
}

fn report_errors(errors: &[String]) {
    for e in errors {
        eprintln!("warning: {}", e);
    }
}
