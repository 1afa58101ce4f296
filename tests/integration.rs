use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn devlore_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("devlore");
    path
}

fn setup_test_env(backend: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Seed a small corpus
    let kb = root.join("knowledge");
    fs::create_dir_all(kb.join("plans")).unwrap();
    fs::create_dir_all(kb.join("sessions")).unwrap();
    fs::create_dir_all(kb.join("learned/rust")).unwrap();

    fs::write(
        kb.join("plans/plan-auth-rework.md"),
        "---\ntitle: \"Auth rework\"\nstatus: active\nauthor: alice\ncreated: 2026-08-01\nupdated: 2026-08-20\ntopics: [\"auth\"]\n---\n## Goal\nReplace session cookies with tokens.\n\n## Progress\n- spiked refresh flow\n",
    )
    .unwrap();
    fs::write(
        kb.join("plans/plan-docs-pass.md"),
        "---\ntitle: \"Docs pass\"\nstatus: complete\nauthor: bob\ncreated: 2026-07-01\nupdated: 2026-07-15\ncompleted: 2026-07-15\ntopics: [\"docs\"]\n---\nDone.\n",
    )
    .unwrap();
    fs::write(
        kb.join("sessions/2026-08-20.md"),
        "---\ndate: 2026-08-20\nstatus: complete\nplan: auth-rework\ntopics: [\"auth\"]\nfiles: [\"src/auth.rs\"]\n---\n## Goal\nFinish token refresh.\n\n## Progress\n- refresh flow working\n",
    )
    .unwrap();
    fs::write(
        kb.join("learned/rust/errors.md"),
        "---\ncategory: rust\nkeywords: [\"errors\", \"anyhow\"]\n---\nPropagate with anyhow at binary edges.\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[knowledge]
root = "{root}/knowledge"

[index]
team_path = "{root}/data/team-index.json"
personal_path = "{root}/data/personal-index.json"
auto_rebuild = true

[db]
path = "{root}/data/devlore.sqlite"
project = "default"

[storage]
backend = "{backend}"
"#,
        root = root.display(),
        backend = backend
    );

    let config_path = config_dir.join("devlore.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_devlore(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = devlore_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run devlore binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_builds_index() {
    let (_tmp, config_path) = setup_test_env("index");

    let (stdout, stderr, success) = run_devlore(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(stdout.contains("2 plans"));
}

#[test]
fn test_scan_reports_counts() {
    let (_tmp, config_path) = setup_test_env("index");

    let (stdout, _, success) = run_devlore(&config_path, &["scan"]);
    assert!(success);
    assert!(stdout.contains("1 sessions"));
    assert!(stdout.contains("2 plans"));
    assert!(stdout.contains("1 learned"));
    assert!(stdout.contains("4 total"));
}

#[test]
fn test_plans_status_filter() {
    let (_tmp, config_path) = setup_test_env("index");

    let (stdout, _, success) = run_devlore(&config_path, &["plans", "--status", "active"]);
    assert!(success);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["count"], 1);
    assert_eq!(value["plans"][0]["id"], "auth-rework");
    // metadata mode: no body in the response
    assert!(value["plans"][0].get("body").is_none());
}

#[test]
fn test_plans_invalid_status_fails_fast() {
    let (_tmp, config_path) = setup_test_env("index");

    let (_, stderr, success) = run_devlore(&config_path, &["plans", "--status", "finished"]);
    assert!(!success);
    assert!(stderr.contains("proposed"), "should name the enumeration: {}", stderr);
}

#[test]
fn test_plans_section_mode() {
    let (_tmp, config_path) = setup_test_env("index");

    let (stdout, _, success) = run_devlore(
        &config_path,
        &["plans", "--status", "active", "--mode", "section", "--section", "Goal"],
    );
    assert!(success);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let content = value["plans"][0]["content"].as_str().unwrap();
    assert!(content.contains("Replace session cookies"));
    assert!(!content.contains("refresh flow"));
}

#[test]
fn test_sessions_date_range() {
    let (_tmp, config_path) = setup_test_env("index");

    let (stdout, _, success) = run_devlore(
        &config_path,
        &["sessions", "--date-after", "2026-08-01", "--date-before", "2026-08-31"],
    );
    assert!(success);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["count"], 1);

    let (stdout, _, _) = run_devlore(&config_path, &["sessions", "--date-after", "2026-09-01"]);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["count"], 0);
}

#[test]
fn test_search_ranks_and_scopes() {
    let (_tmp, config_path) = setup_test_env("index");

    let (stdout, _, success) = run_devlore(&config_path, &["search", "token refresh"]);
    assert!(success);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(value["count"].as_u64().unwrap() >= 1);
    assert_eq!(value["results"][0]["kind"], "plan");

    let (stdout, _, _) = run_devlore(&config_path, &["search", "anyhow", "--scope", "learned"]);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["results"][0]["kind"], "learned");
}

#[test]
fn test_plan_lifecycle_via_cli() {
    let (tmp, config_path) = setup_test_env("index");
    let plan_file = tmp.path().join("knowledge/plans/plan-cache-layer.md");

    let (stdout, _, success) = run_devlore(
        &config_path,
        &["plan", "new", "cache-layer", "--title", "Cache layer", "--author", "carol"],
    );
    assert!(success, "{}", stdout);
    assert!(stdout.contains("created plan cache-layer"));

    // Second create is reported, not an error.
    let (stdout, _, success) = run_devlore(
        &config_path,
        &["plan", "new", "cache-layer", "--title", "Cache layer", "--author", "carol"],
    );
    assert!(success);
    assert!(stdout.contains("already exists"));

    let (_, _, success) = run_devlore(&config_path, &["plan", "status", "cache-layer", "active"]);
    assert!(success);
    let text = fs::read_to_string(&plan_file).unwrap();
    assert!(text.contains("status: \"active\""));
    assert!(text.contains("started: "));

    let (_, _, success) = run_devlore(&config_path, &["plan", "status", "cache-layer", "complete"]);
    assert!(success);
    let text = fs::read_to_string(&plan_file).unwrap();
    assert!(text.contains("status: \"complete\""));
    assert!(text.contains("completed: "));
}

#[test]
fn test_session_lifecycle_via_cli() {
    let (tmp, config_path) = setup_test_env("index");

    let (stdout, _, success) = run_devlore(
        &config_path,
        &["session", "new", "--date", "2026-08-26", "--topic", "scanner"],
    );
    assert!(success, "{}", stdout);

    let (_, _, success) = run_devlore(
        &config_path,
        &["session", "log", "2026-08-26", "- rewrote the walker", "--after", "## Progress"],
    );
    assert!(success);

    let (_, _, success) = run_devlore(&config_path, &["session", "done", "2026-08-26"]);
    assert!(success);

    let text = fs::read_to_string(tmp.path().join("knowledge/sessions/2026-08-26.md")).unwrap();
    assert!(text.contains("## Progress\n- rewrote the walker"));
    assert!(text.contains("status: \"complete\""));
}

#[test]
fn test_migrate_then_query_sqlite() {
    let (_tmp, config_path) = setup_test_env("sqlite");

    let (stdout, stderr, success) = run_devlore(&config_path, &["migrate"]);
    assert!(success, "migrate failed: {} {}", stdout, stderr);
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["plansMigrated"], 2);
    assert_eq!(summary["sessionsMigrated"], 1);
    assert_eq!(summary["learnedMigrated"], 1);
    assert_eq!(summary["totalFiles"], 4);
    assert_eq!(summary["skipped"], 0);

    // Second run is idempotent: everything is skipped.
    let (stdout, _, success) = run_devlore(&config_path, &["migrate"]);
    assert!(success);
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["plansMigrated"], 0);
    assert_eq!(summary["sessionsMigrated"], 0);
    assert_eq!(summary["learnedMigrated"], 0);
    assert_eq!(summary["skipped"], 4);

    // Same query surface against the relational backend.
    let (stdout, _, success) = run_devlore(&config_path, &["plans", "--status", "active"]);
    assert!(success);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["count"], 1);
    assert_eq!(value["plans"][0]["id"], "auth-rework");
}

#[test]
fn test_empty_root_scan() {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("devlore.toml");
    fs::write(
        &config_path,
        format!(
            "[knowledge]\nroot = \"{root}/empty\"\n\n[db]\npath = \"{root}/db.sqlite\"\n",
            root = tmp.path().display()
        ),
    )
    .unwrap();

    let (stdout, _, success) = run_devlore(&config_path, &["scan"]);
    assert!(success);
    assert!(stdout.contains("0 sessions"));
    assert!(stdout.contains("0 plans"));
    assert!(stdout.contains("0 learned"));
    assert!(stdout.contains("0 total"));
}

#[test]
fn test_malformed_document_does_not_break_rebuild() {
    let (tmp, config_path) = setup_test_env("index");
    fs::write(
        tmp.path().join("knowledge/plans/plan-broken.md"),
        "---\ntopics: [\"unterminated\n---\nbody\n",
    )
    .unwrap();

    let (stdout, stderr, success) = run_devlore(&config_path, &["rebuild"]);
    assert!(success, "{} {}", stdout, stderr);
    assert!(stdout.contains("2 plans"));
    assert!(stderr.contains("plan-broken.md"));
}
