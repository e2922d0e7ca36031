//! # Configuration Tests
//!
//! `ideasieve-cli` is a binary crate, so the config module is included directly into
//! the test binary.

#[path = "../src/config.rs"]
mod config;

use self::config::{get_config, ConfigError};
use ideasieve::dedup::MatchPolicy;
use std::env;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

// Environment variables are process-global, so tests that touch them run one at a time.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env_vars() {
    for key in [
        "DB_URL",
        "MAX_URLS",
        "TEST_NOTION_KEY",
        "TEST_NOTION_DB",
        "IDEASIEVE_DEDUP__TOP_K",
        "IDEASIEVE_NOTION__DATABASE_ID",
        "IDEASIEVE_EXTRACTION__PROVIDER",
    ] {
        env::remove_var(key);
    }
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_defaults_without_file_or_env() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();

    let config = get_config(None).expect("defaults should load");

    assert_eq!(config.db_url, "db/ideasieve.db");
    assert!(config.feeds.is_empty());
    assert_eq!(config.embedding.dimension, 1536);
    assert_eq!(config.embedding.model_name, "text-embedding-3-small");
    assert_eq!(config.extraction.provider, "openai");
    assert!((config.extraction.temperature - 0.4).abs() < f32::EPSILON);
    assert_eq!(config.batch.api_base_url, "https://api.openai.com");
    assert_eq!(config.batch.completion_window, "24h");
    assert_eq!(config.notion.version, "2022-06-28");
    assert!((config.dedup.similarity_threshold - 0.75).abs() < f64::EPSILON);
    assert_eq!(config.dedup.top_k, 5);
    assert_eq!(config.dedup.match_policy, MatchPolicy::FirstOverThreshold);
    assert_eq!(config.ledger.retention_days, 7);
    assert_eq!(config.max_urls, None);
}

#[test]
fn test_file_with_substitution() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();
    env::set_var("TEST_NOTION_KEY", "secret_abc");
    env::set_var("TEST_NOTION_DB", "db-123");

    let file = write_config(
        r#"
db_url: "/tmp/ideas.db"
feeds:
  - name: "AI alerts"
    url: "https://www.google.com/alerts/feeds/1/2"
  - name: "Paused"
    url: "https://example.com/rss"
    enabled: false
notion:
  api_key: "${TEST_NOTION_KEY}"
  database_id: "${TEST_NOTION_DB}"
dedup:
  similarity_threshold: 0.8
  match_policy: best_over_threshold
max_urls: 3
"#,
    );

    let config = get_config(file.path().to_str()).expect("file should load");

    assert_eq!(config.db_url, "/tmp/ideas.db");
    assert_eq!(config.feeds.len(), 2);
    assert!(config.feeds[0].enabled);
    assert!(!config.feeds[1].enabled);
    assert_eq!(config.notion.credentials().unwrap(), ("secret_abc", "db-123"));
    assert!((config.dedup.similarity_threshold - 0.8).abs() < f64::EPSILON);
    assert_eq!(config.dedup.top_k, 5);
    assert_eq!(config.dedup.match_policy, MatchPolicy::BestOverThreshold);
    assert_eq!(config.max_urls, Some(3));
    clear_env_vars();
}

#[test]
fn test_env_overrides_file() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();
    env::set_var("DB_URL", "/var/lib/ideasieve.db");
    env::set_var("IDEASIEVE_DEDUP__TOP_K", "9");
    env::set_var("IDEASIEVE_NOTION__DATABASE_ID", "from-env");
    env::set_var("IDEASIEVE_EXTRACTION__PROVIDER", "gemini");

    let file = write_config(
        r#"
db_url: "file.db"
dedup:
  top_k: 2
notion:
  database_id: "from-file"
"#,
    );

    let config = get_config(file.path().to_str()).expect("config should load");

    assert_eq!(config.db_url, "/var/lib/ideasieve.db");
    assert_eq!(config.dedup.top_k, 9);
    assert_eq!(config.notion.database_id.as_deref(), Some("from-env"));
    assert_eq!(config.extraction.provider, "gemini");
    clear_env_vars();
}

#[test]
fn test_missing_explicit_file() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();

    let result = get_config(Some("/nonexistent/ideasieve.yml"));

    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_unset_substitution_counts_as_missing_credential() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();

    let file = write_config(
        r#"
batch:
  api_key: "${TEST_NOTION_KEY}"
notion:
  api_key: "${TEST_NOTION_KEY}"
  database_id: "db-123"
"#,
    );

    let config = get_config(file.path().to_str()).expect("config should load");

    assert!(matches!(
        config.notion.credentials(),
        Err(ConfigError::Missing(key)) if key == "notion.api_key"
    ));
    assert!(matches!(
        config.batch.require_api_key(),
        Err(ConfigError::Missing(key)) if key == "batch.api_key"
    ));
}

#[test]
fn test_purge_retention_from_config_or_override() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();

    let file = write_config("ledger:\n  retention_days: 3\n");
    let config = get_config(file.path().to_str()).expect("config should load");

    assert_eq!(config.ledger.retention(None).unwrap(), chrono::Duration::days(3));
    assert_eq!(config.ledger.retention(Some(10)).unwrap(), chrono::Duration::days(10));
    assert_eq!(config.ledger.retention(Some(0)).unwrap(), chrono::Duration::zero());
    assert!(matches!(
        config.ledger.retention(Some(-1)),
        Err(ConfigError::General(_))
    ));
    assert!(matches!(
        config.ledger.retention(Some(i64::MAX)),
        Err(ConfigError::General(_))
    ));
}
