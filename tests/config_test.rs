//! Tests for config module

use std::io::Write;
use std::path::Path;

use serial_test::serial;
use tempfile::NamedTempFile;

use indexwatch::config::Config;

/// Every variable `Config::from_env` reads; cleared before each env test
const ENV_KEYS: &[&str] = &[
    "INDEXWATCH_RETRY_BATCH",
    "INDEXWATCH_BUDGET_MS",
    "INDEXWATCH_UTC_OFFSET_MINUTES",
    "INDEXWATCH_REQUEST_TIMEOUT",
    "INDEXWATCH_USER_AGENT",
    "INDEXWATCH_PUSH_ENDPOINT",
    "INDEXWATCH_PUSH_KEY",
    "INDEXWATCH_PUSH_KEY_LOCATION",
    "INDEXWATCH_SITEMAP_ENDPOINT",
    "INDEXWATCH_SITEMAP_TOKEN",
    "INDEXWATCH_INSPECTION_ENDPOINT",
    "INDEXWATCH_INSPECTION_TOKEN",
    "INDEXWATCH_INSPECTION_QPS",
    "INDEXWATCH_SQLITE_PATH",
    "INDEXWATCH_LOG_LEVEL",
    "INDEXWATCH_LOG_FORMAT",
    "INDEXWATCH_SITE_ID",
    "INDEXWATCH_SITE_DOMAIN",
    "INDEXWATCH_SITE_BILINGUAL",
    "INDEXWATCH_SITE_ALT_TAXONOMY",
];

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

#[test]
fn test_config_file_exists() {
    let config_path = Path::new("config.toml");
    assert!(
        config_path.exists(),
        "config.toml should exist in project root"
    );
}

#[test]
fn test_config_toml_readable() {
    let content =
        std::fs::read_to_string("config.toml").expect("Should be able to read config.toml");

    // Basic validation - should have expected sections
    assert!(
        content.contains("[engine]"),
        "config.toml should have [engine] section"
    );
    assert!(
        content.contains("[channels"),
        "config.toml should have [channels] section"
    );
    assert!(
        content.contains("[database]"),
        "config.toml should have [database] section"
    );
    assert!(
        content.contains("[logging]"),
        "config.toml should have [logging] section"
    );
    assert!(
        content.contains("[[sites]]"),
        "config.toml should define at least one site"
    );
}

/// Test that the shipped config file parses and passes validation
#[test]
fn test_root_config_parses_and_validates() {
    let config = Config::from_file(Path::new("config.toml")).expect("config.toml should parse");
    config.validate().expect("config.toml should validate");
    assert!(!config.sites.is_empty());
}

/// Test that a partial TOML file inherits defaults for omitted fields
#[test]
fn test_from_file_partial_toml_uses_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[engine]
retry_batch_size = 10

[channels.push]
key = "0123456789abcdef0123456789abcdef"
daily_quota = 50

[[sites]]
id = "forge-main"
domain = "forge.example.com"
bilingual = true
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.engine.retry_batch_size, 10);
    // omitted fields fall back to defaults
    assert_eq!(config.engine.budget_ms, 30_000);
    assert_eq!(config.engine.stale_submitted_days, 14);
    assert_eq!(config.channels.push.daily_quota, 50);
    assert_eq!(
        config.channels.push.key.as_deref(),
        Some("0123456789abcdef0123456789abcdef")
    );
    assert!(config.channels.sitemap.token.is_none());

    let site = config.site("forge-main").expect("site configured");
    assert!(site.bilingual);
    assert!(!site.alt_taxonomy);
    assert_eq!(site.base_url(), "https://forge.example.com");
    assert_eq!(site.sitemap_url(), "https://forge.example.com/sitemap.xml");
}

/// Test that malformed TOML is reported as a parse failure
#[test]
fn test_from_file_rejects_malformed_toml() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[engine\nretry_batch_size = ").unwrap();

    let err = Config::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse TOML"));
}

#[test]
fn test_validate_rejects_zero_batch_size() {
    let mut config = Config::default();
    config.engine.retry_batch_size = 0;

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("retry_batch_size"));
}

#[test]
fn test_validate_rejects_duplicate_site_ids() {
    let mut config = Config::default();
    for domain in ["a.example.com", "b.example.com"] {
        config.sites.push(indexwatch::config::SiteConfig {
            id: "forge-main".to_string(),
            domain: domain.to_string(),
            bilingual: false,
            alt_taxonomy: false,
            sitemap_path: "/sitemap.xml".to_string(),
        });
    }

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("duplicate site id"));
}

#[test]
fn test_validate_rejects_domain_with_path() {
    let mut config = Config::default();
    config.sites.push(indexwatch::config::SiteConfig {
        id: "forge-main".to_string(),
        domain: "forge.example.com/blog".to_string(),
        bilingual: false,
        alt_taxonomy: false,
        sitemap_path: "/sitemap.xml".to_string(),
    });

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("bare host"));
}

/// Test that a clean environment produces the documented defaults
#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();

    let config = Config::from_env().unwrap();
    assert_eq!(config.engine.retry_batch_size, 50);
    assert_eq!(config.engine.budget_ms, 30_000);
    assert_eq!(config.engine.chronic_failure_threshold, 5);
    assert_eq!(config.engine.utc_offset_minutes, 180);
    assert_eq!(config.channels.push.endpoint, "https://api.indexnow.org/indexnow");
    assert!(config.channels.push.key.is_none());
    assert!(config.sites.is_empty());
}

/// Test that environment overrides land in the right fields
#[test]
#[serial]
fn test_from_env_reads_overrides() {
    clear_env();
    std::env::set_var("INDEXWATCH_RETRY_BATCH", "5");
    std::env::set_var("INDEXWATCH_BUDGET_MS", "1500");
    std::env::set_var("INDEXWATCH_PUSH_KEY", "0123456789abcdef0123456789abcdef");
    std::env::set_var("INDEXWATCH_SITE_ID", "forge-main");
    std::env::set_var("INDEXWATCH_SITE_DOMAIN", "forge.example.com");
    std::env::set_var("INDEXWATCH_SITE_BILINGUAL", "true");

    let config = Config::from_env().unwrap();
    clear_env();

    config.validate().unwrap();
    assert_eq!(config.engine.retry_batch_size, 5);
    assert_eq!(config.engine.budget_ms, 1500);
    assert_eq!(
        config.channels.push.key.as_deref(),
        Some("0123456789abcdef0123456789abcdef")
    );

    assert_eq!(config.sites.len(), 1);
    let site = &config.sites[0];
    assert_eq!(site.id, "forge-main");
    assert_eq!(site.domain, "forge.example.com");
    assert!(site.bilingual);
    assert_eq!(site.sitemap_path, "/sitemap.xml");
}

/// Test that a site needs both its id and domain before it is defined
#[test]
#[serial]
fn test_from_env_site_requires_id_and_domain() {
    clear_env();
    std::env::set_var("INDEXWATCH_SITE_ID", "forge-main");

    let config = Config::from_env().unwrap();
    clear_env();

    assert!(config.sites.is_empty());
}

/// Test that unparseable numeric overrides are ignored, not fatal
#[test]
#[serial]
fn test_from_env_ignores_malformed_numbers() {
    clear_env();
    std::env::set_var("INDEXWATCH_RETRY_BATCH", "not-a-number");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.engine.retry_batch_size, 50);
}
