//! Integration tests for configuration loading and adapter construction.

use std::fs;

use crossforge::core::config::{Config, ConfigError};
use crossforge::forge::{create_adapter, resolve_kind, ForgeError, PlatformKind};
use tempfile::TempDir;

const CONFIG: &str = r#"
default_platform = "work"

[platforms.work]
type = "gitlab"
url = "https://code.example.com"
username = "alice"
timeout_secs = 30

[platforms.hub]
url = "https://github.com"
"#;

fn load(contents: &str) -> (TempDir, Config) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(&path, contents).unwrap();
    let config = Config::load_from(&path).unwrap().config;
    (temp, config)
}

#[test]
fn platforms_resolve_to_backends() {
    let (_temp, config) = load(CONFIG);

    let work = config.platform("work").unwrap();
    assert_eq!(resolve_kind(&work).unwrap(), PlatformKind::GitLab);

    let hub = config.platform("hub").unwrap();
    assert_eq!(resolve_kind(&hub).unwrap(), PlatformKind::GitHub);

    assert_eq!(config.default_platform(), Some("work"));
}

#[test]
fn unknown_platform_name() {
    let (_temp, config) = load(CONFIG);
    assert!(matches!(
        config.platform("elsewhere"),
        Err(ConfigError::UnknownPlatform(_))
    ));
}

#[tokio::test]
async fn adapter_without_token_fails_on_first_use() {
    let (_temp, config) = load(CONFIG);
    let mut work = config.platform("work").unwrap();
    work.token = None;

    let adapter = create_adapter(&work).unwrap();
    assert_eq!(adapter.platform_name(), "gitlab");

    let err = adapter.authenticate().await.unwrap_err();
    assert!(matches!(err, ForgeError::Authentication(_)));
    assert!(!adapter.test_connection().await);
}

#[test]
fn config_without_type_needs_recognizable_host() {
    let (_temp, config) = load(
        r#"
        [platforms.self_hosted]
        url = "https://code.example.com"
        "#,
    );
    let platform = config.platform("self_hosted").unwrap();
    assert!(create_adapter(&platform).is_err());
}
