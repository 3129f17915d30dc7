//! Tests for configuration loading and the components built from it.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tether::auth::{CredentialStore, MemoryCredentialStore, ACCESS_TOKEN_KEY};
use tether::client::ApiClient;
use tether::config::TetherConfig;
use tether::error::TetherError;

#[test]
fn defaults_match_documented_values() {
    let config = TetherConfig::default();
    assert_eq!(config.request_timeout, Duration::from_secs(10));
    assert_eq!(config.max_retries, 3);
    assert_eq!(
        config.retry_delays,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
    assert_eq!(config.credentials.near_expiry_threshold, Duration::from_secs(300));
    assert_eq!(config.handlers.login_route, "/login");
    assert_eq!(config.public_paths, vec!["/auth/login/".to_string()]);
    assert!(config.preemptive_refresh);
}

#[test]
fn file_then_environment_layering() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("tether.toml");
    fs::write(
        &file,
        r#"
base_url = "https://file.example.com/api/v1"
request_timeout_ms = 2500

[retry]
max_retries = 1

[credentials]
refresh_retries = 2

[handlers]
login_route = "/signin"
"#,
    )
    .unwrap();

    let mut config = TetherConfig::load(&file).unwrap();
    let env: HashMap<&str, &str> = HashMap::from([
        ("TETHER_BASE_URL", "https://env.example.com/api/v1"),
        ("TETHER_RETRY_DELAYS_MS", "100, 200"),
        ("TETHER_CREDENTIALS_DIR", "/tmp/tether-test"),
    ]);
    config
        .apply_env(|key| env.get(key).map(|v| v.to_string()))
        .unwrap();

    assert_eq!(config.base_url, "https://env.example.com/api/v1");
    assert_eq!(config.request_timeout, Duration::from_millis(2500));
    assert_eq!(config.max_retries, 1);
    assert_eq!(
        config.retry_delays,
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
    assert_eq!(config.credentials.refresh_retries, 2);
    assert_eq!(config.handlers.login_route, "/signin");
    assert_eq!(config.credentials_dir.to_str(), Some("/tmp/tether-test"));
}

#[test]
fn invalid_values_are_configuration_errors() {
    let mut config = TetherConfig::default();
    let err = config
        .apply_env(|key| (key == "TETHER_MAX_RETRIES").then(|| "many".to_string()))
        .unwrap_err();
    assert!(matches!(err, TetherError::Configuration(msg) if msg.contains("TETHER_MAX_RETRIES")));

    let err = TetherConfig::from_toml_str("retries = 3").unwrap_err();
    assert!(matches!(err, TetherError::Configuration(_)));
}

#[tokio::test]
async fn configured_taxonomy_drives_client_retries() {
    let temp = TempDir::new().unwrap();
    let taxonomy_file = temp.path().join("taxonomy.toml");
    fs::write(
        &taxonomy_file,
        r#"
[entries.DATABASE_ERROR]
category = "server"
severity = "medium"
user_message = "Database maintenance"
"#,
    )
    .unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/tenants/"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "code": 5003,
            "message": "db down",
            "error_code": "DATABASE_ERROR"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = TetherConfig::default();
    config.base_url = format!("{}/api/v1", server.uri());
    config.taxonomy_path = Some(taxonomy_file);
    config.retry_delays = vec![Duration::from_millis(10)];

    let store = Arc::new(MemoryCredentialStore::new());
    store.set(ACCESS_TOKEN_KEY, "T1").unwrap();
    let credentials = config.credential_manager(store, None);
    let client = ApiClient::from_config(&config, credentials, None).unwrap();

    assert!(!client.retry_policy().taxonomy().is_retryable("DATABASE_ERROR"));
    let err = client.get::<Value>("/tenants/").await.unwrap_err();
    assert_eq!(err.response().map(|r| r.error_code.as_str()), Some("DATABASE_ERROR"));
}

#[test]
fn missing_taxonomy_file_is_reported() {
    let config = TetherConfig {
        taxonomy_path: Some("/definitely/not/here.toml".into()),
        ..TetherConfig::default()
    };
    assert!(matches!(config.taxonomy(), Err(TetherError::Io(_))));
}
