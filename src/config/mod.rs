//! Configuration system (layered: defaults < TOML file < environment).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::auth::{
    default_credentials_dir, CredentialConfig, CredentialManager, CredentialStore,
    FileCredentialStore, HttpRefreshExchange, SessionListener,
};
use crate::client::default_public_paths;
use crate::error::{Result, TetherError};
use crate::handlers::HandlerConfig;
use crate::taxonomy::ErrorTaxonomy;
use crate::util::retry::RetryPolicy;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";
const DEFAULT_REFRESH_PATH: &str = "/auth/refresh/";

/// Runtime configuration.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use tether::config::TetherConfig;
///
/// let config = TetherConfig::from_toml_str(r#"
///     base_url = "https://api.example.com/v1"
///
///     [retry]
///     max_retries = 2
///     delays_ms = [500, 1500]
/// "#).unwrap();
/// assert_eq!(config.max_retries, 2);
/// assert_eq!(config.retry_delays[1], Duration::from_millis(1500));
/// ```
#[derive(Debug, Clone)]
pub struct TetherConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub refresh_path: String,
    pub refresh_timeout: Duration,
    /// Paths sent without an `Authorization` header.
    pub public_paths: Vec<String>,
    /// Refresh near-expiry tokens before sending requests.
    pub preemptive_refresh: bool,
    pub max_retries: u32,
    pub retry_delays: Vec<Duration>,
    pub max_retry_delay: Duration,
    pub credentials: CredentialConfig,
    pub handlers: HandlerConfig,
    /// TOML file merged over the built-in taxonomy.
    pub taxonomy_path: Option<PathBuf>,
    pub credentials_dir: PathBuf,
}

impl Default for TetherConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            refresh_timeout: Duration::from_secs(10),
            public_paths: default_public_paths(),
            preemptive_refresh: true,
            max_retries: retry.max_retries,
            retry_delays: retry.delay_schedule,
            max_retry_delay: retry.max_delay,
            credentials: CredentialConfig::default(),
            handlers: HandlerConfig::default(),
            taxonomy_path: None,
            credentials_dir: default_credentials_dir(),
        }
    }
}

impl TetherConfig {
    /// Defaults with a TOML document applied.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config = Self::default();
        config.merge_toml(raw)?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Load from environment variables, reading `.env` if present.
    ///
    /// `TETHER_CONFIG` names a TOML file applied before the other variables.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = match std::env::var("TETHER_CONFIG") {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `TETHER_*` overrides from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = get("TETHER_BASE_URL") {
            self.base_url = url;
        }
        if let Some(ms) = get("TETHER_TIMEOUT_MS") {
            self.request_timeout = Duration::from_millis(parse_number("TETHER_TIMEOUT_MS", &ms)?);
        }
        if let Some(retries) = get("TETHER_MAX_RETRIES") {
            self.max_retries = parse_number("TETHER_MAX_RETRIES", &retries)?;
        }
        if let Some(delays) = get("TETHER_RETRY_DELAYS_MS") {
            self.retry_delays = delays
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(|d| parse_number("TETHER_RETRY_DELAYS_MS", d).map(Duration::from_millis))
                .collect::<Result<Vec<_>>>()?;
        }
        if let Some(secs) = get("TETHER_NEAR_EXPIRY_SECS") {
            self.credentials.near_expiry_threshold =
                Duration::from_secs(parse_number("TETHER_NEAR_EXPIRY_SECS", &secs)?);
        }
        if let Some(path) = get("TETHER_TAXONOMY_FILE") {
            self.taxonomy_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = get("TETHER_CREDENTIALS_DIR") {
            self.credentials_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Apply a TOML document over the current values.
    pub fn merge_toml(&mut self, raw: &str) -> Result<()> {
        let file: ConfigFile = toml::from_str(raw)
            .map_err(|e| TetherError::Configuration(format!("invalid config file: {e}")))?;

        if let Some(url) = file.base_url {
            self.base_url = url;
        }
        if let Some(ms) = file.request_timeout_ms {
            self.request_timeout = Duration::from_millis(ms);
        }
        if let Some(path) = file.refresh_path {
            self.refresh_path = path;
        }
        if let Some(ms) = file.refresh_timeout_ms {
            self.refresh_timeout = Duration::from_millis(ms);
        }
        if let Some(paths) = file.public_paths {
            self.public_paths = paths;
        }
        if let Some(enabled) = file.preemptive_refresh {
            self.preemptive_refresh = enabled;
        }
        if let Some(path) = file.taxonomy_file {
            self.taxonomy_path = Some(path);
        }
        if let Some(dir) = file.credentials_dir {
            self.credentials_dir = dir;
        }

        let retry = file.retry;
        if let Some(max) = retry.max_retries {
            self.max_retries = max;
        }
        if let Some(delays) = retry.delays_ms {
            self.retry_delays = delays.into_iter().map(Duration::from_millis).collect();
        }
        if let Some(ms) = retry.max_delay_ms {
            self.max_retry_delay = Duration::from_millis(ms);
        }

        let credentials = file.credentials;
        if let Some(secs) = credentials.near_expiry_secs {
            self.credentials.near_expiry_threshold = Duration::from_secs(secs);
        }
        if let Some(secs) = credentials.watch_interval_secs {
            self.credentials.watch_interval = Duration::from_secs(secs);
        }
        if let Some(retries) = credentials.refresh_retries {
            self.credentials.refresh_retries = retries;
        }
        if let Some(ms) = credentials.refresh_retry_delay_ms {
            self.credentials.refresh_retry_delay = Duration::from_millis(ms);
        }

        let handlers = file.handlers;
        if let Some(route) = handlers.login_route {
            self.handlers.login_route = route;
        }
        if let Some(ms) = handlers.redirect_delay_ms {
            self.handlers.redirect_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = handlers.network_retry_delay_ms {
            self.handlers.network_retry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = handlers.server_retry_delay_ms {
            self.handlers.server_retry_delay = Duration::from_millis(ms);
        }
        Ok(())
    }

    /// Built-in taxonomy, merged with `taxonomy_path` when set.
    pub fn taxonomy(&self) -> Result<Arc<ErrorTaxonomy>> {
        match &self.taxonomy_path {
            Some(path) => Ok(Arc::new(ErrorTaxonomy::load(path)?)),
            None => Ok(ErrorTaxonomy::shared()),
        }
    }

    pub fn retry_policy(&self, taxonomy: Arc<ErrorTaxonomy>) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delays.clone())
            .with_max_delay(self.max_retry_delay)
            .with_taxonomy(taxonomy)
    }

    pub fn refresh_exchange(&self) -> HttpRefreshExchange {
        HttpRefreshExchange::new(&self.base_url, &self.refresh_path).with_timeout(self.refresh_timeout)
    }

    pub fn file_credential_store(&self) -> FileCredentialStore {
        FileCredentialStore::new(&self.credentials_dir)
    }

    /// Manager using `store` and the HTTP refresh exchange.
    pub fn credential_manager(
        &self,
        store: Arc<dyn CredentialStore>,
        session_listener: Option<Arc<dyn SessionListener>>,
    ) -> CredentialManager {
        CredentialManager::builder()
            .store(store)
            .exchange(Arc::new(self.refresh_exchange()))
            .maybe_session_listener(session_listener)
            .config(self.credentials.clone())
            .build()
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| {
        TetherError::Configuration(format!("{key} must be a non-negative integer, got '{value}'"))
    })
}

/// On-disk form. Durations are integers with a unit suffix in the key.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    request_timeout_ms: Option<u64>,
    refresh_path: Option<String>,
    refresh_timeout_ms: Option<u64>,
    public_paths: Option<Vec<String>>,
    preemptive_refresh: Option<bool>,
    taxonomy_file: Option<PathBuf>,
    credentials_dir: Option<PathBuf>,
    retry: RetrySection,
    credentials: CredentialSection,
    handlers: HandlerSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RetrySection {
    max_retries: Option<u32>,
    delays_ms: Option<Vec<u64>>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CredentialSection {
    near_expiry_secs: Option<u64>,
    watch_interval_secs: Option<u64>,
    refresh_retries: Option<u32>,
    refresh_retry_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct HandlerSection {
    login_route: Option<String>,
    redirect_delay_ms: Option<u64>,
    network_retry_delay_ms: Option<u64>,
    server_retry_delay_ms: Option<u64>,
}
