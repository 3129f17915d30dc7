//! Credential manager with single-flight token refresh.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bon::Builder;
use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::error::CredentialError;
use super::exchange::RefreshExchange;
use super::store::{CredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use super::token;

/// Outcome of one refresh flight, delivered to every waiter.
///
/// `Ok(None)` means the session ended: credentials were cleared.
pub type RefreshOutcome = Result<Option<String>, CredentialError>;

/// Notified whenever credentials are cleared, e.g. to reset user state.
pub trait SessionListener: Send + Sync {
    fn on_session_cleared(&self);
}

/// Refresh timing and retry settings.
#[derive(Debug, Clone, Builder)]
pub struct CredentialConfig {
    /// Tokens expiring within this window are refreshed ahead of time.
    #[builder(default = Duration::from_secs(300))]
    pub near_expiry_threshold: Duration,
    /// Period of the expiry watcher.
    #[builder(default = Duration::from_secs(60))]
    pub watch_interval: Duration,
    /// Extra exchange attempts after a transport failure. Denials are never retried.
    #[builder(default)]
    pub refresh_retries: u32,
    #[builder(default = Duration::from_secs(1))]
    pub refresh_retry_delay: Duration,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

struct Inner {
    store: Arc<dyn CredentialStore>,
    exchange: Arc<dyn RefreshExchange>,
    session_listener: Option<Arc<dyn SessionListener>>,
    config: CredentialConfig,
    state: Mutex<RefreshState>,
}

/// Owns the access/refresh token pair and serializes refreshes.
///
/// While a refresh is in flight every caller of [`refresh`](Self::refresh)
/// joins the same flight and receives the same outcome, in arrival order.
/// The exchange runs on its own task, so it completes even if every caller
/// is cancelled.
///
/// Cloning is cheap; clones share state.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use tether::auth::{CredentialManager, HttpRefreshExchange, MemoryCredentialStore};
///
/// # async fn run() -> Result<(), tether::auth::CredentialError> {
/// let manager = CredentialManager::builder()
///     .store(Arc::new(MemoryCredentialStore::new()))
///     .exchange(Arc::new(HttpRefreshExchange::new("http://localhost:8000/api/v1", "/auth/refresh/")))
///     .build();
/// manager.save_credentials("access", Some("refresh"))?;
/// let fresh = manager.refresh().await?;
/// # let _ = fresh;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CredentialManager {
    inner: Arc<Inner>,
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("CredentialManager")
            .field("config", &self.inner.config)
            .field("refresh_in_flight", &state.in_flight)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

#[bon::bon]
impl CredentialManager {
    #[builder]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        exchange: Arc<dyn RefreshExchange>,
        session_listener: Option<Arc<dyn SessionListener>>,
        #[builder(default)] config: CredentialConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                exchange,
                session_listener,
                config,
                state: Mutex::new(RefreshState::default()),
            }),
        }
    }
}

impl CredentialManager {
    pub fn config(&self) -> &CredentialConfig {
        &self.inner.config
    }

    /// Current access token. Store failures read as absent.
    pub fn access_token(&self) -> Option<String> {
        self.inner.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner.read(REFRESH_TOKEN_KEY)
    }

    pub fn has_token(&self) -> bool {
        self.access_token().is_some()
    }

    /// Persist a token pair. Without a refresh token the stored one is kept.
    pub fn save_credentials(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), CredentialError> {
        self.inner.save(access_token, refresh_token)
    }

    /// Remove both tokens and notify the session listener. Safe to repeat.
    pub fn clear_credentials(&self) {
        self.inner.clear();
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.lock_state().in_flight
    }

    /// Callers currently waiting on the in-flight refresh.
    pub fn pending_waiters(&self) -> usize {
        self.inner.lock_state().waiters.len()
    }

    /// Obtain a new access token, joining any refresh already in flight.
    ///
    /// Returns `Ok(None)` when there is no refresh token or the exchange
    /// failed; credentials are cleared in both cases.
    pub async fn refresh(&self) -> RefreshOutcome {
        let (tx, rx) = oneshot::channel();
        let (start, position) = {
            let mut state = self.inner.lock_state();
            state.waiters.push_back(tx);
            let start = !state.in_flight;
            state.in_flight = true;
            (start, state.waiters.len())
        };

        if start {
            tracing::debug!("Starting token refresh");
            self.spawn_refresh();
        } else {
            tracing::debug!(position, "Joined in-flight token refresh");
        }

        rx.await.unwrap_or(Err(CredentialError::RefreshAborted))
    }

    /// Current token, or the result of the in-flight refresh if one is running.
    pub async fn wait_for_token_refresh(&self) -> Result<String, CredentialError> {
        let pending = {
            let mut state = self.inner.lock_state();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                tracing::debug!(waiters = state.waiters.len(), "Waiting for token refresh");
                Some(rx)
            } else {
                None
            }
        };

        let Some(rx) = pending else {
            return self.access_token().ok_or(CredentialError::NoToken);
        };
        match rx.await {
            Ok(Ok(Some(token))) => Ok(token),
            Ok(Ok(None)) => Err(CredentialError::RefreshFailed),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(CredentialError::RefreshAborted),
        }
    }

    /// Whether the access token expires within `threshold`.
    ///
    /// `false` without a token or when its expiry cannot be read.
    pub fn is_token_near_expiry(&self, threshold: Duration) -> bool {
        self.access_token()
            .map(|token| token::is_near_expiry(&token, threshold, Utc::now()))
            .unwrap_or(false)
    }

    /// Start a background refresh if the token is near expiry and none is
    /// running. Returns whether one was started; never waits for it.
    pub fn preemptive_refresh(&self) -> bool {
        if !self.is_token_near_expiry(self.inner.config.near_expiry_threshold) {
            return false;
        }
        {
            let mut state = self.inner.lock_state();
            if state.in_flight {
                return false;
            }
            state.in_flight = true;
        }
        tracing::info!("Access token near expiry, refreshing ahead of time");
        self.spawn_refresh();
        true
    }

    /// Run [`preemptive_refresh`](Self::preemptive_refresh) every
    /// `watch_interval` while a token is held.
    ///
    /// The watcher holds only a weak reference; it exits once every manager
    /// handle is dropped. Abort the returned handle to stop it earlier.
    pub fn spawn_expiry_watcher(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.watch_interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    tracing::debug!("Credential manager dropped, stopping expiry watcher");
                    break;
                };
                let manager = CredentialManager { inner };
                if manager.has_token() {
                    manager.preemptive_refresh();
                }
            }
        })
    }

    fn spawn_refresh(&self) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let guard = SettleGuard {
                inner: Arc::clone(&inner),
                settled: false,
            };
            let outcome = inner.perform_refresh().await;
            guard.settle(outcome);
        });
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(err) => {
                tracing::warn!(key, error = %err, "Failed to read credential");
                None
            }
        }
    }

    fn save(&self, access_token: &str, refresh_token: Option<&str>) -> Result<(), CredentialError> {
        self.store.set(ACCESS_TOKEN_KEY, access_token)?;
        if let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) {
            self.store.set(REFRESH_TOKEN_KEY, refresh_token)?;
        }
        tracing::debug!(rotated = refresh_token.is_some(), "Credentials saved");
        Ok(())
    }

    fn clear(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(err) = self.store.remove(key) {
                tracing::error!(key, error = %err, "Failed to remove credential");
            }
        }
        if let Some(listener) = &self.session_listener {
            listener.on_session_cleared();
        }
        tracing::info!("Credentials cleared");
    }

    async fn perform_refresh(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.store.get(REFRESH_TOKEN_KEY)?.filter(|t| !t.is_empty()) else {
            tracing::warn!("No refresh token, ending session");
            self.clear();
            return Ok(None);
        };

        let mut retries = 0;
        let exchanged = loop {
            match self.exchange.exchange(&refresh_token).await {
                Err(err) if err.is_transient() && retries < self.config.refresh_retries => {
                    retries += 1;
                    tracing::warn!(
                        retry = retries,
                        max_retries = self.config.refresh_retries,
                        error = %err,
                        "Retrying token exchange"
                    );
                    tokio::time::sleep(self.config.refresh_retry_delay).await;
                }
                other => break other,
            }
        };

        match exchanged {
            Ok(tokens) => {
                self.save(&tokens.access_token, tokens.refresh_token.as_deref())?;
                tracing::info!("Token refreshed");
                Ok(Some(tokens.access_token))
            }
            Err(err) => {
                tracing::warn!(error = %err, "Token refresh failed, ending session");
                self.clear();
                Ok(None)
            }
        }
    }

    /// Drain every waiter in arrival order, then leave the in-flight state.
    fn settle(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut state = self.lock_state();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };
        tracing::debug!(
            waiters = waiters.len(),
            refreshed = matches!(outcome, Ok(Some(_))),
            "Token refresh settled"
        );
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Settles the flight even when the refresh task panics or is dropped.
struct SettleGuard {
    inner: Arc<Inner>,
    settled: bool,
}

impl SettleGuard {
    fn settle(mut self, outcome: RefreshOutcome) {
        self.settled = true;
        self.inner.settle(outcome);
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if !self.settled {
            tracing::error!("Token refresh aborted before settling");
            self.inner.settle(Err(CredentialError::RefreshAborted));
        }
    }
}
