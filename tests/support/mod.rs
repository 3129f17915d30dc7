#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;

use tether::auth::{
    CredentialConfig, CredentialError, CredentialManager, MemoryCredentialStore, RefreshExchange,
    RefreshedTokens, SessionListener,
};
use tether::handlers::{Dialog, Level, Presenter};

/// What a [`ScriptedExchange`] does when called.
#[derive(Debug, Clone)]
pub enum ExchangeScript {
    Succeed {
        access_token: String,
        refresh_token: Option<String>,
    },
    Fail(CredentialError),
    Panic,
}

/// Refresh exchange with a canned answer, a call counter and an optional delay.
pub struct ScriptedExchange {
    script: Mutex<ExchangeScript>,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedExchange {
    pub fn new(script: ExchangeScript) -> Self {
        Self {
            script: Mutex::new(script),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(access_token: &str, refresh_token: Option<&str>) -> Self {
        Self::new(ExchangeScript::Succeed {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(ToString::to_string),
        })
    }

    pub fn failing(error: CredentialError) -> Self {
        Self::new(ExchangeScript::Fail(error))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_script(&self, script: ExchangeScript) {
        *self.script.lock().expect("script lock poisoned") = script;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented to the exchange, in call order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("seen lock poisoned").clone()
    }
}

#[async_trait]
impl RefreshExchange for ScriptedExchange {
    async fn exchange(&self, refresh_token: &str) -> Result<RefreshedTokens, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .expect("seen lock poisoned")
            .push(refresh_token.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let script = self.script.lock().expect("script lock poisoned").clone();
        match script {
            ExchangeScript::Succeed {
                access_token,
                refresh_token,
            } => Ok(RefreshedTokens {
                access_token,
                refresh_token,
            }),
            ExchangeScript::Fail(error) => Err(error),
            ExchangeScript::Panic => panic!("exchange exploded"),
        }
    }
}

/// Counts session-cleared notifications.
#[derive(Default)]
pub struct CountingListener {
    cleared: AtomicUsize,
}

impl CountingListener {
    pub fn count(&self) -> usize {
        self.cleared.load(Ordering::SeqCst)
    }
}

impl SessionListener for CountingListener {
    fn on_session_cleared(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }
}

/// Manager over an in-memory store holding `access`/`refresh`.
pub fn manager_with(
    exchange: Arc<ScriptedExchange>,
    access: Option<&str>,
    refresh: Option<&str>,
    listener: Option<Arc<CountingListener>>,
) -> CredentialManager {
    manager_with_config(exchange, access, refresh, listener, CredentialConfig::default())
}

pub fn manager_with_config(
    exchange: Arc<ScriptedExchange>,
    access: Option<&str>,
    refresh: Option<&str>,
    listener: Option<Arc<CountingListener>>,
    config: CredentialConfig,
) -> CredentialManager {
    let manager = CredentialManager::builder()
        .store(Arc::new(MemoryCredentialStore::new()))
        .exchange(exchange)
        .maybe_session_listener(listener.map(|l| l as Arc<dyn SessionListener>))
        .config(config)
        .build();
    if let Some(access) = access {
        manager
            .save_credentials(access, refresh)
            .expect("seed credentials");
    }
    manager
}

/// Unsigned JWT whose `exp` claim is `seconds_from_now` away.
pub fn jwt_expiring_in(seconds_from_now: i64) -> String {
    let exp = Utc::now().timestamp() + seconds_from_now;
    let payload = format!(r#"{{"sub":"42","exp":{exp}}}"#);
    format!(
        "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.{}.signature",
        URL_SAFE_NO_PAD.encode(payload)
    )
}

/// One effect requested from a presenter.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Toast { level: Level, message: String },
    Notify { title: String, message: String },
    Alert(Dialog),
    Confirm(Dialog),
    Redirect { route: String, delay: Duration },
}

/// Presenter that records every effect and answers dialogs as configured.
#[derive(Default)]
pub struct RecordingPresenter {
    effects: Mutex<Vec<Effect>>,
    confirm_answer: AtomicBool,
    alert_answer: AtomicBool,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn confirming(self) -> Self {
        self.confirm_answer.store(true, Ordering::SeqCst);
        self
    }

    pub fn acknowledging(self) -> Self {
        self.alert_answer.store(true, Ordering::SeqCst);
        self
    }

    pub fn effects(&self) -> Vec<Effect> {
        self.effects.lock().expect("effects lock poisoned").clone()
    }

    pub fn redirects(&self) -> Vec<String> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Redirect { route, .. } => Some(route),
                _ => None,
            })
            .collect()
    }

    pub fn confirms(&self) -> usize {
        self.effects()
            .iter()
            .filter(|effect| matches!(effect, Effect::Confirm(_)))
            .count()
    }

    fn record(&self, effect: Effect) {
        self.effects
            .lock()
            .expect("effects lock poisoned")
            .push(effect);
    }
}

#[async_trait]
impl Presenter for RecordingPresenter {
    async fn toast(&self, level: Level, message: &str, _duration: Duration) {
        self.record(Effect::Toast {
            level,
            message: message.to_string(),
        });
    }

    async fn notify(&self, _level: Level, title: &str, message: &str) {
        self.record(Effect::Notify {
            title: title.to_string(),
            message: message.to_string(),
        });
    }

    async fn alert(&self, dialog: &Dialog) -> bool {
        self.record(Effect::Alert(dialog.clone()));
        self.alert_answer.load(Ordering::SeqCst)
    }

    async fn confirm(&self, dialog: &Dialog) -> bool {
        self.record(Effect::Confirm(dialog.clone()));
        self.confirm_answer.load(Ordering::SeqCst)
    }

    async fn redirect(&self, route: &str, delay: Duration) {
        self.record(Effect::Redirect {
            route: route.to_string(),
            delay,
        });
    }
}
