//! User-facing side effects requested by handlers.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Visual weight of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// Blocking dialog contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
    /// `None` for single-button alerts.
    pub cancel_label: Option<String>,
    pub level: Level,
}

/// Boundary to whatever renders messages and performs navigation.
///
/// Handlers decide *what* to show; presenters decide *how*.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Transient message dismissed after `duration`.
    async fn toast(&self, level: Level, message: &str, duration: Duration);

    /// Persistent notification the user closes manually.
    async fn notify(&self, level: Level, title: &str, message: &str);

    /// Single-button dialog. Returns `true` if acknowledged, `false` if dismissed.
    async fn alert(&self, dialog: &Dialog) -> bool;

    /// Two-button dialog. Returns `true` if confirmed.
    async fn confirm(&self, dialog: &Dialog) -> bool;

    /// Navigate to `route` after `delay`. Must not block for `delay`.
    async fn redirect(&self, route: &str, delay: Duration);
}

/// Headless presenter: logs every effect and declines every dialog.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPresenter;

#[async_trait]
impl Presenter for TracingPresenter {
    async fn toast(&self, level: Level, message: &str, duration: Duration) {
        tracing::info!(%level, duration_ms = duration.as_millis() as u64, message, "toast");
    }

    async fn notify(&self, level: Level, title: &str, message: &str) {
        tracing::warn!(%level, title, message, "notification");
    }

    async fn alert(&self, dialog: &Dialog) -> bool {
        tracing::info!(title = %dialog.title, message = %dialog.message, "alert dismissed");
        false
    }

    async fn confirm(&self, dialog: &Dialog) -> bool {
        tracing::info!(title = %dialog.title, message = %dialog.message, "confirmation declined");
        false
    }

    async fn redirect(&self, route: &str, delay: Duration) {
        tracing::info!(route, delay_ms = delay.as_millis() as u64, "redirect requested");
    }
}
