//! Built-in handlers, in chain order.

use std::time::Duration;

use async_trait::async_trait;

use super::presenter::{Dialog, Level};
use super::{ErrorHandler, HandlerContext, HandlerOutcome};
use crate::auth::CredentialManager;
use crate::classify::{Classification, ErrorCategory};
use crate::error::ErrorResponse;
use crate::taxonomy::{ErrorTaxonomy, Severity};

const VALIDATION_NOTICE: &str = "Please check the form input";

fn log_failure(response: &ErrorResponse, kind: &str) {
    tracing::error!(
        kind,
        code = response.code,
        error_code = %response.error_code,
        message = %response.message,
        data = ?response.data,
        "Request failed"
    );
}

/// Whether a coded classification's taxonomy entry has `category`.
fn entry_is(classification: &Classification, taxonomy: &ErrorTaxonomy, category: ErrorCategory) -> bool {
    match classification {
        Classification::Code(code) => taxonomy
            .get(code)
            .map(|entry| entry.category == category)
            .unwrap_or(false),
        Classification::Range(_) => false,
    }
}

fn toast_duration(severity: Severity) -> Duration {
    match severity {
        Severity::High => Duration::from_secs(5),
        Severity::Medium => Duration::from_secs(4),
        _ => Duration::from_secs(3),
    }
}

/// Ends the session: clears credentials, tells the user, redirects to login.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthenticationHandler;

#[async_trait]
impl ErrorHandler for AuthenticationHandler {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn can_handle(&self, classification: &Classification, taxonomy: &ErrorTaxonomy) -> bool {
        match classification {
            Classification::Range(category) => *category == ErrorCategory::Authentication,
            Classification::Code(code) => taxonomy.clears_session(code),
        }
    }

    async fn handle(&self, response: &ErrorResponse, context: &HandlerContext) -> HandlerOutcome {
        log_failure(response, self.name());
        // A failed refresh has already cleared the session.
        let holds_session = |c: &&CredentialManager| c.has_token() || c.refresh_token().is_some();
        if let Some(credentials) = context.credentials.as_ref().filter(holds_session) {
            credentials.clear_credentials();
        }
        let message = context.user_message(response);
        context
            .presenter
            .toast(Level::Warning, &message, toast_duration(Severity::Medium))
            .await;
        context
            .presenter
            .redirect(&context.config.login_route, context.config.redirect_delay)
            .await;
        HandlerOutcome::resolved()
    }
}

/// Blocks the action and points at the taxonomy's guidance.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionHandler;

#[async_trait]
impl ErrorHandler for PermissionHandler {
    fn name(&self) -> &'static str {
        "permission"
    }

    fn can_handle(&self, classification: &Classification, taxonomy: &ErrorTaxonomy) -> bool {
        classification.is_range(ErrorCategory::Permission)
            || entry_is(classification, taxonomy, ErrorCategory::Permission)
    }

    async fn handle(&self, response: &ErrorResponse, context: &HandlerContext) -> HandlerOutcome {
        log_failure(response, self.name());
        let guidance = context.taxonomy.guidance(&response.error_code);
        let dialog = Dialog {
            title: "Permission denied".to_string(),
            message: context.user_message(response),
            confirm_label: guidance
                .map(|g| g.action.clone())
                .unwrap_or_else(|| "OK".to_string()),
            cancel_label: None,
            level: Level::Warning,
        };
        let acknowledged = context.presenter.alert(&dialog).await;
        if !acknowledged {
            tracing::debug!("Permission dialog dismissed");
        } else if let Some(route) = guidance.and_then(|g| g.route.as_deref()) {
            context.presenter.redirect(route, Duration::ZERO).await;
        }
        HandlerOutcome::resolved()
    }
}

/// Leaves the failure to the form layer; only posts a generic notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationHandler;

#[async_trait]
impl ErrorHandler for ValidationHandler {
    fn name(&self) -> &'static str {
        "validation"
    }

    fn can_handle(&self, classification: &Classification, taxonomy: &ErrorTaxonomy) -> bool {
        classification.is_range(ErrorCategory::Validation)
            || entry_is(classification, taxonomy, ErrorCategory::Validation)
    }

    async fn handle(&self, response: &ErrorResponse, context: &HandlerContext) -> HandlerOutcome {
        log_failure(response, self.name());
        context
            .presenter
            .toast(Level::Error, VALIDATION_NOTICE, toast_duration(Severity::Low))
            .await;
        HandlerOutcome::unresolved(response.field_errors())
    }
}

/// Connectivity and timeout failures: persistent notice, automatic retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkHandler;

#[async_trait]
impl ErrorHandler for NetworkHandler {
    fn name(&self) -> &'static str {
        "network"
    }

    fn can_handle(&self, classification: &Classification, taxonomy: &ErrorTaxonomy) -> bool {
        entry_is(classification, taxonomy, ErrorCategory::Network)
    }

    async fn handle(&self, response: &ErrorResponse, context: &HandlerContext) -> HandlerOutcome {
        log_failure(response, self.name());
        let message = context.user_message(response);
        context
            .presenter
            .notify(Level::Error, "Network connection failed", &message)
            .await;
        HandlerOutcome::retry(context.config.network_retry_delay, false)
    }
}

/// Server-side failures. Retryable ones are retried only if the user confirms.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerHandler;

#[async_trait]
impl ErrorHandler for ServerHandler {
    fn name(&self) -> &'static str {
        "server"
    }

    fn can_handle(&self, classification: &Classification, taxonomy: &ErrorTaxonomy) -> bool {
        match classification {
            Classification::Range(category) => *category == ErrorCategory::Server,
            Classification::Code(code) => {
                taxonomy.is_retryable(code) || entry_is(classification, taxonomy, ErrorCategory::Server)
            }
        }
    }

    async fn handle(&self, response: &ErrorResponse, context: &HandlerContext) -> HandlerOutcome {
        log_failure(response, self.name());
        let message = context.user_message(response);

        if !context.taxonomy.is_response_retryable(response) {
            context
                .presenter
                .toast(Level::Error, &message, toast_duration(Severity::Low))
                .await;
            return HandlerOutcome::resolved();
        }

        let dialog = Dialog {
            title: "Server error".to_string(),
            message,
            confirm_label: "Retry".to_string(),
            cancel_label: Some("Cancel".to_string()),
            level: Level::Error,
        };
        if context.presenter.confirm(&dialog).await {
            HandlerOutcome::retry(context.config.server_retry_delay, true)
        } else {
            tracing::debug!("Server retry declined");
            HandlerOutcome::resolved()
        }
    }
}

/// Catch-all for domain failures: dialog with guidance, or a toast.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusinessHandler;

impl BusinessHandler {
    fn dialog_title(error_code: &str) -> &'static str {
        if error_code.contains("QUOTA") {
            "Quota exceeded"
        } else if error_code.contains("EXPIRED") {
            "Expired"
        } else if error_code.contains("NOT_FOUND") {
            "Not found"
        } else if error_code.contains("INSUFFICIENT") {
            "Insufficient balance"
        } else {
            "Notice"
        }
    }
}

#[async_trait]
impl ErrorHandler for BusinessHandler {
    fn name(&self) -> &'static str {
        "business"
    }

    fn can_handle(&self, _classification: &Classification, _taxonomy: &ErrorTaxonomy) -> bool {
        true
    }

    async fn handle(&self, response: &ErrorResponse, context: &HandlerContext) -> HandlerOutcome {
        log_failure(response, self.name());
        let message = context.user_message(response);
        let severity = context.taxonomy.severity(&response.error_code);
        let guidance = context.taxonomy.guidance(&response.error_code);

        match guidance {
            Some(guidance) if matches!(severity, Severity::Medium | Severity::High) => {
                let dialog = Dialog {
                    title: Self::dialog_title(&response.error_code).to_string(),
                    message,
                    confirm_label: guidance.action.clone(),
                    cancel_label: Some("Cancel".to_string()),
                    level: if severity == Severity::High {
                        Level::Error
                    } else {
                        Level::Warning
                    },
                };
                if context.presenter.confirm(&dialog).await {
                    if let Some(route) = &guidance.route {
                        context.presenter.redirect(route, Duration::ZERO).await;
                    }
                } else {
                    tracing::debug!(error_code = %response.error_code, "Guidance declined");
                }
            }
            _ => {
                let level = if severity == Severity::High {
                    Level::Error
                } else {
                    Level::Warning
                };
                context
                    .presenter
                    .toast(level, &message, toast_duration(severity))
                    .await;
            }
        }
        HandlerOutcome::resolved()
    }
}
