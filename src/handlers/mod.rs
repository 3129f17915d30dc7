//! Error handler chain: one fixed-priority handler per failure category.

pub mod presenter;
pub mod strategies;

pub use presenter::{Dialog, Level, Presenter, TracingPresenter};
pub use strategies::{
    AuthenticationHandler, BusinessHandler, NetworkHandler, PermissionHandler, ServerHandler,
    ValidationHandler,
};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;

use crate::auth::CredentialManager;
use crate::classify::{classify, Classification};
use crate::error::{ErrorResponse, FieldErrors};
use crate::taxonomy::ErrorTaxonomy;

const FALLBACK_MESSAGE: &str = "Operation failed";
const FALLBACK_TOAST: Duration = Duration::from_secs(3);

/// Result of handling one failure.
///
/// Only handled outcomes can ask for a retry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HandlerOutcome {
    handled: bool,
    retry_after: Option<Duration>,
    user_confirmed: bool,
    field_errors: Option<FieldErrors>,
}

impl HandlerOutcome {
    /// Fully handled, no retry.
    pub fn resolved() -> Self {
        Self {
            handled: true,
            ..Self::default()
        }
    }

    /// Left for the caller to finish, e.g. mapping field errors onto a form.
    pub fn unresolved(field_errors: Option<FieldErrors>) -> Self {
        Self {
            field_errors,
            ..Self::default()
        }
    }

    /// Handled; replay the request after `after`.
    pub fn retry(after: Duration, user_confirmed: bool) -> Self {
        Self {
            handled: true,
            retry_after: Some(after),
            user_confirmed,
            field_errors: None,
        }
    }

    pub fn handled(&self) -> bool {
        self.handled
    }

    pub fn should_retry(&self) -> bool {
        self.retry_after.is_some()
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// The user explicitly asked for the retry.
    pub fn user_confirmed(&self) -> bool {
        self.user_confirmed
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        self.field_errors.as_ref()
    }
}

/// Delays and routes used by the built-in handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    pub login_route: String,
    /// Pause before the forced redirect so the message can be read.
    pub redirect_delay: Duration,
    pub network_retry_delay: Duration,
    pub server_retry_delay: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            login_route: "/login".to_string(),
            redirect_delay: Duration::from_millis(1500),
            network_retry_delay: Duration::from_secs(2),
            server_retry_delay: Duration::from_secs(1),
        }
    }
}

/// Everything a handler may touch.
#[derive(Clone, Builder)]
pub struct HandlerContext {
    #[builder(default = ErrorTaxonomy::shared())]
    pub taxonomy: Arc<ErrorTaxonomy>,
    #[builder(default = Arc::new(TracingPresenter) as Arc<dyn Presenter>)]
    pub presenter: Arc<dyn Presenter>,
    /// Cleared by the authentication handler.
    pub credentials: Option<CredentialManager>,
    #[builder(default)]
    pub config: HandlerConfig,
}

impl Default for HandlerContext {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("taxonomy_entries", &self.taxonomy.len())
            .field("credentials", &self.credentials)
            .field("config", &self.config)
            .finish()
    }
}

impl HandlerContext {
    /// Display text for a failure: the taxonomy message, else the raw message.
    pub fn user_message(&self, response: &ErrorResponse) -> String {
        self.taxonomy
            .user_message(&response.error_code, Some(&response.message))
    }
}

/// One link of the chain.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, classification: &Classification, taxonomy: &ErrorTaxonomy) -> bool;

    async fn handle(&self, response: &ErrorResponse, context: &HandlerContext) -> HandlerOutcome;
}

/// Dispatches each failure to the first handler that claims it.
///
/// Order: authentication, permission, validation, network, server, business.
///
/// # Example
/// ```
/// use tether::error::ErrorResponse;
/// use tether::handlers::{ErrorHandlerChain, HandlerContext};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let chain = ErrorHandlerChain::new(HandlerContext::default());
/// let failure = ErrorResponse::new(4000, "VALIDATION_ERROR", "invalid")
///     .with_data(serde_json::json!({"email": ["invalid format"]}));
/// let outcome = chain.handle(&failure).await;
/// assert!(!outcome.handled());
/// assert!(outcome.field_errors().is_some());
/// # }
/// ```
pub struct ErrorHandlerChain {
    handlers: Vec<Box<dyn ErrorHandler>>,
    context: HandlerContext,
}

impl fmt::Debug for ErrorHandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandlerChain")
            .field("handlers", &self.handler_names())
            .field("context", &self.context)
            .finish()
    }
}

impl ErrorHandlerChain {
    pub fn new(context: HandlerContext) -> Self {
        Self {
            handlers: vec![
                Box::new(AuthenticationHandler),
                Box::new(PermissionHandler),
                Box::new(ValidationHandler),
                Box::new(NetworkHandler),
                Box::new(ServerHandler),
                Box::new(BusinessHandler),
            ],
            context,
        }
    }

    pub fn context(&self) -> &HandlerContext {
        &self.context
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Name of the handler that would claim `response`.
    pub fn select(&self, response: &ErrorResponse) -> Option<&'static str> {
        let classification = classify(response);
        self.find(&classification).map(|h| h.name())
    }

    fn find(&self, classification: &Classification) -> Option<&dyn ErrorHandler> {
        self.handlers
            .iter()
            .find(|h| h.can_handle(classification, &self.context.taxonomy))
            .map(|h| h.as_ref())
    }

    pub async fn handle(&self, response: &ErrorResponse) -> HandlerOutcome {
        let classification = classify(response);
        tracing::debug!(
            category = %classification,
            code = response.code,
            error_code = %response.error_code,
            "Classified failure"
        );

        if let Some(handler) = self.find(&classification) {
            tracing::debug!(handler = handler.name(), "Dispatching failure");
            return handler.handle(response, &self.context).await;
        }

        tracing::warn!(category = %classification, "No handler claimed failure, using fallback");
        let message = if response.message.trim().is_empty() {
            FALLBACK_MESSAGE
        } else {
            response.message.as_str()
        };
        self.context
            .presenter
            .toast(Level::Error, message, FALLBACK_TOAST)
            .await;
        HandlerOutcome::resolved()
    }
}
