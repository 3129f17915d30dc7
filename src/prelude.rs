//! Convenience re-exports for common use.

pub use crate::auth::{
    CredentialConfig, CredentialError, CredentialManager, CredentialStore, FileCredentialStore,
    HttpRefreshExchange, MemoryCredentialStore, RefreshExchange, SessionListener,
};
pub use crate::classify::{classify, Classification, ErrorCategory};
pub use crate::client::{ApiClient, ApiRequest};
pub use crate::config::TetherConfig;
pub use crate::error::{ErrorResponse, Result, TetherError};
pub use crate::handlers::{ErrorHandlerChain, HandlerContext, HandlerOutcome, Presenter};
pub use crate::taxonomy::{ErrorTaxonomy, Severity};
pub use crate::util::retry::{RetryOptions, RetryPolicy};
