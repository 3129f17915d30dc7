//! Error types for Tether.

pub mod normalize;
pub mod response;

pub use normalize::{normalize, RawFailure};
pub use response::{ErrorResponse, FieldErrors, UNKNOWN_ERROR};

use thiserror::Error;

use crate::auth::CredentialError;
use crate::classify::{classify, Classification, ErrorCategory};
use crate::taxonomy::ErrorTaxonomy;

/// Primary error type for all Tether operations.
#[derive(Error, Debug)]
pub enum TetherError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A normalized backend or transport failure.
    #[error("API error {}: {}", .0.code, .0.message)]
    Api(ErrorResponse),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl TetherError {
    /// Wrap a normalized failure.
    pub fn api(response: ErrorResponse) -> Self {
        Self::Api(response)
    }

    /// The normalized failure, when this error carries one.
    pub fn response(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Api(response) => Some(response),
            _ => None,
        }
    }

    /// Category of the failure. Coded failures resolve through `taxonomy`.
    pub fn category(&self, taxonomy: &ErrorTaxonomy) -> ErrorCategory {
        match self {
            Self::Api(response) => match classify(response) {
                Classification::Code(code) => taxonomy.lookup(&code).category,
                Classification::Range(category) => category,
            },
            Self::Network(_) | Self::Timeout(_) => ErrorCategory::Network,
            Self::Credential(_) => ErrorCategory::Authentication,
            _ => ErrorCategory::Business,
        }
    }

    /// Coded failures defer to `taxonomy`, uncoded ones retry from 5000 up,
    /// transport failures and timeouts always retry.
    pub fn is_retryable_in(&self, taxonomy: &ErrorTaxonomy) -> bool {
        match self {
            Self::Api(response) => taxonomy.is_response_retryable(response),
            Self::Network(_) | Self::Timeout(_) => true,
            _ => false,
        }
    }

    /// Field → messages map for validation failures.
    pub fn field_errors(&self) -> Option<FieldErrors> {
        self.response().and_then(ErrorResponse::field_errors)
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TetherError>;
