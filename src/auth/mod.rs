//! Credential storage and single-flight token refresh.

pub mod error;
pub mod exchange;
pub mod manager;
pub mod store;
pub mod token;

pub use error::CredentialError;
pub use exchange::{HttpRefreshExchange, RefreshExchange, RefreshedTokens};
pub use manager::{CredentialConfig, CredentialManager, RefreshOutcome, SessionListener};
pub use store::{
    default_credentials_dir, CredentialStore, FileCredentialStore, MemoryCredentialStore,
    ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
