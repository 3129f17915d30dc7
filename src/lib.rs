//! Tether: HTTP resilience layer for an administrative API client.
//!
//! Normalizes every failed request into one error shape, classifies it
//! against a configurable taxonomy, dispatches it to a fixed-priority handler
//! chain, retries it within bounds, and refreshes expired credentials with a
//! single in-flight exchange shared by all concurrent callers.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tether::prelude::*;
//!
//! # async fn example() -> tether::error::Result<()> {
//! let config = TetherConfig::from_env()?;
//! let credentials = config.credential_manager(Arc::new(config.file_credential_store()), None);
//! let client = ApiClient::from_config(&config, credentials, None)?;
//! let profile: serde_json::Value = client.get("/users/me/").await?;
//! println!("{profile}");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod prelude;
pub mod taxonomy;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
