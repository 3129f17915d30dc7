//! Refresh-token exchange against the backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use super::error::CredentialError;

const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Tokens returned by a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: String,
    /// Rotated refresh token; `None` keeps the current one.
    pub refresh_token: Option<String>,
}

/// Swap a refresh token for a new access token.
#[async_trait]
pub trait RefreshExchange: Send + Sync {
    async fn exchange(&self, refresh_token: &str) -> Result<RefreshedTokens, CredentialError>;
}

/// `POST {base_url}{refresh_path}` with `{"refresh_token": ...}`.
///
/// Accepts the standard envelope `{"success": true, "data": {"token", "refresh_token"}}`
/// and the bare `{"access", "refresh"}` shape.
#[derive(Debug, Clone)]
pub struct HttpRefreshExchange {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpRefreshExchange {
    pub fn new(base_url: &str, refresh_path: &str) -> Self {
        Self {
            client: crate::client::http::shared_client().clone(),
            url: join_url(base_url, refresh_path),
            timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RefreshExchange for HttpRefreshExchange {
    async fn exchange(&self, refresh_token: &str) -> Result<RefreshedTokens, CredentialError> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Refresh token rejected");
            return Err(CredentialError::RefreshDenied(excerpt(&body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::InvalidResponse(format!(
                "refresh returned {}: {}",
                status.as_u16(),
                excerpt(&body)
            )));
        }

        let body = response.text().await?;
        let parsed: RefreshResponse = serde_json::from_str(&body)?;
        parsed.into_tokens()
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RefreshResponse {
    Envelope {
        success: bool,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        data: Option<EnvelopeTokens>,
    },
    Bare {
        access: String,
        #[serde(default)]
        refresh: Option<String>,
    },
}

#[derive(Deserialize)]
struct EnvelopeTokens {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl RefreshResponse {
    fn into_tokens(self) -> Result<RefreshedTokens, CredentialError> {
        match self {
            Self::Envelope {
                success: true,
                data: Some(EnvelopeTokens {
                    token: Some(token),
                    refresh_token,
                }),
                ..
            } if !token.is_empty() => Ok(RefreshedTokens {
                access_token: token,
                refresh_token: refresh_token.filter(|t| !t.is_empty()),
            }),
            Self::Envelope { message, .. } => Err(CredentialError::InvalidResponse(
                message.unwrap_or_else(|| "refresh response carried no token".to_string()),
            )),
            Self::Bare { access, refresh } if !access.is_empty() => Ok(RefreshedTokens {
                access_token: access,
                refresh_token: refresh.filter(|t| !t.is_empty()),
            }),
            Self::Bare { .. } => Err(CredentialError::InvalidResponse(
                "refresh response carried an empty token".to_string(),
            )),
        }
    }
}

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn excerpt(body: &str) -> String {
    body.chars().take(200).collect()
}
