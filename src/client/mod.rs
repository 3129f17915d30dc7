//! API client wiring credentials, normalization, the handler chain and retry
//! around each request.

pub mod http;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::exchange::join_url;
use crate::auth::CredentialManager;
use crate::config::TetherConfig;
use crate::error::{normalize, ErrorResponse, RawFailure, Result, TetherError};
use crate::handlers::{
    ErrorHandlerChain, HandlerConfig, HandlerContext, HandlerOutcome, Presenter, TracingPresenter,
};
use crate::taxonomy::ErrorTaxonomy;
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_timeout;

pub use http::{is_idempotent_method, shared_client, unwrap_envelope, REQUEST_ID_HEADER};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Paths sent without credentials by default.
pub fn default_public_paths() -> Vec<String> {
    vec!["/auth/login/".to_string()]
}

/// One API call.
///
/// # Example
/// ```
/// use reqwest::Method;
/// use tether::client::ApiRequest;
///
/// let request = ApiRequest::builder()
///     .method(Method::POST)
///     .path("/orders/")
///     .body(serde_json::json!({"sku": "A-1"}))
///     .build();
/// assert!(!request.is_idempotent());
/// ```
#[derive(Debug, Clone, Builder)]
pub struct ApiRequest {
    pub method: Method,
    #[builder(into)]
    pub path: String,
    #[builder(default)]
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Overrides the method's idempotency for automatic retries.
    pub idempotent: Option<bool>,
    /// Overrides the client's request timeout.
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self::builder().method(method).path(path).build()
    }

    pub fn is_idempotent(&self) -> bool {
        self.idempotent
            .unwrap_or_else(|| is_idempotent_method(&self.method))
    }
}

/// How one attempt failed.
enum Failure {
    /// HTTP 401; eligible for refresh-and-replay.
    Unauthorized(RawFailure),
    Raw(RawFailure),
    /// Already normalized, e.g. a `success: false` envelope.
    Normalized(ErrorResponse),
}

/// HTTP client for the backend API.
///
/// Each request carries the current access token. On a 401 the token is
/// refreshed (single flight, shared with concurrent requests) and the request
/// is replayed once. Other failures are normalized, passed through the
/// handler chain once per attempt, and replayed only when the handler asks
/// for it, the retry policy agrees, and the request is idempotent or the user
/// confirmed the retry.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: CredentialManager,
    chain: Arc<ErrorHandlerChain>,
    retry: RetryPolicy,
    request_timeout: Duration,
    public_paths: Arc<Vec<String>>,
    preemptive_refresh: bool,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .field("public_paths", &self.public_paths)
            .field("preemptive_refresh", &self.preemptive_refresh)
            .finish()
    }
}

#[bon::bon]
impl ApiClient {
    #[builder]
    pub fn new(
        #[builder(into)] base_url: String,
        credentials: CredentialManager,
        taxonomy: Option<Arc<ErrorTaxonomy>>,
        presenter: Option<Arc<dyn Presenter>>,
        #[builder(default)] handler_config: HandlerConfig,
        #[builder(default)] retry: RetryPolicy,
        #[builder(default = DEFAULT_REQUEST_TIMEOUT)] request_timeout: Duration,
        #[builder(default = default_public_paths())] public_paths: Vec<String>,
        #[builder(default = true)] preemptive_refresh: bool,
        http: Option<reqwest::Client>,
    ) -> Self {
        let taxonomy = taxonomy.unwrap_or_else(|| retry.taxonomy().clone());
        let context = HandlerContext {
            taxonomy: taxonomy.clone(),
            presenter: presenter.unwrap_or_else(|| Arc::new(TracingPresenter) as Arc<dyn Presenter>),
            credentials: Some(credentials.clone()),
            config: handler_config,
        };
        Self {
            http: http.unwrap_or_else(|| shared_client().clone()),
            base_url,
            credentials,
            chain: Arc::new(ErrorHandlerChain::new(context)),
            retry: retry.with_taxonomy(taxonomy),
            request_timeout,
            public_paths: Arc::new(public_paths),
            preemptive_refresh,
        }
    }
}

impl ApiClient {
    /// Client configured from [`TetherConfig`].
    pub fn from_config(
        config: &TetherConfig,
        credentials: CredentialManager,
        presenter: Option<Arc<dyn Presenter>>,
    ) -> Result<Self> {
        let taxonomy = config.taxonomy()?;
        Ok(Self::builder()
            .base_url(config.base_url.clone())
            .credentials(credentials)
            .taxonomy(taxonomy.clone())
            .maybe_presenter(presenter)
            .handler_config(config.handlers.clone())
            .retry(config.retry_policy(taxonomy))
            .request_timeout(config.request_timeout)
            .public_paths(config.public_paths.clone())
            .preemptive_refresh(config.preemptive_refresh)
            .build())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    pub fn chain(&self) -> &ErrorHandlerChain {
        &self.chain
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(ApiRequest::new(Method::GET, path)).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let query = query
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        self.execute(
            ApiRequest::builder()
                .method(Method::GET)
                .path(path)
                .query(query)
                .build(),
        )
        .await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send_json(Method::POST, path, body).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send_json(Method::PUT, path, body).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send_json(Method::PATCH, path, body).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(ApiRequest::new(Method::DELETE, path)).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.execute(
            ApiRequest::builder()
                .method(method)
                .path(path)
                .body(body)
                .build(),
        )
        .await
    }

    /// Run a request through refresh, normalization, handling and retry.
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %request.method,
            path = %request.path
        );
        let value = self.run(&request, &request_id).instrument(span).await?;
        Ok(serde_json::from_value(value)?)
    }

    fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|public| path.ends_with(public.as_str()))
    }

    /// Another request refreshed the token after `sent` went out.
    fn token_replaced(&self, sent: Option<&str>) -> bool {
        matches!(self.credentials.access_token(), Some(current) if Some(current.as_str()) != sent)
    }

    /// Token to send, waiting out a refresh that is already running.
    async fn current_token(&self) -> Option<String> {
        if self.credentials.is_refreshing() {
            return self.credentials.wait_for_token_refresh().await.ok();
        }
        self.credentials.access_token()
    }

    async fn run(&self, request: &ApiRequest, request_id: &str) -> Result<Value> {
        let authenticated = !self.is_public(&request.path);
        if authenticated && self.preemptive_refresh {
            self.credentials.preemptive_refresh();
        }

        let taxonomy = Arc::clone(&self.chain.context().taxonomy);
        let mut attempt = 0u32;
        let mut refreshed = false;
        let mut replayed_stale = false;

        loop {
            let token = if authenticated {
                self.current_token().await
            } else {
                None
            };

            let failure = match self.send_once(request, token.as_deref(), request_id).await {
                Ok(value) => return Ok(value),
                Err(Failure::Unauthorized(_))
                    if authenticated && !replayed_stale && self.token_replaced(token.as_deref()) =>
                {
                    replayed_stale = true;
                    tracing::debug!("Token already refreshed, replaying request");
                    continue;
                }
                Err(Failure::Unauthorized(raw)) if authenticated && !refreshed => {
                    refreshed = true;
                    tracing::debug!("Unauthorized, refreshing token");
                    match self.credentials.refresh().await? {
                        Some(_) => {
                            tracing::info!("Replaying request with refreshed token");
                            continue;
                        }
                        None => {
                            tracing::debug!(status = ?raw.status, "Refresh yielded no token");
                            session_expired(&taxonomy)
                        }
                    }
                }
                Err(Failure::Unauthorized(raw)) | Err(Failure::Raw(raw)) => normalize(&raw, &taxonomy),
                Err(Failure::Normalized(response)) => response,
            };

            let outcome = self.chain.handle(&failure).await;
            let error = TetherError::Api(failure);
            if let Some(delay) = self.retry_delay(request, &outcome, &error, attempt) {
                attempt += 1;
                tracing::warn!(
                    attempt,
                    max_retries = self.retry.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retrying request"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
            return Err(error);
        }
    }

    fn retry_delay(
        &self,
        request: &ApiRequest,
        outcome: &HandlerOutcome,
        error: &TetherError,
        attempt: u32,
    ) -> Option<Duration> {
        let delay = outcome.retry_after()?;
        if !request.is_idempotent() && !outcome.user_confirmed() {
            tracing::debug!(method = %request.method, "Not replaying unconfirmed non-idempotent request");
            return None;
        }
        if !self.retry.should_retry(error, attempt) {
            return None;
        }
        Some(delay)
    }

    async fn send_once(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
        request_id: &str,
    ) -> std::result::Result<Value, Failure> {
        let url = join_url(&self.base_url, &request.path);
        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .headers(http::json_headers(request_id));
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let timeout = request.timeout.unwrap_or(self.request_timeout);
        let exchange = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, TetherError>((status, body))
        };
        let (status, body) = match with_timeout(timeout, exchange).await {
            Ok(received) => received,
            Err(TetherError::Timeout(ms)) => {
                return Err(Failure::Raw(RawFailure::timeout(format!(
                    "request timed out after {ms}ms"
                ))))
            }
            Err(TetherError::Network(err)) => return Err(Failure::Raw(RawFailure::from_reqwest(&err))),
            Err(other) => return Err(Failure::Raw(RawFailure::transport(other.to_string()))),
        };
        tracing::debug!(status, "Response received");

        if status == 401 {
            return Err(Failure::Unauthorized(RawFailure::from_status(status, &body)));
        }
        if !(200..300).contains(&status) {
            return Err(Failure::Raw(RawFailure::from_status(status, &body)));
        }
        unwrap_envelope(status, &body, &self.chain.context().taxonomy).map_err(Failure::Normalized)
    }
}

fn session_expired(taxonomy: &ErrorTaxonomy) -> ErrorResponse {
    let error_code = "AUTH_TOKEN_EXPIRED";
    ErrorResponse::new(4004, error_code, taxonomy.user_message(error_code, None))
}
