//! Shared HTTP client and response envelope handling.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

use crate::error::{normalize, ErrorResponse, RawFailure};
use crate::taxonomy::ErrorTaxonomy;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// JSON headers plus the correlation id.
pub fn json_headers(request_id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, val);
    }
    headers
}

/// Methods that may be replayed without user confirmation.
pub fn is_idempotent_method(method: &Method) -> bool {
    matches!(
        method.as_str(),
        "GET" | "HEAD" | "OPTIONS" | "PUT" | "DELETE" | "TRACE"
    )
}

/// Unwrap the backend's `{success, data}` envelope.
///
/// `success: true` yields `data`; `success: false` is a failure even with a
/// 2xx status. Bodies without the envelope are returned whole.
pub fn unwrap_envelope(
    status: u16,
    body: &str,
    taxonomy: &ErrorTaxonomy,
) -> Result<Value, ErrorResponse> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    let Ok(mut value) = serde_json::from_str::<Value>(trimmed) else {
        return Ok(Value::String(body.to_string()));
    };
    match value.get("success").and_then(Value::as_bool) {
        Some(true) => Ok(value
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null)),
        Some(false) => {
            let raw = RawFailure {
                status: Some(status),
                body: Some(value),
                ..RawFailure::default()
            };
            Err(normalize(&raw, taxonomy))
        }
        None => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_success_yields_data() {
        let taxonomy = ErrorTaxonomy::builtin();
        let value = unwrap_envelope(200, r#"{"success": true, "code": 2000, "data": {"id": 7}}"#, &taxonomy)
            .unwrap();
        assert_eq!(value, json!({"id": 7}));
    }

    #[test]
    fn envelope_failure_with_ok_status_is_an_error() {
        let taxonomy = ErrorTaxonomy::builtin();
        let err = unwrap_envelope(
            200,
            r#"{"success": false, "code": 4401, "message": "not enough", "error_code": "POINTS_INSUFFICIENT"}"#,
            &taxonomy,
        )
        .unwrap_err();
        assert_eq!(err.error_code, "POINTS_INSUFFICIENT");
        assert_eq!(err.code, 4401);
    }

    #[test]
    fn non_envelope_bodies_pass_through() {
        let taxonomy = ErrorTaxonomy::builtin();
        assert_eq!(unwrap_envelope(200, "[1,2]", &taxonomy).unwrap(), json!([1, 2]));
        assert_eq!(unwrap_envelope(204, "", &taxonomy).unwrap(), Value::Null);
        assert_eq!(unwrap_envelope(200, "plain", &taxonomy).unwrap(), json!("plain"));
    }

    #[test]
    fn idempotency_follows_method() {
        assert!(is_idempotent_method(&Method::GET));
        assert!(is_idempotent_method(&Method::PUT));
        assert!(!is_idempotent_method(&Method::POST));
        assert!(!is_idempotent_method(&Method::PATCH));
    }
}
