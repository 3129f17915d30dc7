//! Conversion of raw transport failures into [`ErrorResponse`].

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::response::{ErrorResponse, UNKNOWN_ERROR};
use crate::taxonomy::ErrorTaxonomy;

const INVALID_REQUEST_MESSAGE: &str = "Invalid request parameters";
const REQUEST_FAILED_MESSAGE: &str = "Request failed";

static PYTHON_LITERALS: OnceLock<Regex> = OnceLock::new();

/// A failure as observed at the transport boundary.
#[derive(Debug, Clone, Default)]
pub struct RawFailure {
    pub status: Option<u16>,
    pub body: Option<Value>,
    pub transport_message: Option<String>,
    pub timed_out: bool,
}

impl RawFailure {
    /// Failure with an HTTP response. Non-JSON bodies are kept as a string.
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = body.trim();
        let body = if body.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str::<Value>(body)
                    .unwrap_or_else(|_| Value::String(body.to_string())),
            )
        };
        Self {
            status: Some(status),
            body,
            transport_message: None,
            timed_out: false,
        }
    }

    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        Self {
            status: error.status().map(|s| s.as_u16()),
            body: None,
            transport_message: Some(error.to_string()),
            timed_out: error.is_timeout(),
        }
    }

    /// Failure with no response at all.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            transport_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::transport(message)
        }
    }
}

/// Build the standard error response for a raw failure.
///
/// Bodies already in the standard `{code, message, error_code?}` shape win;
/// otherwise the HTTP status decides (400 validation, 401 authentication,
/// 403 permission, 404 not found, ≥500 server), and failures without a
/// response map to timeout or network errors.
pub fn normalize(raw: &RawFailure, taxonomy: &ErrorTaxonomy) -> ErrorResponse {
    if let Some(response) = raw.body.as_ref().and_then(|body| from_standard_body(body, taxonomy)) {
        return response;
    }

    let Some(status) = raw.status else {
        return from_transport(raw, taxonomy);
    };

    match status {
        400 => from_validation_body(raw.body.as_ref()),
        401 => known(4001, "AUTH_NOT_AUTHENTICATED", taxonomy),
        403 => with_body(known(4003, "AUTH_PERMISSION_DENIED", taxonomy), raw.body.as_ref()),
        404 => known(4040, "RESOURCE_NOT_FOUND", taxonomy),
        s if s >= 500 => with_body(known(5000, "INTERNAL_SERVER_ERROR", taxonomy), raw.body.as_ref()),
        s => {
            let message = raw
                .body
                .as_ref()
                .and_then(body_message)
                .unwrap_or_else(|| format!("Request failed with status {s}"));
            with_body(ErrorResponse::unknown(i32::from(s), message), raw.body.as_ref())
        }
    }
}

/// Flatten a DRF-style error payload into one display string.
///
/// Handles plain strings, lists of strings or `ErrorDetail` objects,
/// `non_field_errors`, `{field: [messages]}` maps (`field: msg; ...`),
/// and `message`/`detail` keys.
pub fn format_error_message(errors: &Value) -> String {
    match errors {
        Value::String(message) => message.clone(),
        Value::Null => REQUEST_FAILED_MESSAGE.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(message) => message.clone(),
                Value::Object(detail) => detail
                    .get("string")
                    .or_else(|| detail.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| item.to_string()),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => format_error_object(map),
        other => other.to_string(),
    }
}

fn format_error_object(map: &Map<String, Value>) -> String {
    if let Some(non_field @ Value::Array(_)) = map.get("non_field_errors") {
        return format_error_message(non_field);
    }

    let mut field_errors = Vec::new();
    let mut has_field_lists = false;
    for (field, value) in map {
        match value {
            Value::Array(items) if !items.is_empty() => {
                has_field_lists = true;
                field_errors.push(format!("{field}: {}", format_error_message(value)));
            }
            Value::Object(_) => {
                field_errors.push(format!("{field}: {}", format_error_message(value)));
            }
            Value::Null | Value::Array(_) => {}
            Value::String(text) => field_errors.push(format!("{field}: {text}")),
            other => field_errors.push(format!("{field}: {other}")),
        }
    }

    if has_field_lists {
        return field_errors.join("; ");
    }
    if let Some(message) = map.get("message").and_then(Value::as_str) {
        return message.to_string();
    }
    if let Some(detail) = map.get("detail").and_then(Value::as_str) {
        return detail.to_string();
    }
    field_errors
        .into_iter()
        .next()
        .unwrap_or_else(|| REQUEST_FAILED_MESSAGE.to_string())
}

fn from_standard_body(body: &Value, taxonomy: &ErrorTaxonomy) -> Option<ErrorResponse> {
    let object = body.as_object()?;
    if object.get("success").and_then(Value::as_bool) == Some(true) {
        return None;
    }
    let code = i32::try_from(object.get("code")?.as_i64()?).ok()?;
    let message = object.get("message")?.as_str()?.to_string();
    let error_code = object
        .get("error_code")
        .and_then(Value::as_str)
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| taxonomy.error_code_for(code));
    let data = object
        .get("data")
        .filter(|d| !d.is_null())
        .or_else(|| object.get("errors").filter(|e| !e.is_null()))
        .cloned();

    let mut response = ErrorResponse::new(code, error_code, message);
    response.data = data;
    Some(response)
}

fn from_validation_body(body: Option<&Value>) -> ErrorResponse {
    let (message, detail) = match body {
        Some(Value::Object(map)) if !map.is_empty() => {
            if let Some(errors @ Value::Object(_)) = map.get("errors") {
                (format_error_message(errors), Some(errors.clone()))
            } else if let Some(raw_message) = map.get("message").and_then(Value::as_str) {
                match parse_embedded_object(raw_message) {
                    Some(parsed) => (format_error_message(&parsed), Some(parsed)),
                    None => (raw_message.to_string(), Some(Value::Object(map.clone()))),
                }
            } else {
                let value = Value::Object(map.clone());
                (format_error_message(&value), Some(value))
            }
        }
        Some(Value::String(text)) => (text.clone(), None),
        _ => (INVALID_REQUEST_MESSAGE.to_string(), None),
    };
    tracing::debug!(message = %message, "Normalized validation failure");
    let response = ErrorResponse::new(4000, "VALIDATION_ERROR", message);
    match detail {
        Some(detail) => response.with_data(detail),
        None => response,
    }
}

fn from_transport(raw: &RawFailure, taxonomy: &ErrorTaxonomy) -> ErrorResponse {
    let transport_message = raw.transport_message.as_deref().unwrap_or_default();
    let lowered = transport_message.to_ascii_lowercase();
    let response = if raw.timed_out || lowered.contains("timeout") || lowered.contains("timed out") {
        known(5001, "REQUEST_TIMEOUT", taxonomy)
    } else {
        known(5002, "NETWORK_ERROR", taxonomy)
    };
    if transport_message.is_empty() {
        response
    } else {
        response.with_data(serde_json::json!({ "transport": transport_message }))
    }
}

/// Backends sometimes stringify a Python dict into `message`.
fn parse_embedded_object(message: &str) -> Option<Value> {
    let candidate = if message.contains('\'') && !message.contains('"') {
        let regex = PYTHON_LITERALS.get_or_init(|| {
            Regex::new(r"\b(True|False|None)\b").expect("literal pattern is valid")
        });
        let quoted = message.replace('\'', "\"");
        regex
            .replace_all(&quoted, |caps: &regex::Captures<'_>| match &caps[1] {
                "True" => "true",
                "False" => "false",
                _ => "null",
            })
            .into_owned()
    } else {
        message.to_string()
    };
    serde_json::from_str::<Value>(&candidate)
        .ok()
        .filter(Value::is_object)
}

fn body_message(body: &Value) -> Option<String> {
    match body {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("detail"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn known(code: i32, error_code: &str, taxonomy: &ErrorTaxonomy) -> ErrorResponse {
    let message = taxonomy.user_message(error_code, None);
    let error_code = if taxonomy.get(error_code).is_some() {
        error_code
    } else {
        UNKNOWN_ERROR
    };
    ErrorResponse::new(code, error_code, message)
}

fn with_body(response: ErrorResponse, body: Option<&Value>) -> ErrorResponse {
    match body {
        Some(body) if !body.is_null() => response.with_data(body.clone()),
        _ => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn taxonomy() -> ErrorTaxonomy {
        ErrorTaxonomy::builtin()
    }

    #[test]
    fn standard_body_is_preferred_over_status() {
        let raw = RawFailure::from_status(
            500,
            r#"{"success": false, "code": 4203, "message": "quota", "error_code": "LICENSE_QUOTA_EXCEEDED"}"#,
        );
        let response = normalize(&raw, &taxonomy());
        assert_eq!(response.code, 4203);
        assert_eq!(response.error_code, "LICENSE_QUOTA_EXCEEDED");
        assert_eq!(response.message, "quota");
    }

    #[test]
    fn standard_body_without_error_code_uses_numeric_map() {
        let raw = RawFailure::from_status(200, r#"{"success": false, "code": 4401, "message": "poor"}"#);
        let response = normalize(&raw, &taxonomy());
        assert_eq!(response.error_code, "POINTS_INSUFFICIENT");
    }

    #[test]
    fn unmapped_standard_code_keeps_sentinel() {
        let raw = RawFailure::from_status(200, r#"{"code": 4999, "message": "odd"}"#);
        let response = normalize(&raw, &taxonomy());
        assert_eq!(response.error_code, UNKNOWN_ERROR);
        assert_eq!(response.code, 4999);
    }

    #[test]
    fn status_fallbacks_map_to_families() {
        let tax = taxonomy();
        assert_eq!(normalize(&RawFailure::from_status(401, ""), &tax).error_code, "AUTH_NOT_AUTHENTICATED");
        assert_eq!(normalize(&RawFailure::from_status(403, "nope"), &tax).code, 4003);
        assert_eq!(normalize(&RawFailure::from_status(404, ""), &tax).error_code, "RESOURCE_NOT_FOUND");
        assert_eq!(normalize(&RawFailure::from_status(502, "<html>"), &tax).code, 5000);

        let conflict = normalize(&RawFailure::from_status(409, r#"{"detail": "duplicate"}"#), &tax);
        assert_eq!(conflict.code, 409);
        assert_eq!(conflict.error_code, UNKNOWN_ERROR);
        assert_eq!(conflict.message, "duplicate");
    }

    #[test]
    fn transport_failures_split_timeout_and_network() {
        let tax = taxonomy();
        let timeout = normalize(&RawFailure::transport("operation timed out"), &tax);
        assert_eq!(timeout.error_code, "REQUEST_TIMEOUT");
        assert_eq!(timeout.code, 5001);
        let flagged = normalize(&RawFailure::timeout("deadline"), &tax);
        assert_eq!(flagged.error_code, "REQUEST_TIMEOUT");
        let network = normalize(&RawFailure::transport("connection refused"), &tax);
        assert_eq!(network.error_code, "NETWORK_ERROR");
        assert_eq!(network.code, 5002);
    }

    #[test]
    fn validation_body_with_errors_object_flattens_fields() {
        let raw = RawFailure::from_status(
            400,
            r#"{"errors": {"email": ["invalid format"], "name": ["required", "too short"]}}"#,
        );
        let response = normalize(&raw, &taxonomy());
        assert_eq!(response.error_code, "VALIDATION_ERROR");
        assert_eq!(response.message, "email: invalid format; name: required, too short");
        let fields = response.field_errors().unwrap();
        assert_eq!(fields["email"], vec!["invalid format"]);
    }

    #[test]
    fn validation_message_with_python_dict_is_parsed() {
        let raw = RawFailure::from_status(
            400,
            r#"{"message": "{'username': ['already taken'], 'active': True}"}"#,
        );
        let response = normalize(&raw, &taxonomy());
        assert_eq!(response.message, "active: true; username: already taken");
        assert_eq!(
            response.data,
            Some(json!({"username": ["already taken"], "active": true}))
        );
    }

    #[test]
    fn validation_message_plain_text_is_kept() {
        let raw = RawFailure::from_status(400, r#"{"message": "bad date range"}"#);
        assert_eq!(normalize(&raw, &taxonomy()).message, "bad date range");
    }

    #[test]
    fn format_error_message_handles_drf_shapes() {
        assert_eq!(
            format_error_message(&json!({"non_field_errors": ["a", {"string": "b"}]})),
            "a, b"
        );
        assert_eq!(format_error_message(&json!({"detail": "not allowed"})), "not allowed");
        assert_eq!(format_error_message(&json!({"message": "m", "code": 3})), "m");
        assert_eq!(format_error_message(&Value::Null), "Request failed");
        assert_eq!(format_error_message(&json!([{"message": "x"}, 3])), "x, 3");
    }
}
