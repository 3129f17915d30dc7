//! Standard error response shared by classification, handling and retry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sentinel `error_code` for failures that carry no identifiable code.
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

/// Field name → ordered validation messages, consumed by form layers.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Normalized failure shape every error is converted to before classification.
///
/// # Example
/// ```
/// use tether::error::ErrorResponse;
///
/// let err = ErrorResponse::new(5003, "DATABASE_ERROR", "database unavailable");
/// assert!(!err.success);
/// assert!(err.has_error_code());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub success: bool,
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default = "unknown_error_code")]
    pub error_code: String,
}

impl ErrorResponse {
    pub fn new(code: i32, error_code: impl Into<String>, message: impl Into<String>) -> Self {
        let error_code = error_code.into();
        Self {
            success: false,
            code,
            message: message.into(),
            data: None,
            error_code: if error_code.trim().is_empty() {
                UNKNOWN_ERROR.to_string()
            } else {
                error_code
            },
        }
    }

    /// Failure without an identifiable code; classification falls back to `code`.
    pub fn unknown(code: i32, message: impl Into<String>) -> Self {
        Self::new(code, UNKNOWN_ERROR, message)
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Whether `error_code` identifies a taxonomy entry (i.e. is not the sentinel).
    pub fn has_error_code(&self) -> bool {
        !self.error_code.is_empty() && self.error_code != UNKNOWN_ERROR
    }

    /// Interpret `data` as a validation field map.
    ///
    /// Accepts `{field: ["msg", ...]}` and `{field: "msg"}`. Entries of any
    /// other shape are skipped. Returns `None` when `data` is absent, not an
    /// object, or yields no field messages.
    pub fn field_errors(&self) -> Option<FieldErrors> {
        let object = self.data.as_ref()?.as_object()?;
        let mut fields = FieldErrors::new();
        for (field, value) in object {
            let messages: Vec<String> = match value {
                serde_json::Value::String(message) => vec![message.clone()],
                serde_json::Value::Array(items) => items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
                _ => continue,
            };
            if !messages.is_empty() {
                fields.insert(field.clone(), messages);
            }
        }
        if fields.is_empty() {
            None
        } else {
            Some(fields)
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {}] {}", self.code, self.error_code, self.message)
    }
}

fn unknown_error_code() -> String {
    UNKNOWN_ERROR.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_error_code_becomes_sentinel() {
        let err = ErrorResponse::new(4000, "  ", "bad");
        assert_eq!(err.error_code, UNKNOWN_ERROR);
        assert!(!err.has_error_code());
    }

    #[test]
    fn deserializing_without_error_code_uses_sentinel() {
        let err: ErrorResponse =
            serde_json::from_value(json!({"code": 4101, "message": "missing tenant"})).unwrap();
        assert_eq!(err.error_code, UNKNOWN_ERROR);
        assert!(!err.success);
    }

    #[test]
    fn field_errors_reads_lists_and_single_strings() {
        let err = ErrorResponse::new(4000, "VALIDATION_ERROR", "invalid").with_data(json!({
            "email": ["invalid format", "already used"],
            "name": "required",
            "meta": {"nested": true}
        }));
        let fields = err.field_errors().unwrap();
        assert_eq!(fields["email"], vec!["invalid format", "already used"]);
        assert_eq!(fields["name"], vec!["required"]);
        assert!(!fields.contains_key("meta"));
    }

    #[test]
    fn field_errors_is_none_for_non_object_data() {
        let err = ErrorResponse::new(5000, "INTERNAL_SERVER_ERROR", "boom").with_data(json!("trace"));
        assert!(err.field_errors().is_none());
    }
}
