//! Error classification: normalized failure → category key.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::ErrorResponse;

/// Broad error category used by range-based classification and taxonomy entries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Authentication,
    Permission,
    Validation,
    /// Only reached through taxonomy entries; numeric codes never map here.
    Network,
    Tenant,
    License,
    User,
    Points,
    Cms,
    Server,
    Business,
}

/// Result of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The failure's own `error_code`; it is the key for every downstream lookup.
    Code(String),
    /// Fallback derived from the numeric `code`.
    Range(ErrorCategory),
}

impl Classification {
    /// Category key as a string (`"DATABASE_ERROR"`, `"license"`, ...).
    pub fn as_str(&self) -> &str {
        match self {
            Self::Code(code) => code,
            Self::Range(category) => category.as_ref(),
        }
    }

    pub fn is_range(&self, category: ErrorCategory) -> bool {
        matches!(self, Self::Range(c) if *c == category)
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a normalized failure.
///
/// A present `error_code` is returned as-is. Otherwise numeric rules apply in
/// order, first match wins: 4001–4004 authentication, 4003/4303 permission,
/// 4000 validation, 41xx tenant, 42xx license, 43xx user, 44xx points,
/// 45xx cms, ≥5000 server, anything else business.
///
/// # Example
/// ```
/// use tether::classify::{classify, Classification, ErrorCategory};
/// use tether::error::ErrorResponse;
///
/// let known = ErrorResponse::new(5003, "DATABASE_ERROR", "db down");
/// assert_eq!(classify(&known), Classification::Code("DATABASE_ERROR".into()));
///
/// let bare = ErrorResponse::unknown(4203, "quota");
/// assert_eq!(classify(&bare), Classification::Range(ErrorCategory::License));
/// ```
pub fn classify(response: &ErrorResponse) -> Classification {
    if response.has_error_code() {
        return Classification::Code(response.error_code.clone());
    }
    Classification::Range(classify_code(response.code))
}

/// Numeric-range fallback rules.
pub fn classify_code(code: i32) -> ErrorCategory {
    match code {
        4001..=4004 => ErrorCategory::Authentication,
        // 4003 is documented as permission but the authentication range wins.
        4303 => ErrorCategory::Permission,
        4000 => ErrorCategory::Validation,
        4100..=4199 => ErrorCategory::Tenant,
        4200..=4299 => ErrorCategory::License,
        4300..=4399 => ErrorCategory::User,
        4400..=4499 => ErrorCategory::Points,
        4500..=4599 => ErrorCategory::Cms,
        c if c >= 5000 => ErrorCategory::Server,
        _ => ErrorCategory::Business,
    }
}
