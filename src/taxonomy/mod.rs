//! Error taxonomy: stable error code → category, severity, message, guidance, retryability.
//!
//! Entries are keyed by the backend's stable string identifier rather than by
//! display text, so retry and severity decisions evolve independently of
//! messages. The built-in table can be extended or overridden from TOML.

mod builtin;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::classify::ErrorCategory;
use crate::error::{ErrorResponse, TetherError, UNKNOWN_ERROR};

static SHARED_TAXONOMY: OnceLock<Arc<ErrorTaxonomy>> = OnceLock::new();

const DEFAULT_USER_MESSAGE: &str = "Operation failed";

/// How urgently a failure should be surfaced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// UI affordance suggested for a guidance action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GuidanceKind {
    Redirect,
    Modal,
    Toast,
}

/// Follow-up action offered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guidance {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default = "default_guidance_kind")]
    pub kind: GuidanceKind,
}

/// Static description of how one error code is categorized, messaged and retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub category: ErrorCategory,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    pub user_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<Guidance>,
    #[serde(default)]
    pub retryable: bool,
    /// Failure ends the session; credentials are cleared.
    #[serde(default)]
    pub clears_session: bool,
}

impl TaxonomyEntry {
    pub fn new(category: ErrorCategory, severity: Severity, user_message: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            user_message: user_message.into(),
            guidance: None,
            retryable: false,
            clears_session: false,
        }
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    pub fn clears_session(mut self) -> Self {
        self.clears_session = true;
        self
    }

    pub fn with_guidance(
        mut self,
        action: impl Into<String>,
        route: Option<&str>,
        kind: GuidanceKind,
    ) -> Self {
        self.guidance = Some(Guidance {
            action: action.into(),
            route: route.map(str::to_string),
            kind,
        });
        self
    }

    fn fallback() -> Self {
        Self::new(ErrorCategory::Business, Severity::Medium, DEFAULT_USER_MESSAGE)
    }
}

/// On-disk override format.
///
/// ```toml
/// [codes]
/// 4208 = "LICENSE_SUSPENDED"
///
/// [entries.LICENSE_SUSPENDED]
/// category = "license"
/// severity = "high"
/// user_message = "The license is suspended"
/// ```
#[derive(Debug, Default, Deserialize)]
struct TaxonomyFile {
    #[serde(default)]
    codes: BTreeMap<String, String>,
    #[serde(default)]
    entries: BTreeMap<String, TaxonomyEntry>,
}

/// Lookup table from stable error code to [`TaxonomyEntry`].
///
/// Lookups never fail: unknown codes resolve to a default entry
/// (`business`, severity `medium`, not retryable).
///
/// # Example
/// ```
/// use tether::taxonomy::{ErrorTaxonomy, Severity};
///
/// let taxonomy = ErrorTaxonomy::builtin();
/// assert!(taxonomy.is_retryable("DATABASE_ERROR"));
/// assert_eq!(taxonomy.severity("SOMETHING_NEW"), Severity::Medium);
/// assert_eq!(taxonomy.error_code_for(4201), "LICENSE_EXPIRED");
/// ```
#[derive(Debug, Clone)]
pub struct ErrorTaxonomy {
    entries: HashMap<String, TaxonomyEntry>,
    codes: BTreeMap<i32, String>,
    fallback: TaxonomyEntry,
}

impl Default for ErrorTaxonomy {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ErrorTaxonomy {
    /// Empty table: every lookup yields the default entry.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            codes: BTreeMap::new(),
            fallback: TaxonomyEntry::fallback(),
        }
    }

    /// Table of the backend's documented error codes.
    pub fn builtin() -> Self {
        let mut taxonomy = Self::empty();
        for (numeric, error_code, entry) in builtin::entries() {
            if let Some(numeric) = numeric {
                taxonomy.codes.insert(numeric, error_code.to_string());
            }
            taxonomy.entries.insert(error_code.to_string(), entry);
        }
        taxonomy
    }

    /// Process-wide built-in table, built once.
    pub fn shared() -> Arc<ErrorTaxonomy> {
        SHARED_TAXONOMY
            .get_or_init(|| Arc::new(Self::builtin()))
            .clone()
    }

    /// Built-in table with overrides parsed from TOML applied on top.
    pub fn from_toml_str(raw: &str) -> Result<Self, TetherError> {
        let mut taxonomy = Self::builtin();
        taxonomy.merge_toml(raw)?;
        Ok(taxonomy)
    }

    /// Built-in table with overrides from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TetherError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Apply TOML overrides; entries with existing codes are replaced.
    pub fn merge_toml(&mut self, raw: &str) -> Result<(), TetherError> {
        let file: TaxonomyFile = toml::from_str(raw)
            .map_err(|e| TetherError::Configuration(format!("invalid taxonomy file: {e}")))?;
        for (numeric, error_code) in file.codes {
            let numeric = numeric.trim().parse::<i32>().map_err(|_| {
                TetherError::Configuration(format!("taxonomy code '{numeric}' is not an integer"))
            })?;
            self.codes.insert(numeric, error_code);
        }
        let overridden = file.entries.len();
        for (error_code, entry) in file.entries {
            self.entries.insert(error_code, entry);
        }
        tracing::debug!(overridden, total = self.entries.len(), "Merged taxonomy overrides");
        Ok(())
    }

    pub fn insert(&mut self, error_code: impl Into<String>, entry: TaxonomyEntry) {
        self.entries.insert(error_code.into(), entry);
    }

    pub fn insert_code(&mut self, code: i32, error_code: impl Into<String>) {
        self.codes.insert(code, error_code.into());
    }

    /// Entry for a code, if the table defines one.
    pub fn get(&self, error_code: &str) -> Option<&TaxonomyEntry> {
        self.entries.get(error_code)
    }

    /// Entry for a code, or the default entry.
    pub fn lookup(&self, error_code: &str) -> &TaxonomyEntry {
        self.get(error_code).unwrap_or(&self.fallback)
    }

    pub fn severity(&self, error_code: &str) -> Severity {
        self.lookup(error_code).severity
    }

    /// Display text: the table's message, else `fallback`, else a generic message.
    pub fn user_message(&self, error_code: &str, fallback: Option<&str>) -> String {
        if let Some(entry) = self.get(error_code) {
            return entry.user_message.clone();
        }
        match fallback.map(str::trim) {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => DEFAULT_USER_MESSAGE.to_string(),
        }
    }

    pub fn is_retryable(&self, error_code: &str) -> bool {
        self.lookup(error_code).retryable
    }

    /// Coded failures use the entry's flag; uncoded ones retry from 5000 up.
    pub fn is_response_retryable(&self, response: &ErrorResponse) -> bool {
        if response.has_error_code() {
            self.is_retryable(&response.error_code)
        } else {
            response.code >= 5000
        }
    }

    pub fn guidance(&self, error_code: &str) -> Option<&Guidance> {
        self.lookup(error_code).guidance.as_ref()
    }

    pub fn clears_session(&self, error_code: &str) -> bool {
        self.lookup(error_code).clears_session
    }

    /// Stable identifier for a numeric backend code, or [`UNKNOWN_ERROR`].
    pub fn error_code_for(&self, code: i32) -> &str {
        self.codes
            .get(&code)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_ERROR)
    }

    /// All defined codes, sorted.
    pub fn error_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn default_guidance_kind() -> GuidanceKind {
    GuidanceKind::Modal
}

fn default_severity() -> Severity {
    Severity::Medium
}
