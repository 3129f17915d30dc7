use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::CredentialError;

/// Key under which the access token is stored.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Key under which the refresh token is stored.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

const CREDENTIALS_FILE: &str = "credentials.toml";

/// Key/value storage for persisted credentials.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), CredentialError>;
}

/// Process-local store; credentials are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, CredentialError> {
        self.values
            .lock()
            .map_err(|_| CredentialError::Io("credential store lock poisoned".to_string()))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CredentialError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// File-backed store keeping all credentials in one TOML file.
///
/// # Example
/// ```no_run
/// use tether::auth::{CredentialStore, FileCredentialStore, ACCESS_TOKEN_KEY};
///
/// let store = FileCredentialStore::new_default();
/// store.set(ACCESS_TOKEN_KEY, "eyJ...")?;
/// # Ok::<(), tether::auth::CredentialError>(())
/// ```
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileCredentialStore {
    /// Store `credentials.toml` inside `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: base_dir.into().join(CREDENTIALS_FILE),
            guard: Mutex::new(()),
        }
    }

    /// Store under `~/.tether`.
    pub fn new_default() -> Self {
        Self::new(default_credentials_dir())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, String>, CredentialError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(err.into()),
        };
        let file: CredentialFile = toml::from_str(&raw)?;
        Ok(file.credentials)
    }

    fn write(&self, credentials: BTreeMap<String, String>) -> Result<(), CredentialError> {
        if credentials.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            };
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = CredentialFile {
            version: 1,
            credentials,
            saved_at: Utc::now(),
        };
        fs::write(&self.path, toml::to_string(&file)?)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn update(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>) -> bool,
    ) -> Result<(), CredentialError> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| CredentialError::Io("credential file lock poisoned".to_string()))?;
        let mut credentials = self.read()?;
        if apply(&mut credentials) {
            self.write(credentials)?;
        }
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.read()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.update(|credentials| {
            credentials.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), CredentialError> {
        self.update(|credentials| credentials.remove(key).is_some())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialFile {
    version: u32,
    #[serde(default)]
    credentials: BTreeMap<String, String>,
    saved_at: DateTime<Utc>,
}

/// `~/.tether`, or `.tether` when no home directory is known.
pub fn default_credentials_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".tether"))
        .unwrap_or_else(|| PathBuf::from(".tether"))
}
