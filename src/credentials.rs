use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::CredentialsConfig;
use crate::error::{Result, SrtfixError};

/// Storage for the single analyzer secret
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    /// Stored secret, if any
    fn get(&self) -> Result<Option<String>>;

    /// Replace the stored secret
    fn save(&self, secret: &str) -> Result<()>;

    /// Forget the stored secret. Removing an absent secret is not an error.
    fn remove(&self) -> Result<()>;

    /// Whether a non-blank secret is available
    fn has(&self) -> bool {
        matches!(self.get(), Ok(Some(secret)) if !secret.trim().is_empty())
    }
}

fn validate_secret(secret: &str) -> Result<&str> {
    let secret = secret.trim();
    if secret.is_empty() {
        return Err(SrtfixError::Credential("API key must not be empty".to_string()));
    }
    Ok(secret)
}

/// In-process store, mostly for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    secret: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(secret: &str) -> Self {
        Self {
            secret: Mutex::new(Some(secret.to_string())),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.secret
            .lock()
            .map_err(|_| SrtfixError::Credential("credential lock poisoned".to_string()))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, secret: &str) -> Result<()> {
        let secret = validate_secret(secret)?;
        *self.lock()? = Some(secret.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCredential {
    api_key: String,
    saved_at: DateTime<Utc>,
}

/// Secret persisted as a small TOML file
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the secret was last saved
    pub fn saved_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.load()?.map(|stored| stored.saved_at))
    }

    fn load(&self) -> Result<Option<StoredCredential>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| SrtfixError::Credential(format!("Failed to read {}: {}", self.path.display(), e)))?;
        let stored = toml::from_str::<StoredCredential>(&content)?;
        Ok(Some(stored))
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(self.load()?.map(|stored| stored.api_key))
    }

    fn save(&self, secret: &str) -> Result<()> {
        let stored = StoredCredential {
            api_key: validate_secret(secret)?.to_string(),
            saved_at: Utc::now(),
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(&stored)
            .map_err(|e| SrtfixError::Credential(format!("Failed to serialize credential: {}", e)))?;
        std::fs::write(&self.path, content)
            .map_err(|e| SrtfixError::Credential(format!("Failed to write {}: {}", self.path.display(), e)))?;

        info!("API key saved to {}", self.path.display());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .map_err(|e| SrtfixError::Credential(format!("Failed to remove {}: {}", self.path.display(), e)))?;
            info!("API key removed from {}", self.path.display());
        }
        Ok(())
    }
}

/// Reads an environment variable first and falls back to an inner store.
/// Writes always go to the inner store.
#[derive(Debug, Clone)]
pub struct EnvCredentialStore<S> {
    var: String,
    inner: S,
}

impl<S: CredentialStore> EnvCredentialStore<S> {
    pub fn new(var: &str, inner: S) -> Self {
        Self {
            var: var.to_string(),
            inner,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn from_env(&self) -> Option<String> {
        std::env::var(&self.var).ok().filter(|value| !value.trim().is_empty())
    }
}

impl<S: CredentialStore> CredentialStore for EnvCredentialStore<S> {
    fn get(&self) -> Result<Option<String>> {
        if let Some(value) = self.from_env() {
            debug!("Using API key from ${}", self.var);
            return Ok(Some(value));
        }
        self.inner.get()
    }

    fn save(&self, secret: &str) -> Result<()> {
        self.inner.save(secret)
    }

    fn remove(&self) -> Result<()> {
        self.inner.remove()
    }
}

/// Build the store described by the configuration
pub fn store_from_config(config: &CredentialsConfig) -> Box<dyn CredentialStore> {
    let file = FileCredentialStore::new(&config.path);
    match &config.env_var {
        Some(var) if !var.trim().is_empty() => Box::new(EnvCredentialStore::new(var, file)),
        _ => Box::new(file),
    }
}
