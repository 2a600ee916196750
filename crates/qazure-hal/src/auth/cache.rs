//! Persistent token cache.
//!
//! Tokens of user logins are kept per client id. The protected store keeps
//! the secrets in the OS keyring and writes a manifest to
//! `<dir>/iqsharp.bin`; deleting that file resets the cache. When the keyring
//! is unusable the cache falls back to `<dir>/iqsharp-unencrypted.bin`
//! (mode 0600) and logs a warning. Cache failures are never fatal to a login.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::oauth::{self, AuthorityEndpoints};
use super::{CachedToken, REFRESH_BUFFER_SECS, TokenProvider};
use crate::error::{HalError, HalResult};

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_VAR: &str = "AZURE_QUANTUM_TOKEN_CACHE";

/// Cache file written when the keyring is available.
pub const CACHE_FILE: &str = "iqsharp.bin";

/// Cache file written when the keyring is not available.
pub const UNENCRYPTED_CACHE_FILE: &str = "iqsharp-unencrypted.bin";

const KEYRING_SERVICE: &str = "qazure-token-cache";

/// A cached login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Authority the token was issued by.
    pub authority: String,
    /// Token and refresh token.
    pub token: CachedToken,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheContents {
    #[serde(default)]
    records: BTreeMap<String, CacheRecord>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    #[serde(default)]
    clients: Vec<String>,
}

#[derive(Debug, Clone)]
enum Store {
    Keyring { file: PathBuf },
    Unencrypted { file: PathBuf },
}

/// File- and keyring-backed token cache.
#[derive(Debug)]
pub struct TokenCache {
    dir: PathBuf,
    store: RwLock<Store>,
    write_lock: Mutex<()>,
}

impl TokenCache {
    /// Cache directory: `AZURE_QUANTUM_TOKEN_CACHE`, or
    /// `<local-data-dir>/.azure-quantum`.
    pub fn default_dir() -> PathBuf {
        cache_dir_from(std::env::var(CACHE_DIR_VAR).ok().as_deref())
    }

    /// Open a cache in `dir`, using the keyring when it works.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let store = match probe_keyring(&dir) {
            Ok(()) => Store::Keyring {
                file: dir.join(CACHE_FILE),
            },
            Err(e) => {
                warn!(error = %e, "OS keyring unavailable, token cache will not be encrypted");
                Store::Unencrypted {
                    file: dir.join(UNENCRYPTED_CACHE_FILE),
                }
            }
        };
        Self::with_store(dir, store)
    }

    /// Open an unencrypted cache in `dir`.
    pub fn unencrypted(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let file = dir.join(UNENCRYPTED_CACHE_FILE);
        Self::with_store(dir, Store::Unencrypted { file })
    }

    fn with_store(dir: PathBuf, store: Store) -> Self {
        Self {
            dir,
            store: RwLock::new(store),
            write_lock: Mutex::new(()),
        }
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether secrets are kept in the OS keyring.
    pub fn is_encrypted(&self) -> bool {
        matches!(self.store(), Store::Keyring { .. })
    }

    /// Path of the cache file in use.
    pub fn path(&self) -> PathBuf {
        match self.store() {
            Store::Keyring { file } | Store::Unencrypted { file } => file,
        }
    }

    /// Cached login for a client id.
    pub fn load(&self, client_id: &str) -> Option<CacheRecord> {
        match self.read_contents() {
            Ok(mut contents) => contents.records.remove(client_id),
            Err(e) => {
                debug!(error = %e, "token cache unreadable");
                None
            }
        }
    }

    /// Persist a login for a client id.
    ///
    /// A keyring write failure switches the cache to the unencrypted file.
    pub fn store_record(&self, client_id: &str, record: CacheRecord) -> HalResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut contents = self.read_contents().unwrap_or_default();
        contents.records.insert(client_id.to_string(), record);

        match self.write_contents(&contents) {
            Ok(()) => Ok(()),
            Err(e) if self.is_encrypted() => {
                warn!(error = %e, "Failed to write token cache to the OS keyring, falling back to an unencrypted cache");
                *self.store.write().unwrap_or_else(PoisonError::into_inner) = Store::Unencrypted {
                    file: self.dir.join(UNENCRYPTED_CACHE_FILE),
                };
                self.write_contents(&contents)
            }
            Err(e) => Err(e),
        }
    }

    /// Forget the login of a client id.
    pub fn remove(&self, client_id: &str) -> HalResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut contents = self.read_contents().unwrap_or_default();
        if contents.records.remove(client_id).is_some() {
            self.write_contents(&contents)?;
        }
        Ok(())
    }

    fn store(&self) -> Store {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn read_contents(&self) -> HalResult<CacheContents> {
        match self.store() {
            Store::Unencrypted { file } => {
                if !file.exists() {
                    return Ok(CacheContents::default());
                }
                let data = std::fs::read_to_string(&file)?;
                Ok(serde_json::from_str(&data)?)
            }
            Store::Keyring { file } => {
                if !file.exists() {
                    return Ok(CacheContents::default());
                }
                let secret = keyring_entry(&file)?
                    .get_password()
                    .map_err(|e| HalError::TokenCache(format!("Failed to read keyring: {e}")))?;
                Ok(serde_json::from_str(&secret)?)
            }
        }
    }

    fn write_contents(&self, contents: &CacheContents) -> HalResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            HalError::TokenCache(format!("Failed to create cache directory: {e}"))
        })?;

        match self.store() {
            Store::Unencrypted { file } => write_private(&file, &serde_json::to_string_pretty(contents)?),
            Store::Keyring { file } => {
                keyring_entry(&file)?
                    .set_password(&serde_json::to_string(contents)?)
                    .map_err(|e| HalError::TokenCache(format!("Failed to write keyring: {e}")))?;
                let manifest = Manifest {
                    clients: contents.records.keys().cloned().collect(),
                };
                write_private(&file, &serde_json::to_string_pretty(&manifest)?)
            }
        }
    }
}

fn cache_dir_from(override_dir: Option<&str>) -> PathBuf {
    match override_dir.map(str::trim).filter(|d| !d.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_default()
            .join(".azure-quantum"),
    }
}

fn keyring_entry(file: &Path) -> HalResult<keyring::Entry> {
    keyring::Entry::new(KEYRING_SERVICE, &file.to_string_lossy())
        .map_err(|e| HalError::TokenCache(format!("Failed to open keyring entry: {e}")))
}

/// Write a value and read it back through a fresh entry. Stores that do not
/// persist across entries (no platform keyring) fail here.
fn probe_keyring(dir: &Path) -> HalResult<()> {
    let probe = dir.join(".keyring-probe");
    let value = uuid::Uuid::new_v4().to_string();
    keyring_entry(&probe)?
        .set_password(&value)
        .map_err(|e| HalError::TokenCache(format!("Keyring write failed: {e}")))?;
    let read_back = keyring_entry(&probe)?
        .get_password()
        .map_err(|e| HalError::TokenCache(format!("Keyring read failed: {e}")))?;
    let _ = keyring_entry(&probe).map(|entry| entry.delete_credential());
    if read_back == value {
        Ok(())
    } else {
        Err(HalError::TokenCache("Keyring returned a different value".into()))
    }
}

fn write_private(path: &Path, data: &str) -> HalResult<()> {
    std::fs::write(path, data)
        .map_err(|e| HalError::TokenCache(format!("Failed to write token cache: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)
            .map_err(|e| HalError::TokenCache(format!("Failed to get file metadata: {e}")))?
            .permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(path, perms)
            .map_err(|e| HalError::TokenCache(format!("Failed to set permissions: {e}")))?;
    }

    Ok(())
}

/// Silent token reuse from memory and the persistent cache, refreshing when
/// a refresh token is available.
///
/// Interactive strategies wrap one of these and call [`CachedCredential::save`]
/// after a successful login.
pub struct CachedCredential {
    client: reqwest::Client,
    cache: Option<std::sync::Arc<TokenCache>>,
    endpoints: AuthorityEndpoints,
    client_id: String,
    scopes: Vec<String>,
    memory: RwLock<Option<CachedToken>>,
}

impl CachedCredential {
    /// Create a silent credential for a client id.
    pub fn new(
        client: reqwest::Client,
        cache: Option<std::sync::Arc<TokenCache>>,
        endpoints: AuthorityEndpoints,
        client_id: &str,
        scopes: &[String],
    ) -> Self {
        Self {
            client,
            cache,
            endpoints,
            client_id: client_id.to_string(),
            scopes: scopes.to_vec(),
            memory: RwLock::new(None),
        }
    }

    /// Authority endpoints logins are performed against.
    pub fn endpoints(&self) -> &AuthorityEndpoints {
        &self.endpoints
    }

    /// Client application id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Requested scopes.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// HTTP client shared with the login flows.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Remember a token in memory and in the persistent cache.
    pub fn save(&self, token: &CachedToken) {
        *self.memory.write().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        if let Some(ref cache) = self.cache {
            let record = CacheRecord {
                authority: self.endpoints.authority().to_string(),
                token: token.clone(),
            };
            if let Err(e) = cache.store_record(&self.client_id, record) {
                warn!(error = %e, "Failed to persist token cache");
            }
        }
    }

    fn current(&self) -> Option<CachedToken> {
        if let Some(token) = self
            .memory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Some(token);
        }
        let record = self.cache.as_ref()?.load(&self.client_id)?;
        if record.authority != self.endpoints.authority() {
            debug!(cached = %record.authority, "cached token belongs to another authority");
            return None;
        }
        Some(record.token)
    }
}

#[async_trait]
impl TokenProvider for CachedCredential {
    async fn get_token(&self) -> HalResult<String> {
        let token = self.current().ok_or_else(|| {
            HalError::CredentialUnavailable("No cached token for this account".into())
        })?;

        if !token.expires_soon(REFRESH_BUFFER_SECS) {
            return Ok(token.access_token);
        }

        let refresh_token = token.refresh_token.ok_or_else(|| {
            HalError::CredentialUnavailable("Cached token expired and cannot be refreshed".into())
        })?;

        match oauth::refresh(&self.client, &self.endpoints, &self.client_id, &self.scopes, &refresh_token)
            .await
        {
            Ok(token) => {
                debug!("refreshed cached token");
                self.save(&token);
                Ok(token.access_token)
            }
            Err(e) => {
                warn!("Token refresh failed: {}, need re-authentication", HalError::from(e));
                Err(HalError::CredentialUnavailable(
                    "Cached token could not be refreshed".into(),
                ))
            }
        }
    }

    fn has_valid_token(&self) -> bool {
        self.current().is_some_and(|t| !t.is_expired())
    }
}
