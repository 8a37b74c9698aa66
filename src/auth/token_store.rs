use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use hkdf::Hkdf;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::ClientError;

/// Set of OAuth scopes; ordered so that equal sets produce equal cache keys
pub type ScopeSet = BTreeSet<String>;

/// Build a [`ScopeSet`] from anything yielding scope strings
pub fn scope_set<I, S>(scopes: I) -> ScopeSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    scopes.into_iter().map(Into::into).collect()
}

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const HKDF_INFO: &[u8] = b"google-api-samples/token-cache/v1";

/// Serialize SecretString for storage
fn serialize_secret<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}

/// Deserialize SecretString from storage
fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(SecretString::new(s))
}

/// OAuth credential obtained from the token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Short-lived access token
    #[serde(serialize_with = "serialize_secret", deserialize_with = "deserialize_secret")]
    pub access_token: SecretString,
    /// Long-lived refresh token, valid until revoked or replaced
    #[serde(serialize_with = "serialize_secret", deserialize_with = "deserialize_secret")]
    pub refresh_token: SecretString,
    /// Scopes this credential was granted for
    pub scopes: ScopeSet,
    /// Access token expiration time (UTC), if the server reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Check if the access token is expired. Unknown expiry counts as valid.
    pub fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |at| Utc::now() >= at)
    }

    /// Check if the access token will expire soon (within 5 minutes)
    pub fn needs_refresh(&self) -> bool {
        let buffer = chrono::Duration::minutes(5);
        self.expires_at.map_or(false, |at| Utc::now() + buffer >= at)
    }
}

/// Identifies one cached credential: application namespace plus exact scope set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    namespace: String,
    scopes: ScopeSet,
}

impl CacheKey {
    pub fn new(namespace: &str, scopes: &ScopeSet) -> Result<Self, ClientError> {
        if namespace.is_empty()
            || namespace.contains('/')
            || namespace.contains('\\')
            || namespace.contains("..")
        {
            return Err(ClientError::PersistError(format!(
                "Invalid token cache namespace: {:?}",
                namespace
            )));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            scopes: scopes.clone(),
        })
    }

    /// Length-prefixed scope list, so `{"a b"}` and `{"a", "b"}` never encode alike
    fn encoded_scopes(&self) -> String {
        self.scopes
            .iter()
            .map(|scope| format!("{}:{};", scope.len(), scope))
            .collect()
    }

    /// File name derived from the scope set; the namespace is the directory
    fn file_name(&self) -> String {
        let digest = Sha256::digest(self.encoded_scopes().as_bytes());
        format!("{}.token", general_purpose::URL_SAFE_NO_PAD.encode(digest))
    }

    /// Associated data binding a ciphertext to its key
    fn aad(&self) -> String {
        format!("{}\n{}", self.namespace, self.encoded_scopes())
    }
}

fn derive_key(application_key: &str, salt: &[u8]) -> Result<[u8; 32]> {
    let mut key = [0u8; 32];
    Hkdf::<Sha256>::new(Some(salt), application_key.as_bytes())
        .expand(HKDF_INFO, &mut key)
        .map_err(|e| anyhow!("Key derivation failed: {}", e))?;
    Ok(key)
}

/// Encrypt a credential as `base64(salt || nonce || ciphertext)`
pub(crate) fn encrypt_credential(
    application_key: &str,
    aad: &str,
    credential: &Credential,
) -> Result<String> {
    let plaintext = serde_json::to_vec(credential).context("Failed to serialize credential")?;

    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    let mut rng = rand::thread_rng();
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce);

    let key = derive_key(application_key, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| anyhow!("Invalid cipher key length"))?;
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &plaintext,
                aad: aad.as_bytes(),
            },
        )
        .map_err(|_| anyhow!("Credential encryption failed"))?;

    let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(general_purpose::STANDARD.encode(blob))
}

/// Reverse of [`encrypt_credential`]; fails on a wrong key, wrong aad or tampered data
pub(crate) fn decrypt_credential(application_key: &str, aad: &str, encoded: &str) -> Result<Credential> {
    let blob = general_purpose::STANDARD
        .decode(encoded.trim())
        .context("Token blob is not valid base64")?;
    if blob.len() <= SALT_LEN + NONCE_LEN {
        bail!("Token blob is truncated");
    }
    let (salt, rest) = blob.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(application_key, salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| anyhow!("Invalid cipher key length"))?;
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: aad.as_bytes(),
            },
        )
        .map_err(|_| anyhow!("Decryption failed (wrong key or tampered data)"))?;

    serde_json::from_slice(&plaintext).context("Failed to parse decrypted credential")
}

/// Encrypted on-disk credential cache.
///
/// Each entry lives at `<dir>/<namespace>/<sha256(scopes)>.token`. Entries are sealed
/// with AES-256-GCM under a key derived from a fixed application key. That key ships
/// inside the binary, so this only obfuscates a revocable refresh token; it is not
/// protection against anyone who can read both the binary and the cache.
#[derive(Debug, Clone)]
pub struct TokenStore {
    /// Root directory for cached tokens
    dir: PathBuf,
    /// Application-embedded encryption key
    application_key: SecretString,
}

impl TokenStore {
    /// Create a token store rooted at `dir`. Nothing is touched on disk until `put`.
    pub fn new(dir: PathBuf, application_key: &str) -> Self {
        Self {
            dir,
            application_key: SecretString::new(application_key.to_string()),
        }
    }

    /// Get default token store directory
    /// ~/.google-api-samples/tokens
    pub fn default_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".google-api-samples").join("tokens"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(&key.namespace).join(key.file_name())
    }

    /// Look up a cached credential. Any failure to read or open the entry is a miss.
    pub fn get(&self, namespace: &str, scopes: &ScopeSet) -> Option<Credential> {
        let key = match CacheKey::new(namespace, scopes) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!("Token cache lookup skipped: {}", e);
                return None;
            }
        };
        let path = self.entry_path(&key);

        let encoded = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No cached credential for '{}'", namespace);
                return None;
            }
            Err(e) => {
                tracing::debug!("Failed to read token file {:?}: {}", path, e);
                return None;
            }
        };

        match decrypt_credential(self.application_key.expose_secret(), &key.aad(), &encoded) {
            Ok(credential) => {
                tracing::debug!("Loaded cached credential for '{}'", namespace);
                Some(credential)
            }
            Err(e) => {
                tracing::debug!("Ignoring unreadable token file {:?}: {:#}", path, e);
                None
            }
        }
    }

    /// Encrypt and save a credential, replacing any previous entry for the same key
    pub fn put(&self, namespace: &str, scopes: &ScopeSet, credential: &Credential) -> Result<(), ClientError> {
        let key = CacheKey::new(namespace, scopes)?;
        self.persist(&key, credential)
            .map_err(|e| ClientError::PersistError(format!("{:#}", e)))
    }

    /// Remove a cached credential. Removing a missing entry succeeds.
    pub fn remove(&self, namespace: &str, scopes: &ScopeSet) -> Result<(), ClientError> {
        let key = CacheKey::new(namespace, scopes)?;
        let path = self.entry_path(&key);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Removed cached credential {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::PersistError(format!(
                "Failed to remove token file {:?}: {}",
                path, e
            ))),
        }
    }

    /// Write one encrypted entry to disk
    fn persist(&self, key: &CacheKey, credential: &Credential) -> Result<()> {
        let encoded = encrypt_credential(self.application_key.expose_secret(), &key.aad(), credential)?;
        let path = self.entry_path(key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create token directory")?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            // New files are owner read/write only from the start
            options.mode(0o600);
        }
        let mut file = options.open(&path).context("Failed to open token file")?;

        // An entry left by an older build may have looser permissions
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .context("Failed to restrict token file permissions")?;
        }

        file.write_all(encoded.as_bytes()).context("Failed to write token file")?;

        Ok(())
    }
}
