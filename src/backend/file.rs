//! Encrypted-at-rest file backend.
//!
//! The vault file is one opaque binary blob:
//!
//! ```text
//! [ 16-byte IV | 16-byte auth tag | AES-256-GCM ciphertext ]
//! ```
//!
//! The ciphertext decrypts to the UTF-8 JSON serialization of the whole
//! vault state.  Every mutation re-serializes and re-encrypts that state
//! with a fresh IV and rewrites the file via a temp file and an atomic
//! rename, trading write amplification for a format with no partial
//! states.  The key is derived from a caller-supplied password with
//! Argon2id (see `crypto::kdf` for the fixed-salt trade-off).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto::{self, derive_vault_key_with_params, Argon2Params, VaultKey};
use crate::errors::{AgentVaultError, Result};

use super::types::{
    base64_decode, base64_encode, BackendDescriptor, BackendStatus, BackendType, Capabilities,
    Limits, RetrievedSecret, Secret, SecretMetadata, SecretPage, StoreOptions, StoreOutcome,
};
use super::{is_expired, labels_match, paginate, SecretBackend};

const BACKEND_ID: &str = "encrypted-file";

/// Version tag inside the serialized vault state.
const STORAGE_FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Persisted shape
// ---------------------------------------------------------------------------

/// The authoritative persisted form of the vault: decrypted into memory
/// on open, fully re-encrypted and rewritten on every mutation.
#[derive(Debug, Serialize, Deserialize)]
struct StoredData {
    version: u32,
    workspaces: BTreeMap<String, BTreeMap<String, StoredSecretRecord>>,
}

impl StoredData {
    fn empty() -> Self {
        Self {
            version: STORAGE_FORMAT_VERSION,
            workspaces: BTreeMap::new(),
        }
    }
}

/// One persisted secret.  The value serializes as base64 in JSON.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSecretRecord {
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    value: Vec<u8>,
    metadata: SecretMetadata,
}

// ---------------------------------------------------------------------------
// The store
// ---------------------------------------------------------------------------

struct FileState {
    data: StoredData,
    /// Dropped (and zeroized) on close.
    key: Option<VaultKey>,
    status: BackendStatus,
}

impl FileState {
    fn ensure_open(&self) -> Result<()> {
        if self.status == BackendStatus::Closed {
            return Err(AgentVaultError::BackendUnavailable(BACKEND_ID.to_string()));
        }
        Ok(())
    }
}

/// Durable storage backend keeping all secrets in one encrypted file.
pub struct EncryptedFileStore {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl EncryptedFileStore {
    /// Open (or lazily initialize) the vault at `path` with default
    /// Argon2id parameters.
    pub fn open(path: &Path, password: &[u8]) -> Result<Self> {
        Self::open_with_params(path, password, &Argon2Params::default())
    }

    /// Open (or lazily initialize) the vault at `path`.
    ///
    /// A missing or zero-length file yields an empty vault without
    /// writing anything; nothing touches the disk until the first
    /// mutation.  A file that exists but cannot be read, decrypted, and
    /// parsed fails construction: there is no fallback to an empty vault
    /// over a corrupted one.
    pub fn open_with_params(
        path: &Path,
        password: &[u8],
        params: &Argon2Params,
    ) -> Result<Self> {
        let mut key_bytes = derive_vault_key_with_params(password, params)?;
        let key = VaultKey::new(key_bytes);
        key_bytes.zeroize();

        let data = Self::load(path, &key)?;
        let secret_count: usize = data.workspaces.values().map(|entries| entries.len()).sum();
        tracing::info!(
            path = %path.display(),
            secrets = secret_count,
            "opened encrypted vault"
        );

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(FileState {
                data,
                key: Some(key),
                status: BackendStatus::Ready,
            }),
        })
    }

    /// Path of the vault file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path, key: &VaultKey) -> Result<StoredData> {
        match fs::metadata(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StoredData::empty()),
            Err(e) => {
                return Err(AgentVaultError::BackendError(format!(
                    "failed to stat vault file {}: {e}",
                    path.display()
                )))
            }
            Ok(meta) if meta.len() == 0 => return Ok(StoredData::empty()),
            Ok(_) => {}
        }

        let blob = fs::read(path).map_err(|e| {
            AgentVaultError::BackendError(format!(
                "failed to read vault file {}: {e}",
                path.display()
            ))
        })?;

        let mut plaintext = crypto::open(key.as_bytes(), &blob)?;
        let parsed: serde_json::Result<StoredData> = serde_json::from_slice(&plaintext);
        plaintext.zeroize();

        let data = parsed.map_err(|e| {
            AgentVaultError::IntegrityError(format!("vault payload is not valid JSON: {e}"))
        })?;
        if data.version != STORAGE_FORMAT_VERSION {
            return Err(AgentVaultError::IntegrityError(format!(
                "unsupported vault format version {} (expected {STORAGE_FORMAT_VERSION})",
                data.version
            )));
        }
        Ok(data)
    }

    /// Lock the interior state, recovering the guard if a previous
    /// holder panicked.
    fn state(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Serialize, encrypt, and atomically rewrite the whole vault file.
    ///
    /// The temp file lives in the same directory as the target so the
    /// rename is atomic on the same filesystem; readers never observe a
    /// half-written vault.  Permissions are restricted after the swap.
    fn save(&self, state: &FileState) -> Result<()> {
        let Some(key) = state.key.as_ref() else {
            return Err(AgentVaultError::BackendUnavailable(BACKEND_ID.to_string()));
        };

        let mut plaintext = serde_json::to_vec(&state.data).map_err(|e| {
            AgentVaultError::BackendError(format!("failed to serialize vault state: {e}"))
        })?;
        let sealed = crypto::seal(key.as_bytes(), &plaintext);
        plaintext.zeroize();
        let blob = sealed?;

        let parent = self.path.parent().unwrap_or(Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy()
        ));

        fs::write(&tmp_path, &blob).map_err(|e| {
            AgentVaultError::BackendError(format!(
                "failed to write vault file {}: {e}",
                tmp_path.display()
            ))
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            AgentVaultError::BackendError(format!(
                "failed to replace vault file {}: {e}",
                self.path.display()
            ))
        })?;

        restrict_permissions(&self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            bytes = blob.len(),
            "saved encrypted vault"
        );
        Ok(())
    }
}

impl SecretBackend for EncryptedFileStore {
    fn store(
        &self,
        workspace: &str,
        name: &str,
        value: &[u8],
        options: &StoreOptions,
    ) -> Result<StoreOutcome> {
        let mut state = self.state();
        state.ensure_open()?;

        let now = Utc::now();
        let entries = state.data.workspaces.entry(workspace.to_string()).or_default();

        let outcome = match entries.get_mut(name) {
            Some(record) => {
                let created_at = record.metadata.created_at;
                let version = record.metadata.version + 1;

                let mut replaced = std::mem::replace(&mut record.value, value.to_vec());
                replaced.zeroize();

                record.metadata = SecretMetadata {
                    created_at,
                    updated_at: now,
                    backend: BACKEND_ID.to_string(),
                    version,
                    labels: options.labels.clone(),
                    expires_at: options.expires_at,
                    rotation_policy: options.rotation_policy.clone(),
                };
                StoreOutcome {
                    created: false,
                    version,
                }
            }
            None => {
                entries.insert(
                    name.to_string(),
                    StoredSecretRecord {
                        value: value.to_vec(),
                        metadata: SecretMetadata {
                            created_at: now,
                            updated_at: now,
                            backend: BACKEND_ID.to_string(),
                            version: 1,
                            labels: options.labels.clone(),
                            expires_at: options.expires_at,
                            rotation_policy: options.rotation_policy.clone(),
                        },
                    },
                );
                StoreOutcome {
                    created: true,
                    version: 1,
                }
            }
        };

        self.save(&state)?;
        Ok(outcome)
    }

    fn retrieve(
        &self,
        workspace: &str,
        name: &str,
        version: Option<u64>,
    ) -> Result<RetrievedSecret> {
        let mut state = self.state();
        state.ensure_open()?;

        let now = Utc::now();
        let not_found = || AgentVaultError::SecretNotFound(name.to_string());

        let Some(entries) = state.data.workspaces.get_mut(workspace) else {
            return Err(not_found());
        };
        let Some(record) = entries.get(name) else {
            return Err(not_found());
        };

        if is_expired(&record.metadata, now) {
            if let Some(mut dead) = entries.remove(name) {
                dead.value.zeroize();
            }
            tracing::debug!(workspace = %workspace, name = %name, "evicted expired secret");
            // The eviction is a mutation, so it must survive a restart.
            self.save(&state)?;
            return Err(not_found());
        }

        if let Some(requested) = version {
            if requested != record.metadata.version {
                return Err(not_found());
            }
        }

        Ok(RetrievedSecret {
            value: record.value.clone(),
            version: record.metadata.version,
        })
    }

    fn delete(&self, workspace: &str, name: &str) -> Result<bool> {
        let mut state = self.state();
        state.ensure_open()?;

        let Some(entries) = state.data.workspaces.get_mut(workspace) else {
            return Ok(false);
        };
        match entries.remove(name) {
            Some(mut record) => {
                record.value.zeroize();
                self.save(&state)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list_secrets(
        &self,
        workspace: &str,
        filter_labels: Option<&BTreeMap<String, String>>,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<SecretPage> {
        let mut state = self.state();
        state.ensure_open()?;

        let now = Utc::now();
        let Some(entries) = state.data.workspaces.get_mut(workspace) else {
            return Ok(SecretPage {
                secrets: Vec::new(),
                cursor: None,
            });
        };

        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, record)| is_expired(&record.metadata, now))
            .map(|(name, _)| name.clone())
            .collect();
        let mut evicted = false;
        for name in expired {
            if let Some(mut dead) = entries.remove(&name) {
                dead.value.zeroize();
                evicted = true;
                tracing::debug!(workspace = %workspace, name = %name, "evicted expired secret");
            }
        }

        let matching: Vec<Secret> = entries
            .iter()
            .filter(|(_, record)| labels_match(filter_labels, &record.metadata.labels))
            .map(|(name, record)| Secret {
                name: name.clone(),
                workspace: workspace.to_string(),
                metadata: record.metadata.clone(),
            })
            .collect();

        if evicted {
            self.save(&state)?;
        }

        paginate(matching, cursor, limit)
    }

    fn get_metadata(&self, workspace: &str, name: &str) -> Result<SecretMetadata> {
        let mut state = self.state();
        state.ensure_open()?;

        let now = Utc::now();
        let not_found = || AgentVaultError::SecretNotFound(name.to_string());

        let Some(entries) = state.data.workspaces.get_mut(workspace) else {
            return Err(not_found());
        };
        let Some(record) = entries.get(name) else {
            return Err(not_found());
        };

        if is_expired(&record.metadata, now) {
            if let Some(mut dead) = entries.remove(name) {
                dead.value.zeroize();
            }
            tracing::debug!(workspace = %workspace, name = %name, "evicted expired secret");
            self.save(&state)?;
            return Err(not_found());
        }

        Ok(record.metadata.clone())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            versioning: true,
            labels: true,
            expiration: true,
            rotation: true,
            persistence: true,
            encryption: true,
        }
    }

    fn limits(&self) -> Limits {
        Limits::default()
    }

    fn descriptor(&self) -> BackendDescriptor {
        let state = self.state();
        let mut info = BTreeMap::new();
        info.insert("path".to_string(), self.path.display().to_string());
        info.insert(
            "format_version".to_string(),
            STORAGE_FORMAT_VERSION.to_string(),
        );
        BackendDescriptor {
            backend_type: BackendType::EncryptedFile,
            id: BACKEND_ID.to_string(),
            status: state.status,
            info,
        }
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state();
        if state.status == BackendStatus::Closed {
            return Ok(());
        }

        // One final save before the key material goes away.
        self.save(&state)?;

        for entries in state.data.workspaces.values_mut() {
            for record in entries.values_mut() {
                record.value.zeroize();
            }
        }
        state.data.workspaces.clear();
        state.key = None;
        state.status = BackendStatus::Closed;

        tracing::info!(path = %self.path.display(), "closed encrypted vault");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// Restrict the vault file to owner read/write.
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
        AgentVaultError::BackendError(format!(
            "failed to restrict permissions on {}: {e}",
            path.display()
        ))
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
