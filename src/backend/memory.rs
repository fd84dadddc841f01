//! In-process reference backend.
//!
//! `MemoryStore` implements the full backend contract on top of a nested
//! `workspace -> name -> entry` map.  No persistence, no encryption.  Its
//! observable behavior defines the contract every other backend has to
//! reproduce, so keep it boring.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use zeroize::Zeroize;

use crate::errors::{AgentVaultError, Result};

use super::types::{
    BackendDescriptor, BackendStatus, BackendType, Capabilities, Limits, RetrievedSecret, Secret,
    SecretMetadata, SecretPage, StoreOptions, StoreOutcome,
};
use super::{is_expired, labels_match, paginate, SecretBackend};

const BACKEND_ID: &str = "memory";

/// One stored secret: plaintext value plus its metadata.
struct SecretEntry {
    value: Vec<u8>,
    metadata: SecretMetadata,
}

struct MemoryState {
    workspaces: BTreeMap<String, BTreeMap<String, SecretEntry>>,
    status: BackendStatus,
}

impl MemoryState {
    fn ensure_open(&self) -> Result<()> {
        if self.status == BackendStatus::Closed {
            return Err(AgentVaultError::BackendUnavailable(BACKEND_ID.to_string()));
        }
        Ok(())
    }
}

/// Volatile storage backend holding all secrets in process memory.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                workspaces: BTreeMap::new(),
                status: BackendStatus::Ready,
            }),
        }
    }

    /// Lock the interior state, recovering the guard if a previous
    /// holder panicked.
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretBackend for MemoryStore {
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
        let entries = state.workspaces.entry(workspace.to_string()).or_default();

        let outcome = match entries.get_mut(name) {
            Some(entry) => {
                // Update: bump the version, keep the original created_at,
                // replace every supplied attribute.
                let created_at = entry.metadata.created_at;
                let version = entry.metadata.version + 1;

                let mut replaced = std::mem::replace(&mut entry.value, value.to_vec());
                replaced.zeroize();

                entry.metadata = SecretMetadata {
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
                    SecretEntry {
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

        let Some(entries) = state.workspaces.get_mut(workspace) else {
            return Err(not_found());
        };
        let Some(entry) = entries.get(name) else {
            return Err(not_found());
        };

        if is_expired(&entry.metadata, now) {
            // Lazy expiration: the access that observes the deadline
            // scrubs and removes the entry.
            if let Some(mut dead) = entries.remove(name) {
                dead.value.zeroize();
            }
            tracing::debug!(workspace = %workspace, name = %name, "evicted expired secret");
            return Err(not_found());
        }

        if let Some(requested) = version {
            if requested != entry.metadata.version {
                return Err(not_found());
            }
        }

        Ok(RetrievedSecret {
            value: entry.value.clone(),
            version: entry.metadata.version,
        })
    }

    fn delete(&self, workspace: &str, name: &str) -> Result<bool> {
        let mut state = self.state();
        state.ensure_open()?;

        let Some(entries) = state.workspaces.get_mut(workspace) else {
            return Ok(false);
        };
        match entries.remove(name) {
            Some(mut entry) => {
                entry.value.zeroize();
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
        let Some(entries) = state.workspaces.get_mut(workspace) else {
            return Ok(SecretPage {
                secrets: Vec::new(),
                cursor: None,
            });
        };

        // Listing is an access too: evict anything past its deadline
        // before filtering.
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| is_expired(&entry.metadata, now))
            .map(|(name, _)| name.clone())
            .collect();
        for name in expired {
            if let Some(mut dead) = entries.remove(&name) {
                dead.value.zeroize();
                tracing::debug!(workspace = %workspace, name = %name, "evicted expired secret");
            }
        }

        let matching: Vec<Secret> = entries
            .iter()
            .filter(|(_, entry)| labels_match(filter_labels, &entry.metadata.labels))
            .map(|(name, entry)| Secret {
                name: name.clone(),
                workspace: workspace.to_string(),
                metadata: entry.metadata.clone(),
            })
            .collect();

        paginate(matching, cursor, limit)
    }

    fn get_metadata(&self, workspace: &str, name: &str) -> Result<SecretMetadata> {
        let mut state = self.state();
        state.ensure_open()?;

        let now = Utc::now();
        let not_found = || AgentVaultError::SecretNotFound(name.to_string());

        let Some(entries) = state.workspaces.get_mut(workspace) else {
            return Err(not_found());
        };
        let Some(entry) = entries.get(name) else {
            return Err(not_found());
        };

        if is_expired(&entry.metadata, now) {
            if let Some(mut dead) = entries.remove(name) {
                dead.value.zeroize();
            }
            tracing::debug!(workspace = %workspace, name = %name, "evicted expired secret");
            return Err(not_found());
        }

        Ok(entry.metadata.clone())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            versioning: true,
            labels: true,
            expiration: true,
            rotation: true,
            persistence: false,
            encryption: false,
        }
    }

    fn limits(&self) -> Limits {
        Limits::default()
    }

    fn descriptor(&self) -> BackendDescriptor {
        let state = self.state();
        let mut info = BTreeMap::new();
        info.insert("volatile".to_string(), "true".to_string());
        BackendDescriptor {
            backend_type: BackendType::Memory,
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

        for entries in state.workspaces.values_mut() {
            for entry in entries.values_mut() {
                entry.value.zeroize();
            }
        }
        state.workspaces.clear();
        state.status = BackendStatus::Closed;
        Ok(())
    }
}
