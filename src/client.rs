//! The orchestrator: one backend, one session manager, seven operations.
//!
//! `VaultClient` owns a single backend contract implementation and the
//! session table.  Every storage operation validates its session first
//! and uses the session's workspace as the storage scope; callers never
//! name a workspace directly, so one session cannot reach into another
//! workspace's secrets.
//!
//! Validation runs here, before any backend call: malformed names and
//! oversized values are rejected by the orchestrator and never reach the
//! storage layer.

use chrono::Utc;

use crate::backend::types::BackendType;
use crate::backend::{EncryptedFileStore, MemoryStore, SecretBackend, StoreOptions};
use crate::config::Settings;
use crate::errors::{AgentVaultError, Result};
use crate::protocol::{
    AuthenticateOptions, DeleteResponse, DiscoverResponse, ListOptions, ListResponse,
    RetrieveResponse, RotateResponse, StoreResponse, AUTH_METHOD_TERMINATE, AUTH_METHOD_WORKSPACE,
    CONFORMANCE_LEVEL, DEFAULT_LIST_LIMIT, PROTOCOL_VERSION, SUPPORTED_AUTH_METHODS,
    VALUE_ENCODING,
};
use crate::session::{Session, SessionManager};
use crate::validate::validate_secret_name;

/// The vault engine's front door.
pub struct VaultClient {
    backend: Box<dyn SecretBackend>,
    sessions: SessionManager,
    backend_id: String,
}

impl VaultClient {
    /// Build a client around an already-constructed backend.
    ///
    /// The session TTL ceiling comes from the backend's advertised
    /// limits.
    pub fn new(backend: Box<dyn SecretBackend>) -> Self {
        let descriptor = backend.descriptor();
        let limits = backend.limits();
        Self {
            sessions: SessionManager::new(descriptor.id.clone(), limits.max_session_ttl_seconds),
            backend_id: descriptor.id,
            backend,
        }
    }

    /// Build the backend configured in `settings`.
    ///
    /// The encrypted-file variant derives its key from `password`;
    /// the memory variant ignores it.
    pub fn from_settings(settings: &Settings, password: Option<&[u8]>) -> Result<Self> {
        let backend: Box<dyn SecretBackend> = match settings.backend {
            BackendType::Memory => Box::new(MemoryStore::new()),
            BackendType::EncryptedFile => {
                let Some(password) = password else {
                    return Err(AgentVaultError::EncryptionError(
                        "the encrypted-file backend requires a password".into(),
                    ));
                };
                Box::new(EncryptedFileStore::open_with_params(
                    &settings.vault_path(),
                    password,
                    &settings.argon2_params(),
                )?)
            }
        };

        tracing::info!(backend = ?settings.backend, "constructed vault client");
        Ok(Self::new(backend))
    }

    // ------------------------------------------------------------------
    // Protocol operations
    // ------------------------------------------------------------------

    /// Describe the engine: protocol version, conformance level, the
    /// active backend's advertisement, and the supported auth methods.
    /// Requires no session.
    pub fn discover(&self) -> DiscoverResponse {
        let descriptor = self.backend.descriptor();
        DiscoverResponse {
            version: PROTOCOL_VERSION.to_string(),
            conformance: CONFORMANCE_LEVEL.to_string(),
            active_backend: descriptor.id.clone(),
            backends: vec![descriptor],
            capabilities: self.backend.capabilities(),
            auth_methods: SUPPORTED_AUTH_METHODS
                .iter()
                .map(|method| method.to_string())
                .collect(),
            limits: self.backend.limits(),
        }
    }

    /// Mint a session, or terminate one when the terminate method is
    /// requested.
    ///
    /// Termination is itself an auth event, not a session-scoped
    /// operation: the target session id arrives in the auth payload, and
    /// its absence fails with `AuthenticationFailed`.
    pub fn authenticate(&mut self, options: &AuthenticateOptions) -> Result<Session> {
        let method = options.method.as_deref().unwrap_or(AUTH_METHOD_WORKSPACE);
        match method {
            AUTH_METHOD_WORKSPACE => {
                let workspace = options.workspace.as_deref().ok_or_else(|| {
                    AgentVaultError::AuthenticationFailed("workspace is required".into())
                })?;
                let agent_id = options.agent_id.as_deref().ok_or_else(|| {
                    AgentVaultError::AuthenticationFailed("agent_id is required".into())
                })?;
                self.sessions.authenticate(workspace, agent_id, options.ttl_seconds)
            }
            AUTH_METHOD_TERMINATE => {
                let session_id = options.session_id.as_deref().ok_or_else(|| {
                    AgentVaultError::AuthenticationFailed(
                        "terminate requires a session_id".into(),
                    )
                })?;
                Ok(self.sessions.terminate(session_id))
            }
            other => Err(AgentVaultError::AuthenticationFailed(format!(
                "unsupported auth method '{other}'"
            ))),
        }
    }

    /// Store `value` under `name` in the session's workspace.
    pub fn store(
        &mut self,
        session_id: &str,
        name: &str,
        value: &[u8],
        options: &StoreOptions,
    ) -> Result<StoreResponse> {
        let session = self.sessions.validate(session_id)?;

        if !validate_secret_name(name) {
            return Err(AgentVaultError::InvalidName(name.to_string()));
        }
        let limit = self.backend.limits().max_secret_value_length;
        if value.len() > limit {
            return Err(AgentVaultError::ValueTooLarge {
                size: value.len(),
                limit,
            });
        }

        let outcome = self.backend.store(&session.workspace, name, value, options)?;
        tracing::info!(
            workspace = %session.workspace,
            name = %name,
            version = outcome.version,
            created = outcome.created,
            "stored secret"
        );
        Ok(StoreResponse {
            name: name.to_string(),
            backend: self.backend_id.clone(),
            created: outcome.created,
            version: outcome.version,
        })
    }

    /// Fetch the value of `name` from the session's workspace.
    pub fn retrieve(
        &mut self,
        session_id: &str,
        name: &str,
        version: Option<u64>,
    ) -> Result<RetrieveResponse> {
        let session = self.sessions.validate(session_id)?;
        let retrieved = self.backend.retrieve(&session.workspace, name, version)?;
        Ok(RetrieveResponse {
            name: name.to_string(),
            value: retrieved.value,
            encoding: VALUE_ENCODING.to_string(),
            backend: self.backend_id.clone(),
            version: retrieved.version,
        })
    }

    /// Remove `name` from the session's workspace.
    pub fn delete(&mut self, session_id: &str, name: &str) -> Result<DeleteResponse> {
        let session = self.sessions.validate(session_id)?;
        let deleted = self.backend.delete(&session.workspace, name)?;
        tracing::info!(workspace = %session.workspace, name = %name, deleted, "deleted secret");
        Ok(DeleteResponse {
            name: name.to_string(),
            deleted,
        })
    }

    /// List secrets in the session's workspace, with `limit` defaulting
    /// to [`DEFAULT_LIST_LIMIT`].
    pub fn list_secrets(
        &mut self,
        session_id: &str,
        options: &ListOptions,
    ) -> Result<ListResponse> {
        let session = self.sessions.validate(session_id)?;
        let limit = options.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let page = self.backend.list_secrets(
            &session.workspace,
            options.filter_labels.as_ref(),
            options.cursor.as_deref(),
            limit,
        )?;
        Ok(ListResponse {
            has_more: page.cursor.is_some(),
            secrets: page.secrets,
            cursor: page.cursor,
        })
    }

    /// Replace the value of an existing secret in the session's
    /// workspace, stamping the rotation time.
    pub fn rotate(
        &mut self,
        session_id: &str,
        name: &str,
        new_value: &[u8],
    ) -> Result<RotateResponse> {
        let session = self.sessions.validate(session_id)?;
        let version = self.backend.rotate(&session.workspace, name, new_value)?;
        tracing::info!(workspace = %session.workspace, name = %name, version, "rotated secret");
        Ok(RotateResponse {
            name: name.to_string(),
            backend: self.backend_id.clone(),
            version,
            rotated_at: Utc::now(),
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Close the underlying backend.  Storage operations afterwards fail
    /// with `BackendUnavailable`; close itself is idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.backend.close()
    }

    /// Number of entries in the session table.
    pub fn session_count(&self) -> usize {
        self.sessions.session_count()
    }
}
