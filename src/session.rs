//! Session minting, validation, and termination.
//!
//! The session table is owned exclusively by `SessionManager`; every
//! access goes through its methods.  Expired entries are evicted lazily,
//! on the access that observes the expiry; nothing sweeps the table in
//! the background, so an expired session occupies memory until its next
//! use.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::errors::{AgentVaultError, Result};
use crate::protocol::{DEFAULT_SESSION_TTL_SECONDS, SESSION_ID_PREFIX};
use crate::validate::validate_workspace_id;

/// Number of CSPRNG bytes in a session token (48 hex characters).
const SESSION_TOKEN_BYTES: usize = 24;

/// A time-bounded authorization context scoping operations to one
/// workspace and one backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub workspace: String,
    pub backend: String,
    pub agent_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

/// Owns the session table.  Single-writer discipline: callers that need
/// concurrent access must serialize through one owner.
pub struct SessionManager {
    sessions: HashMap<String, Session>,
    backend_id: String,
    max_ttl_seconds: u64,
}

impl SessionManager {
    pub fn new(backend_id: impl Into<String>, max_ttl_seconds: u64) -> Self {
        Self {
            sessions: HashMap::new(),
            backend_id: backend_id.into(),
            max_ttl_seconds,
        }
    }

    /// Mint a new session scoped to `workspace`.
    ///
    /// Fails with `InvalidWorkspace` when the workspace id is malformed.
    /// The requested TTL defaults to [`DEFAULT_SESSION_TTL_SECONDS`] and
    /// is clamped to the ceiling this manager was built with.
    pub fn authenticate(
        &mut self,
        workspace: &str,
        agent_id: &str,
        requested_ttl: Option<u64>,
    ) -> Result<Session> {
        if !validate_workspace_id(workspace) {
            return Err(AgentVaultError::InvalidWorkspace(workspace.to_string()));
        }

        let ttl_seconds = requested_ttl
            .unwrap_or(DEFAULT_SESSION_TTL_SECONDS)
            .min(self.max_ttl_seconds);
        let now = Utc::now();

        let session = Session {
            session_id: mint_session_id(),
            workspace: workspace.to_string(),
            backend: self.backend_id.clone(),
            agent_id: agent_id.to_string(),
            created_at: now,
            expires_at: now + Duration::seconds(ttl_seconds as i64),
            ttl_seconds,
        };

        tracing::info!(
            session_id = abbrev(&session.session_id),
            workspace = %workspace,
            agent_id = %agent_id,
            ttl_seconds,
            "session authenticated"
        );

        self.sessions.insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    /// Return the live session for `session_id`.
    ///
    /// Unknown ids fail with `SessionNotFound`.  A known id whose expiry
    /// has passed fails with `SessionExpired`, and the entry is evicted
    /// as a side effect.
    pub fn validate(&mut self, session_id: &str) -> Result<Session> {
        match self.sessions.entry(session_id.to_string()) {
            Entry::Vacant(_) => Err(AgentVaultError::SessionNotFound(session_id.to_string())),
            Entry::Occupied(entry) => {
                if Utc::now() > entry.get().expires_at {
                    entry.remove();
                    tracing::debug!(session_id = abbrev(session_id), "evicted expired session");
                    Err(AgentVaultError::SessionExpired(session_id.to_string()))
                } else {
                    Ok(entry.get().clone())
                }
            }
        }
    }

    /// Remove `session_id` unconditionally and return an already-expired
    /// echo of it for protocol symmetry.
    ///
    /// Idempotent: terminating an unknown id is not an error, the echo
    /// just carries empty identity fields.
    pub fn terminate(&mut self, session_id: &str) -> Session {
        let removed = self.sessions.remove(session_id);
        let now = Utc::now();

        tracing::info!(
            session_id = abbrev(session_id),
            known = removed.is_some(),
            "session terminated"
        );

        let (workspace, agent_id, created_at) = match removed {
            Some(session) => (session.workspace, session.agent_id, session.created_at),
            None => (String::new(), String::new(), now),
        };

        Session {
            session_id: session_id.to_string(),
            workspace,
            backend: self.backend_id.clone(),
            agent_id,
            created_at,
            expires_at: now,
            ttl_seconds: 0,
        }
    }

    /// Number of entries currently in the table, including any whose
    /// expiry has passed but has not yet been observed.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// First eight token characters, enough to correlate log lines without
/// reproducing a usable credential.
fn abbrev(session_id: &str) -> &str {
    session_id
        .get(..SESSION_ID_PREFIX.len() + 8)
        .unwrap_or(session_id)
}

/// Mint a cryptographically random session id: the fixed prefix plus
/// 48 hex characters.
fn mint_session_id() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);

    let mut id = String::with_capacity(SESSION_ID_PREFIX.len() + SESSION_TOKEN_BYTES * 2);
    id.push_str(SESSION_ID_PREFIX);
    for byte in bytes {
        id.push_str(&format!("{byte:02x}"));
    }
    id
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
