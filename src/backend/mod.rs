//! Storage backends for secrets.
//!
//! This module provides:
//! - Shared data shapes for all backends (`types`)
//! - The `SecretBackend` contract every storage variant implements
//! - The in-process reference backend (`memory`)
//! - The encrypted-at-rest file backend (`file`)

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::errors::{AgentVaultError, Result};

pub mod file;
pub mod memory;
pub mod types;

pub use file::EncryptedFileStore;
pub use memory::MemoryStore;
pub use types::{
    BackendDescriptor, BackendStatus, BackendType, Capabilities, Limits, RetrievedSecret, Secret,
    SecretMetadata, SecretPage, StoreOptions, StoreOutcome,
};

/// The contract every storage variant implements.
///
/// Backends take `&self` and guard their mutable state internally, so a
/// `Box<dyn SecretBackend>` can be driven through a shared reference.
/// Validation of names, workspaces, and value sizes happens in the
/// orchestrator before any of these methods run; backends trust their
/// inputs and only report storage-level failures.
pub trait SecretBackend: Send + Sync {
    /// Create or update the secret `(workspace, name)`.
    ///
    /// Creates version 1 if the name is absent, otherwise increments the
    /// existing version by 1 and preserves the original `created_at`.
    fn store(
        &self,
        workspace: &str,
        name: &str,
        value: &[u8],
        options: &StoreOptions,
    ) -> Result<StoreOutcome>;

    /// Fetch the plaintext value of `(workspace, name)`.
    ///
    /// Fails with `SecretNotFound` if the secret is absent, expired, or
    /// if an explicit `version` does not match the current one (only a
    /// single version is retained).
    fn retrieve(&self, workspace: &str, name: &str, version: Option<u64>) -> Result<RetrievedSecret>;

    /// Remove `(workspace, name)`, returning true iff something existed.
    ///
    /// Makes a best-effort attempt to scrub the in-memory value before
    /// dropping it.
    fn delete(&self, workspace: &str, name: &str) -> Result<bool>;

    /// List secrets in `workspace`, without values.
    ///
    /// Expired entries are excluded (and evicted), label filters apply as
    /// exact-match conjunction over every supplied key, and results are
    /// sorted by name ascending before paginating.
    fn list_secrets(
        &self,
        workspace: &str,
        filter_labels: Option<&BTreeMap<String, String>>,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<SecretPage>;

    /// Fetch the metadata of `(workspace, name)`.
    ///
    /// Same expiry and not-found semantics as `retrieve`.
    fn get_metadata(&self, workspace: &str, name: &str) -> Result<SecretMetadata>;

    /// Replace the value of an existing secret, returning the new version.
    ///
    /// The default implementation never creates a secret that did not
    /// already exist; see [`default_rotate`].
    fn rotate(&self, workspace: &str, name: &str, new_value: &[u8]) -> Result<u64> {
        default_rotate(self, workspace, name, new_value)
    }

    /// Feature flags this backend declares.
    fn capabilities(&self) -> Capabilities;

    /// Numeric ceilings this backend declares.
    fn limits(&self) -> Limits;

    /// Static identity and status advertisement.
    fn descriptor(&self) -> BackendDescriptor;

    /// Release resources.  Idempotent, and safe without a prior open.
    fn close(&self) -> Result<()>;
}

/// Default rotate algorithm shared by the shipped backends.
///
/// Verifies existence via `get_metadata` (propagating `SecretNotFound`
/// when the secret is absent, so rotate never silently creates one),
/// then stores the new value while re-supplying the labels, expiry, and
/// rotation policy it just fetched.  Rotation replaces the value and
/// preserves the secret's attributes.
pub fn default_rotate<B: SecretBackend + ?Sized>(
    backend: &B,
    workspace: &str,
    name: &str,
    new_value: &[u8],
) -> Result<u64> {
    let metadata = backend.get_metadata(workspace, name)?;
    let options = StoreOptions {
        labels: metadata.labels,
        expires_at: metadata.expires_at,
        rotation_policy: metadata.rotation_policy,
    };
    let outcome = backend.store(workspace, name, new_value, &options)?;
    Ok(outcome.version)
}

// ---------------------------------------------------------------------------
// Helpers shared by the shipped backends
// ---------------------------------------------------------------------------

/// True iff the metadata carries an expiry deadline that has passed.
pub(crate) fn is_expired(metadata: &SecretMetadata, now: DateTime<Utc>) -> bool {
    metadata.expires_at.is_some_and(|deadline| deadline <= now)
}

/// Exact-match conjunction over every supplied filter key.
/// An absent filter matches everything.
pub(crate) fn labels_match(
    filter: Option<&BTreeMap<String, String>>,
    labels: &BTreeMap<String, String>,
) -> bool {
    match filter {
        None => true,
        Some(wanted) => wanted
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value)),
    }
}

/// Sort by name and slice out one page of the result set.
///
/// The cursor is the decimal index of the next unread item; `None` means
/// start from the beginning.  A cursor that does not parse is rejected
/// with `BackendError` rather than silently restarting the traversal.
pub(crate) fn paginate(
    mut secrets: Vec<Secret>,
    cursor: Option<&str>,
    limit: usize,
) -> Result<SecretPage> {
    secrets.sort_by(|a, b| a.name.cmp(&b.name));

    let start = match cursor {
        None => 0,
        Some(raw) => raw.parse::<usize>().map_err(|_| {
            AgentVaultError::BackendError(format!("invalid list cursor '{raw}'"))
        })?,
    };

    let total = secrets.len();
    let page: Vec<Secret> = secrets.into_iter().skip(start).take(limit).collect();

    let next = start + page.len();
    let cursor = if next < total {
        Some(next.to_string())
    } else {
        None
    };

    Ok(SecretPage {
        secrets: page,
        cursor,
    })
}
