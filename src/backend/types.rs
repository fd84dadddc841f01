//! Data shapes shared by every storage backend.
//!
//! Secrets are identified by `(workspace, name)`.  The `Secret` type
//! returned by list and metadata paths deliberately has no value field,
//! so a listing can never leak a credential by construction; values only
//! travel through the dedicated retrieve path.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validate::MAX_IDENTIFIER_LENGTH;

// ---------------------------------------------------------------------------
// Contract constants
// ---------------------------------------------------------------------------

/// Default ceiling on a secret value, in bytes (64 KiB).
pub const DEFAULT_MAX_SECRET_VALUE_LENGTH: usize = 65_536;

/// Default ceiling on a session lifetime, in seconds (24 hours).
pub const DEFAULT_MAX_SESSION_TTL_SECONDS: u64 = 86_400;

/// Default ceiling on the number of labels attached to one secret.
pub const DEFAULT_MAX_LABELS_PER_SECRET: usize = 64;

/// Default ceiling on the number of secrets held in one workspace.
pub const DEFAULT_MAX_SECRETS_PER_WORKSPACE: usize = 10_000;

// ---------------------------------------------------------------------------
// Secrets and metadata
// ---------------------------------------------------------------------------

/// Metadata describing one stored secret revision.
///
/// `version` starts at 1 on creation and increments by exactly 1 on every
/// successful store or rotate of an existing name.  `created_at` never
/// changes across updates; only re-creation after a delete resets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMetadata {
    /// When this secret was first created.
    pub created_at: DateTime<Utc>,

    /// When this secret was last stored or rotated.
    pub updated_at: DateTime<Utc>,

    /// Id of the backend holding the secret.
    pub backend: String,

    /// Monotonic revision counter, starting at 1.
    pub version: u64,

    /// Arbitrary key-value tags used for list filtering.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Lazy-expiry deadline.  A secret whose deadline has passed is
    /// removed by the first access that observes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Free-form rotation annotation (e.g. "manual", "30d").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_policy: Option<String>,
}

/// A secret as reported by list and metadata paths.  Carries no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub workspace: String,
    pub metadata: SecretMetadata,
}

// ---------------------------------------------------------------------------
// Operation inputs and outputs
// ---------------------------------------------------------------------------

/// Optional attributes supplied with a store call.
///
/// A store call fully describes the new revision: the supplied labels
/// replace the previous set, and the supplied `expires_at` and
/// `rotation_policy` replace the previous ones.  Only `created_at` and
/// the version counter carry over from an existing record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_policy: Option<String>,
}

/// Result of a store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOutcome {
    /// True iff the call created the secret rather than updating it.
    pub created: bool,
    /// Version of the revision just written.
    pub version: u64,
}

/// Result of a retrieve call: the plaintext value plus its version.
#[derive(Debug, Clone)]
pub struct RetrievedSecret {
    pub value: Vec<u8>,
    pub version: u64,
}

/// One page of a list traversal.
///
/// `cursor` is present iff more items remain; it encodes the index of
/// the next unread item in the name-sorted, filtered result set.
#[derive(Debug, Clone)]
pub struct SecretPage {
    pub secrets: Vec<Secret>,
    pub cursor: Option<String>,
}

// ---------------------------------------------------------------------------
// Backend identity and advertisement
// ---------------------------------------------------------------------------

/// The storage variants this crate ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendType {
    Memory,
    EncryptedFile,
}

/// Lifecycle status advertised in a backend descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Ready,
    Closed,
}

/// Static identity and capability advertisement for one backend.
/// Never contains secret data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDescriptor {
    #[serde(rename = "type")]
    pub backend_type: BackendType,
    pub id: String,
    pub status: BackendStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub info: BTreeMap<String, String>,
}

/// Feature flags a backend declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub versioning: bool,
    pub labels: bool,
    pub expiration: bool,
    pub rotation: bool,
    pub persistence: bool,
    pub encryption: bool,
}

/// Numeric ceilings a backend declares.
///
/// These are advisory contracts: the orchestrator enforces them before
/// delegating, so a well-behaved backend never sees an oversized request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub max_secret_name_length: usize,
    pub max_secret_value_length: usize,
    pub max_labels_per_secret: usize,
    pub max_secrets_per_workspace: usize,
    pub max_session_ttl_seconds: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_secret_name_length: MAX_IDENTIFIER_LENGTH,
            max_secret_value_length: DEFAULT_MAX_SECRET_VALUE_LENGTH,
            max_labels_per_secret: DEFAULT_MAX_LABELS_PER_SECRET,
            max_secrets_per_workspace: DEFAULT_MAX_SECRETS_PER_WORKSPACE,
            max_session_ttl_seconds: DEFAULT_MAX_SESSION_TTL_SECONDS,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let encoded = BASE64.encode(data);
    serializer.serialize_str(&encoded)
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
