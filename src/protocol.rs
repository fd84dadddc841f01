//! Protocol constants and wire shapes for the vault operations.
//!
//! These are the serializable request options and response bodies the
//! orchestrator speaks.  Adapters that expose the engine over a real
//! transport serialize these types as-is; the engine itself never
//! performs any I/O here.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::types::{
    base64_decode, base64_encode, BackendDescriptor, Capabilities, Limits, Secret,
};

// ---------------------------------------------------------------------------
// Contract constants
// ---------------------------------------------------------------------------

/// Protocol version reported by discover.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Conformance level reported by discover.
pub const CONFORMANCE_LEVEL: &str = "core";

/// Session lifetime granted when the caller does not request one (1 hour).
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 3_600;

/// Page size used when a list call does not supply a limit.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Prefix of every session id.
pub const SESSION_ID_PREFIX: &str = "avp_sess_";

/// Encoding tag attached to every retrieve response.
pub const VALUE_ENCODING: &str = "utf8";

/// Auth method that mints a workspace-scoped session.
pub const AUTH_METHOD_WORKSPACE: &str = "workspace";

/// Auth method that terminates an existing session instead of minting one.
pub const AUTH_METHOD_TERMINATE: &str = "terminate";

/// Methods advertised by discover, in preference order.
pub const SUPPORTED_AUTH_METHODS: &[&str] = &[AUTH_METHOD_WORKSPACE, AUTH_METHOD_TERMINATE];

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

/// Options for the authenticate operation.
///
/// `method` defaults to [`AUTH_METHOD_WORKSPACE`].  The terminate method
/// ignores the identity fields and requires `session_id` instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Requested lifetime; clamped to the backend's advertised ceiling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    /// Target session for the terminate method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Options for the list operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Response of the discover operation.  Requires no session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverResponse {
    pub version: String,
    pub conformance: String,
    pub backends: Vec<BackendDescriptor>,
    pub active_backend: String,
    pub capabilities: Capabilities,
    pub auth_methods: Vec<String>,
    pub limits: Limits,
}

/// Response of the store operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResponse {
    pub name: String,
    pub backend: String,
    pub created: bool,
    pub version: u64,
}

/// Response of the retrieve operation.  The only response that carries
/// a secret value; it serializes as base64 in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub name: String,
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub value: Vec<u8>,
    pub encoding: String,
    pub backend: String,
    pub version: u64,
}

/// Response of the delete operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub name: String,
    pub deleted: bool,
}

/// Response of the list operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub secrets: Vec<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub has_more: bool,
}

/// Response of the rotate operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotateResponse {
    pub name: String,
    pub backend: String,
    pub version: u64,
    pub rotated_at: DateTime<Utc>,
}
