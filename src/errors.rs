//! Error taxonomy shared by every backend and the protocol layer.
//!
//! Each variant has a stable machine-readable code (`codes`) used in the
//! serializable error envelope `{ok: false, error: {code, message, detail}}`.
//! The reverse mapping (`from_wire`) is table-driven so protocol adapters
//! can reconstruct typed errors from the wire, and new kinds stay additive.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors that can occur in the vault engine.
#[derive(Debug, Clone, Error)]
pub enum AgentVaultError {
    // --- Validation errors (raised before any backend call) ---
    #[error("Invalid workspace id '{0}'")]
    InvalidWorkspace(String),

    #[error("Invalid secret name '{0}'")]
    InvalidName(String),

    // --- Session errors ---
    #[error("Session '{0}' not found")]
    SessionNotFound(String),

    #[error("Session '{0}' has expired")]
    SessionExpired(String),

    #[error("Session '{0}' was terminated")]
    SessionTerminated(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    // --- Secret errors ---
    #[error("Secret '{0}' not found")]
    SecretNotFound(String),

    #[error("Secret value is {size} bytes (backend limit is {limit})")]
    ValueTooLarge { size: usize, limit: usize },

    // --- Quota errors (reserved for backends that enforce quotas) ---
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    // --- Storage errors ---
    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("Backend '{0}' is unavailable")]
    BackendUnavailable(String),

    // --- Crypto errors ---
    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Vault integrity check failed: {0}")]
    IntegrityError(String),
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, AgentVaultError>;

/// Stable error codes carried in the wire envelope.
pub mod codes {
    pub const INVALID_WORKSPACE: &str = "INVALID_WORKSPACE";
    pub const INVALID_NAME: &str = "INVALID_NAME";
    pub const SESSION_NOT_FOUND: &str = "SESSION_NOT_FOUND";
    pub const SESSION_EXPIRED: &str = "SESSION_EXPIRED";
    pub const SESSION_TERMINATED: &str = "SESSION_TERMINATED";
    pub const AUTHENTICATION_FAILED: &str = "AUTHENTICATION_FAILED";
    pub const SECRET_NOT_FOUND: &str = "SECRET_NOT_FOUND";
    pub const VALUE_TOO_LARGE: &str = "VALUE_TOO_LARGE";
    pub const CAPACITY_EXCEEDED: &str = "CAPACITY_EXCEEDED";
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const BACKEND_ERROR: &str = "BACKEND_ERROR";
    pub const BACKEND_UNAVAILABLE: &str = "BACKEND_UNAVAILABLE";
    pub const ENCRYPTION_ERROR: &str = "ENCRYPTION_ERROR";
    pub const INTEGRITY_ERROR: &str = "INTEGRITY_ERROR";
}

/// The `error` object inside an [`ErrorEnvelope`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub detail: BTreeMap<String, String>,
}

/// Serializable shape for all engine errors: `{ok: false, error: {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: WireError,
}

/// Builder signature used by the code table: `(message, detail) -> error`.
type FromWire = fn(String, &BTreeMap<String, String>) -> AgentVaultError;

/// Pull a field out of the detail map, falling back to the wire message.
fn detail_or(detail: &BTreeMap<String, String>, key: &str, fallback: String) -> String {
    detail.get(key).cloned().unwrap_or(fallback)
}

/// Maps each wire code to a constructor for its error variant.
///
/// Adding a new error kind means one new variant, one new code constant,
/// and one new row here.
const CODE_TABLE: &[(&str, FromWire)] = &[
    (codes::INVALID_WORKSPACE, |msg, d| {
        AgentVaultError::InvalidWorkspace(detail_or(d, "workspace", msg))
    }),
    (codes::INVALID_NAME, |msg, d| {
        AgentVaultError::InvalidName(detail_or(d, "name", msg))
    }),
    (codes::SESSION_NOT_FOUND, |msg, d| {
        AgentVaultError::SessionNotFound(detail_or(d, "session_id", msg))
    }),
    (codes::SESSION_EXPIRED, |msg, d| {
        AgentVaultError::SessionExpired(detail_or(d, "session_id", msg))
    }),
    (codes::SESSION_TERMINATED, |msg, d| {
        AgentVaultError::SessionTerminated(detail_or(d, "session_id", msg))
    }),
    (codes::AUTHENTICATION_FAILED, |msg, _| {
        AgentVaultError::AuthenticationFailed(msg)
    }),
    (codes::SECRET_NOT_FOUND, |msg, d| {
        AgentVaultError::SecretNotFound(detail_or(d, "name", msg))
    }),
    (codes::VALUE_TOO_LARGE, |_, d| AgentVaultError::ValueTooLarge {
        size: d.get("size").and_then(|s| s.parse().ok()).unwrap_or(0),
        limit: d.get("limit").and_then(|s| s.parse().ok()).unwrap_or(0),
    }),
    (codes::CAPACITY_EXCEEDED, |msg, _| {
        AgentVaultError::CapacityExceeded(msg)
    }),
    (codes::RATE_LIMIT_EXCEEDED, |msg, _| {
        AgentVaultError::RateLimitExceeded(msg)
    }),
    (codes::BACKEND_ERROR, |msg, _| AgentVaultError::BackendError(msg)),
    (codes::BACKEND_UNAVAILABLE, |msg, d| {
        AgentVaultError::BackendUnavailable(detail_or(d, "backend", msg))
    }),
    (codes::ENCRYPTION_ERROR, |msg, _| {
        AgentVaultError::EncryptionError(msg)
    }),
    (codes::INTEGRITY_ERROR, |msg, _| {
        AgentVaultError::IntegrityError(msg)
    }),
];

impl AgentVaultError {
    /// The stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidWorkspace(_) => codes::INVALID_WORKSPACE,
            Self::InvalidName(_) => codes::INVALID_NAME,
            Self::SessionNotFound(_) => codes::SESSION_NOT_FOUND,
            Self::SessionExpired(_) => codes::SESSION_EXPIRED,
            Self::SessionTerminated(_) => codes::SESSION_TERMINATED,
            Self::AuthenticationFailed(_) => codes::AUTHENTICATION_FAILED,
            Self::SecretNotFound(_) => codes::SECRET_NOT_FOUND,
            Self::ValueTooLarge { .. } => codes::VALUE_TOO_LARGE,
            Self::CapacityExceeded(_) => codes::CAPACITY_EXCEEDED,
            Self::RateLimitExceeded(_) => codes::RATE_LIMIT_EXCEEDED,
            Self::BackendError(_) => codes::BACKEND_ERROR,
            Self::BackendUnavailable(_) => codes::BACKEND_UNAVAILABLE,
            Self::EncryptionError(_) => codes::ENCRYPTION_ERROR,
            Self::IntegrityError(_) => codes::INTEGRITY_ERROR,
        }
    }

    /// Structured context for the wire envelope's `detail` map.
    pub fn detail(&self) -> BTreeMap<String, String> {
        let mut detail = BTreeMap::new();
        match self {
            Self::InvalidWorkspace(workspace) => {
                detail.insert("workspace".into(), workspace.clone());
            }
            Self::InvalidName(name) | Self::SecretNotFound(name) => {
                detail.insert("name".into(), name.clone());
            }
            Self::SessionNotFound(id) | Self::SessionExpired(id) | Self::SessionTerminated(id) => {
                detail.insert("session_id".into(), id.clone());
            }
            Self::ValueTooLarge { size, limit } => {
                detail.insert("size".into(), size.to_string());
                detail.insert("limit".into(), limit.to_string());
            }
            Self::BackendUnavailable(backend) => {
                detail.insert("backend".into(), backend.clone());
            }
            _ => {}
        }
        detail
    }

    /// Build the serializable envelope for this error.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            error: WireError {
                code: self.code().to_string(),
                message: self.to_string(),
                detail: self.detail(),
            },
        }
    }

    /// Reconstruct a typed error from wire parts.
    ///
    /// Total over all inputs: an unknown code folds into [`Self::BackendError`]
    /// so forward-compatible peers never fail to decode an error.
    pub fn from_wire(code: &str, message: &str, detail: &BTreeMap<String, String>) -> Self {
        for (known, build) in CODE_TABLE {
            if *known == code {
                return build(message.to_string(), detail);
            }
        }
        Self::BackendError(format!("{code}: {message}"))
    }

    /// Reconstruct a typed error from a full [`ErrorEnvelope`].
    pub fn from_envelope(envelope: &ErrorEnvelope) -> Self {
        Self::from_wire(
            &envelope.error.code,
            &envelope.error.message,
            &envelope.error.detail,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_round_trips_through_the_table() {
        let samples = vec![
            AgentVaultError::InvalidWorkspace("bad ws".into()),
            AgentVaultError::InvalidName("bad name".into()),
            AgentVaultError::SessionNotFound("avp_sess_x".into()),
            AgentVaultError::SessionExpired("avp_sess_x".into()),
            AgentVaultError::SessionTerminated("avp_sess_x".into()),
            AgentVaultError::AuthenticationFailed("no payload".into()),
            AgentVaultError::SecretNotFound("api_key".into()),
            AgentVaultError::ValueTooLarge {
                size: 70_000,
                limit: 65_536,
            },
            AgentVaultError::CapacityExceeded("workspace full".into()),
            AgentVaultError::RateLimitExceeded("slow down".into()),
            AgentVaultError::BackendError("disk unplugged".into()),
            AgentVaultError::BackendUnavailable("remote".into()),
            AgentVaultError::EncryptionError("seal failed".into()),
            AgentVaultError::IntegrityError("bad tag".into()),
        ];

        for original in samples {
            let envelope = original.to_envelope();
            assert!(!envelope.ok);
            let rebuilt = AgentVaultError::from_envelope(&envelope);
            assert_eq!(rebuilt.code(), original.code());
        }
    }

    #[test]
    fn value_too_large_keeps_structured_fields_on_the_wire() {
        let err = AgentVaultError::ValueTooLarge {
            size: 100,
            limit: 64,
        };
        let rebuilt = AgentVaultError::from_envelope(&err.to_envelope());
        match rebuilt {
            AgentVaultError::ValueTooLarge { size, limit } => {
                assert_eq!(size, 100);
                assert_eq!(limit, 64);
            }
            other => panic!("expected ValueTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn unknown_code_folds_into_backend_error() {
        let err = AgentVaultError::from_wire("SOMETHING_NEW", "later version", &BTreeMap::new());
        assert_eq!(err.code(), codes::BACKEND_ERROR);
    }

    #[test]
    fn envelope_serializes_with_stable_shape() {
        let json = serde_json::to_value(
            AgentVaultError::SecretNotFound("db_password".into()).to_envelope(),
        )
        .unwrap();
        assert_eq!(json["ok"], serde_json::json!(false));
        assert_eq!(json["error"]["code"], "SECRET_NOT_FOUND");
        assert_eq!(json["error"]["detail"]["name"], "db_password");
    }
}
