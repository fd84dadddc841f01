//! Cryptographic primitives for AgentVault.
//!
//! This module provides:
//! - AES-256-GCM sealing and opening of vault payloads (`encryption`)
//! - Argon2id password-based key derivation (`kdf`)
//! - The zeroize-on-drop vault key wrapper (`keys`)

pub mod encryption;
pub mod kdf;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{seal, open, derive_vault_key, ...};
pub use encryption::{open, seal, IV_LEN, TAG_LEN};
pub use kdf::{derive_vault_key, derive_vault_key_with_params, Argon2Params, KDF_SALT};
pub use keys::VaultKey;
