//! Password-based key derivation using Argon2id.
//!
//! Argon2id is a memory-hard KDF that protects against brute-force and
//! GPU-based attacks.  The salt is a fixed crate-wide constant: the vault
//! file format is a bare `IV || tag || ciphertext` blob with no header to
//! carry a per-vault salt, so two vaults opened with the same password and
//! parameters derive the same key.  Callers that need isolation across
//! vault files must use distinct passwords per vault.

use argon2::{Algorithm, Argon2, Params, Version};

use crate::errors::{AgentVaultError, Result};

/// Fixed salt shared by every vault (see module docs for the trade-off).
pub const KDF_SALT: &[u8] = b"agentvault.kdf.v1";

/// Length of the derived key in bytes (256 bits, for AES-256).
const KEY_LEN: usize = 32;

/// Minimum safe memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Configurable Argon2id parameters.
///
/// These map 1:1 to the fields in `Settings` so embedders can pass
/// whatever was configured in `.agentvault.toml`.  Changing them after a
/// vault file exists makes that vault unreadable, exactly like changing
/// the password, because no parameters are stored in the file.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Derive the 32-byte vault key from a password.
///
/// Uses the default Argon2id parameters (64 MB, 3 iterations, 4 lanes).
/// Prefer `derive_vault_key_with_params` when you have a `Settings`.
pub fn derive_vault_key(password: &[u8]) -> Result<[u8; KEY_LEN]> {
    derive_vault_key_with_params(password, &Argon2Params::default())
}

/// Derive the 32-byte vault key with explicit Argon2id parameters.
///
/// The same password + params will always produce the same key.
/// Enforces minimum Argon2 parameters to prevent dangerously weak KDF settings.
pub fn derive_vault_key_with_params(
    password: &[u8],
    argon2_params: &Argon2Params,
) -> Result<[u8; KEY_LEN]> {
    if argon2_params.memory_kib < MIN_MEMORY_KIB {
        return Err(AgentVaultError::EncryptionError(format!(
            "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
            argon2_params.memory_kib
        )));
    }
    if argon2_params.iterations < 1 {
        return Err(AgentVaultError::EncryptionError(
            "Argon2 iterations must be at least 1".into(),
        ));
    }
    if argon2_params.parallelism < 1 {
        return Err(AgentVaultError::EncryptionError(
            "Argon2 parallelism must be at least 1".into(),
        ));
    }

    let params = Params::new(
        argon2_params.memory_kib,
        argon2_params.iterations,
        argon2_params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| AgentVaultError::EncryptionError(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, KDF_SALT, &mut key)
        .map_err(|e| AgentVaultError::EncryptionError(format!("Argon2id hashing failed: {e}")))?;

    Ok(key)
}
