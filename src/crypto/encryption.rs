//! AES-256-GCM authenticated encryption for vault payloads.
//!
//! Each call to `seal` generates a fresh random 16-byte IV and produces a
//! self-contained blob carrying the IV, the GCM authentication tag, and
//! the ciphertext.  `open` splits those pieces back out before decrypting.
//!
//! Layout of the sealed byte buffer:
//!   [ 16-byte IV | 16-byte auth tag | ciphertext ]
//!
//! The tag sits between the IV and the ciphertext, so the AEAD output
//! (which ends with the tag) is re-ordered on the way in and out.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::aes::Aes256;
use aes_gcm::{AeadCore, AesGcm, Nonce};

use crate::errors::{AgentVaultError, Result};

/// Size of the GCM IV in bytes.
pub const IV_LEN: usize = 16;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// AES-256-GCM with a 16-byte IV instead of the usual 12.
type VaultCipher = AesGcm<Aes256, U16>;

/// Encrypt `plaintext` with a 32-byte `key`.
///
/// Returns the sealed blob (IV || tag || ciphertext).
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    // Build the cipher from the raw key bytes.
    let cipher = VaultCipher::new_from_slice(key)
        .map_err(|e| AgentVaultError::EncryptionError(format!("invalid key length: {e}")))?;

    // Generate a random 16-byte IV.
    let iv = VaultCipher::generate_nonce(&mut OsRng);

    // Encrypt and authenticate the plaintext.
    let sealed = cipher
        .encrypt(&iv, plaintext)
        .map_err(|e| AgentVaultError::EncryptionError(format!("encryption error: {e}")))?;

    // The AEAD output is ciphertext || tag; the blob layout wants the tag
    // right after the IV.
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    let mut output = Vec::with_capacity(IV_LEN + TAG_LEN + ciphertext.len());
    output.extend_from_slice(&iv);
    output.extend_from_slice(tag);
    output.extend_from_slice(ciphertext);
    Ok(output)
}

/// Decrypt a blob that was produced by `seal`.
///
/// Expects the first 16 bytes to be the IV and the next 16 the auth tag,
/// followed by the ciphertext.
pub fn open(key: &[u8], blob: &[u8]) -> Result<Vec<u8>> {
    // Make sure we have at least an IV and a tag worth of bytes.
    if blob.len() < IV_LEN + TAG_LEN {
        return Err(AgentVaultError::IntegrityError(format!(
            "sealed payload too short: {} bytes (expected at least {})",
            blob.len(),
            IV_LEN + TAG_LEN
        )));
    }

    // Split IV and tag from the ciphertext.
    let (iv_bytes, rest) = blob.split_at(IV_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);
    let iv = Nonce::from_slice(iv_bytes);

    // Build the cipher from the raw key bytes.
    let cipher = VaultCipher::new_from_slice(key)
        .map_err(|e| AgentVaultError::EncryptionError(format!("invalid key length: {e}")))?;

    // Re-append the tag where the AEAD implementation expects it.
    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    // Decrypt and verify the auth tag.
    cipher.decrypt(iv, sealed.as_ref()).map_err(|_| {
        AgentVaultError::EncryptionError(
            "decryption failed: wrong credentials or corrupted payload".into(),
        )
    })
}
