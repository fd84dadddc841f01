//! In-memory handling of the derived vault key.
//!
//! The key only ever lives inside `VaultKey`, which zeroes its memory
//! when dropped so the raw bytes cannot linger after the vault is closed.

use zeroize::Zeroize;

/// Length of the vault key in bytes (256 bits).
const KEY_LEN: usize = 32;

/// A wrapper around the 32-byte vault key that automatically zeroes
/// its memory when dropped.
///
/// Every secret value in a vault is sealed under this one key; there is
/// no per-secret sub-key derivation.  Dropping the `VaultKey` is how a
/// backend "forgets" its credentials on close.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct VaultKey {
    bytes: [u8; KEY_LEN],
}

impl VaultKey {
    /// Create a new `VaultKey` from raw derived bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes (e.g. to pass to the AEAD cipher).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}
