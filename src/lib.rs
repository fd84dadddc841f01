pub mod backend;
pub mod client;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod protocol;
pub mod session;
pub mod validate;

pub use client::VaultClient;
pub use errors::{AgentVaultError, Result};
