//! Syntax rules for secret names and workspace ids.
//!
//! Both checks are pure and total: they return `false` for bad input and
//! never panic, leaving the caller to decide which error to raise. The
//! orchestrator runs them before any backend is touched.

/// Maximum length for secret names and workspace ids, in bytes.
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Returns `true` iff `name` is a valid secret name.
///
/// Valid: 1 to 255 bytes, first character an ASCII letter, remaining
/// characters ASCII letters, digits, `_`, `.`, or `-`.
pub fn validate_secret_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_IDENTIFIER_LENGTH {
        return false;
    }
    if !bytes[0].is_ascii_alphabetic() {
        return false;
    }
    bytes[1..].iter().all(is_name_byte)
}

/// Returns `true` iff `id` is a valid workspace id.
///
/// Valid: 1 to 255 bytes, first character an ASCII letter or digit,
/// remaining characters as for secret names plus `/` (so ids like
/// `team/project` can namespace workspaces).
pub fn validate_workspace_id(id: &str) -> bool {
    let bytes = id.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_IDENTIFIER_LENGTH {
        return false;
    }
    if !bytes[0].is_ascii_alphanumeric() {
        return false;
    }
    bytes[1..]
        .iter()
        .all(|b| is_name_byte(b) || *b == b'/')
}

fn is_name_byte(b: &u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_secret_names() {
        assert!(validate_secret_name("api_key"));
        assert!(validate_secret_name("db.password"));
        assert!(validate_secret_name("token-2024"));
        assert!(validate_secret_name("a"));
    }

    #[test]
    fn rejects_bad_secret_names() {
        assert!(!validate_secret_name(""));
        assert!(!validate_secret_name("1starts_with_digit"));
        assert!(!validate_secret_name("_starts_with_underscore"));
        assert!(!validate_secret_name("has space"));
        assert!(!validate_secret_name("has/slash"));
        assert!(!validate_secret_name("ünïcode"));
    }

    #[test]
    fn enforces_length_bounds() {
        let max = "a".repeat(MAX_IDENTIFIER_LENGTH);
        assert!(validate_secret_name(&max));
        assert!(!validate_secret_name(&format!("{max}a")));

        assert!(validate_workspace_id(&max));
        assert!(!validate_workspace_id(&format!("{max}a")));
    }

    #[test]
    fn workspace_ids_allow_digits_first_and_slashes() {
        assert!(validate_workspace_id("default"));
        assert!(validate_workspace_id("42-team"));
        assert!(validate_workspace_id("team/project"));
        assert!(validate_workspace_id("org/team/env-1"));
    }

    #[test]
    fn rejects_bad_workspace_ids() {
        assert!(!validate_workspace_id(""));
        assert!(!validate_workspace_id("/leading-slash"));
        assert!(!validate_workspace_id("_underscore_first"));
        assert!(!validate_workspace_id("white space"));
    }
}
