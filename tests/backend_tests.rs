//! Integration tests for the backend contract, driven through the
//! in-process memory store.

use std::collections::BTreeMap;

use agentvault::backend::{MemoryStore, SecretBackend, StoreOptions};
use agentvault::errors::AgentVaultError;
use chrono::{Duration, Utc};

/// Helper: labels map from (key, value) pairs.
fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Helper: store options carrying only labels.
fn with_labels(pairs: &[(&str, &str)]) -> StoreOptions {
    StoreOptions {
        labels: labels(pairs),
        ..StoreOptions::default()
    }
}

// ---------------------------------------------------------------------------
// Store: creation, update, versioning
// ---------------------------------------------------------------------------

#[test]
fn store_creates_version_one() {
    let store = MemoryStore::new();

    let outcome = store
        .store("acme", "api_key", b"secret123", &StoreOptions::default())
        .expect("store");
    assert!(outcome.created);
    assert_eq!(outcome.version, 1);

    let meta = store.get_metadata("acme", "api_key").expect("metadata");
    assert_eq!(meta.version, 1);
    assert_eq!(meta.backend, "memory");
    assert_eq!(meta.created_at, meta.updated_at);
    assert!(meta.labels.is_empty());
}

#[test]
fn store_update_increments_version_and_preserves_created_at() {
    let store = MemoryStore::new();

    store
        .store("acme", "api_key", b"v1", &StoreOptions::default())
        .unwrap();
    let created_before = store.get_metadata("acme", "api_key").unwrap().created_at;

    let outcome = store
        .store("acme", "api_key", b"v2", &StoreOptions::default())
        .unwrap();
    assert!(!outcome.created);
    assert_eq!(outcome.version, 2);

    // created_at must survive the update; only updated_at moves.
    let meta = store.get_metadata("acme", "api_key").unwrap();
    assert_eq!(meta.created_at, created_before);
    assert!(meta.updated_at >= meta.created_at);

    let retrieved = store.retrieve("acme", "api_key", None).unwrap();
    assert_eq!(retrieved.value, b"v2");
    assert_eq!(retrieved.version, 2);
}

#[test]
fn store_replaces_labels_wholesale() {
    let store = MemoryStore::new();

    store
        .store("acme", "db", b"x", &with_labels(&[("env", "prod"), ("tier", "db")]))
        .unwrap();
    store
        .store("acme", "db", b"y", &with_labels(&[("env", "staging")]))
        .unwrap();

    // The second store fully describes the labels; nothing merges.
    let meta = store.get_metadata("acme", "db").unwrap();
    assert_eq!(meta.labels, labels(&[("env", "staging")]));
}

#[test]
fn recreate_after_delete_restarts_at_version_one() {
    let store = MemoryStore::new();

    store.store("acme", "key", b"a", &StoreOptions::default()).unwrap();
    store.store("acme", "key", b"b", &StoreOptions::default()).unwrap();
    assert!(store.delete("acme", "key").unwrap());

    let outcome = store.store("acme", "key", b"c", &StoreOptions::default()).unwrap();
    assert!(outcome.created);
    assert_eq!(outcome.version, 1);
}

// ---------------------------------------------------------------------------
// Retrieve: version pinning
// ---------------------------------------------------------------------------

#[test]
fn retrieve_with_version_pin() {
    let store = MemoryStore::new();
    store.store("acme", "key", b"one", &StoreOptions::default()).unwrap();
    store.store("acme", "key", b"two", &StoreOptions::default()).unwrap();

    // Only the current version is retained, so pinning it succeeds and
    // pinning a superseded one does not.
    let current = store.retrieve("acme", "key", Some(2)).expect("current version");
    assert_eq!(current.value, b"two");

    let stale = store.retrieve("acme", "key", Some(1));
    assert!(matches!(stale, Err(AgentVaultError::SecretNotFound(_))));
}

#[test]
fn retrieve_missing_secret_fails() {
    let store = MemoryStore::new();
    let result = store.retrieve("acme", "ghost", None);
    assert!(matches!(result, Err(AgentVaultError::SecretNotFound(_))));
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[test]
fn delete_reports_whether_something_existed() {
    let store = MemoryStore::new();
    store.store("acme", "key", b"v", &StoreOptions::default()).unwrap();

    assert!(store.delete("acme", "key").unwrap());
    assert!(!store.delete("acme", "key").unwrap());

    let result = store.retrieve("acme", "key", None);
    assert!(matches!(result, Err(AgentVaultError::SecretNotFound(_))));
    let result = store.get_metadata("acme", "key");
    assert!(matches!(result, Err(AgentVaultError::SecretNotFound(_))));
}

// ---------------------------------------------------------------------------
// Expiration is lazy
// ---------------------------------------------------------------------------

#[test]
fn expired_secret_is_invisible_everywhere() {
    let store = MemoryStore::new();
    let past = StoreOptions {
        expires_at: Some(Utc::now() - Duration::seconds(5)),
        ..StoreOptions::default()
    };

    store.store("acme", "stale", b"old", &past).unwrap();
    store.store("acme", "live", b"fresh", &StoreOptions::default()).unwrap();

    // Every read path treats the expired entry as absent.
    assert!(matches!(
        store.retrieve("acme", "stale", None),
        Err(AgentVaultError::SecretNotFound(_))
    ));
    assert!(matches!(
        store.get_metadata("acme", "stale"),
        Err(AgentVaultError::SecretNotFound(_))
    ));

    let page = store.list_secrets("acme", None, None, 100).unwrap();
    let names: Vec<&str> = page.secrets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["live"]);
}

#[test]
fn future_expiry_stays_visible() {
    let store = MemoryStore::new();
    let later = StoreOptions {
        expires_at: Some(Utc::now() + Duration::hours(1)),
        ..StoreOptions::default()
    };

    store.store("acme", "token", b"v", &later).unwrap();
    assert_eq!(store.retrieve("acme", "token", None).unwrap().value, b"v");
}

// ---------------------------------------------------------------------------
// List: filtering and pagination
// ---------------------------------------------------------------------------

#[test]
fn list_filters_labels_as_exact_conjunction() {
    let store = MemoryStore::new();
    store
        .store("acme", "web", b"1", &with_labels(&[("env", "prod"), ("tier", "web")]))
        .unwrap();
    store
        .store("acme", "db", b"2", &with_labels(&[("env", "prod"), ("tier", "db")]))
        .unwrap();
    store
        .store("acme", "dev", b"3", &with_labels(&[("env", "dev")]))
        .unwrap();

    let prod = labels(&[("env", "prod")]);
    let page = store.list_secrets("acme", Some(&prod), None, 100).unwrap();
    assert_eq!(page.secrets.len(), 2);

    // Every filter key must match, not just one.
    let prod_web = labels(&[("env", "prod"), ("tier", "web")]);
    let page = store.list_secrets("acme", Some(&prod_web), None, 100).unwrap();
    assert_eq!(page.secrets.len(), 1);
    assert_eq!(page.secrets[0].name, "web");

    let nothing = labels(&[("env", "qa")]);
    let page = store.list_secrets("acme", Some(&nothing), None, 100).unwrap();
    assert!(page.secrets.is_empty());

    // An empty filter constrains nothing.
    let empty = BTreeMap::new();
    let page = store.list_secrets("acme", Some(&empty), None, 100).unwrap();
    assert_eq!(page.secrets.len(), 3);
}

#[test]
fn list_paginates_in_name_order() {
    let store = MemoryStore::new();

    // Insert out of order; listing must come back sorted by name.
    for i in (0..10).rev() {
        let name = format!("key{i:02}");
        store.store("acme", &name, b"v", &StoreOptions::default()).unwrap();
    }

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0;
    loop {
        let page = store
            .list_secrets("acme", None, cursor.as_deref(), 4)
            .expect("list page");
        pages += 1;
        seen.extend(page.secrets.iter().map(|s| s.name.clone()));
        match page.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(pages, 3);
    let expected: Vec<String> = (0..10).map(|i| format!("key{i:02}")).collect();
    assert_eq!(seen, expected);
}

#[test]
fn list_cursor_is_a_decimal_offset() {
    let store = MemoryStore::new();
    for name in ["a", "b", "c"] {
        store.store("acme", name, b"v", &StoreOptions::default()).unwrap();
    }

    let page = store.list_secrets("acme", None, None, 2).unwrap();
    assert_eq!(page.cursor.as_deref(), Some("2"));

    // A full page with nothing after it carries no cursor.
    let page = store.list_secrets("acme", None, Some("2"), 2).unwrap();
    assert_eq!(page.secrets.len(), 1);
    assert!(page.cursor.is_none());
}

#[test]
fn list_rejects_malformed_cursor() {
    let store = MemoryStore::new();
    store.store("acme", "key", b"v", &StoreOptions::default()).unwrap();

    let result = store.list_secrets("acme", None, Some("not-a-number"), 10);
    assert!(matches!(result, Err(AgentVaultError::BackendError(_))));
}

#[test]
fn list_unknown_workspace_is_empty() {
    let store = MemoryStore::new();
    let page = store.list_secrets("nowhere", None, None, 10).unwrap();
    assert!(page.secrets.is_empty());
    assert!(page.cursor.is_none());
}

// ---------------------------------------------------------------------------
// Workspace isolation
// ---------------------------------------------------------------------------

#[test]
fn workspaces_do_not_leak_into_each_other() {
    let store = MemoryStore::new();
    store.store("team-a", "api_key", b"alpha", &StoreOptions::default()).unwrap();
    store.store("team-b", "api_key", b"bravo", &StoreOptions::default()).unwrap();

    assert_eq!(store.retrieve("team-a", "api_key", None).unwrap().value, b"alpha");
    assert_eq!(store.retrieve("team-b", "api_key", None).unwrap().value, b"bravo");

    // Deleting in one workspace leaves the other alone.
    assert!(store.delete("team-a", "api_key").unwrap());
    assert!(matches!(
        store.retrieve("team-a", "api_key", None),
        Err(AgentVaultError::SecretNotFound(_))
    ));
    assert_eq!(store.retrieve("team-b", "api_key", None).unwrap().value, b"bravo");
}

// ---------------------------------------------------------------------------
// Rotate
// ---------------------------------------------------------------------------

#[test]
fn rotate_replaces_value_and_keeps_attributes() {
    let store = MemoryStore::new();
    let options = StoreOptions {
        labels: labels(&[("env", "prod")]),
        rotation_policy: Some("30d".to_string()),
        ..StoreOptions::default()
    };
    store.store("acme", "api_key", b"secret123", &options).unwrap();

    let version = store.rotate("acme", "api_key", b"secret456").expect("rotate");
    assert_eq!(version, 2);

    let retrieved = store.retrieve("acme", "api_key", None).unwrap();
    assert_eq!(retrieved.value, b"secret456");

    let meta = store.get_metadata("acme", "api_key").unwrap();
    assert_eq!(meta.labels, labels(&[("env", "prod")]));
    assert_eq!(meta.rotation_policy.as_deref(), Some("30d"));
}

#[test]
fn rotate_never_creates_a_secret() {
    let store = MemoryStore::new();

    let result = store.rotate("acme", "ghost", b"value");
    assert!(matches!(result, Err(AgentVaultError::SecretNotFound(_))));

    // The failed rotate must not have stored anything.
    let page = store.list_secrets("acme", None, None, 10).unwrap();
    assert!(page.secrets.is_empty());
}

// ---------------------------------------------------------------------------
// Lifecycle and advertisement
// ---------------------------------------------------------------------------

#[test]
fn closed_store_rejects_operations() {
    let store = MemoryStore::new();
    store.store("acme", "key", b"v", &StoreOptions::default()).unwrap();

    store.close().expect("close");
    store.close().expect("close is idempotent");

    let result = store.store("acme", "key", b"v2", &StoreOptions::default());
    assert!(matches!(result, Err(AgentVaultError::BackendUnavailable(_))));
    let result = store.retrieve("acme", "key", None);
    assert!(matches!(result, Err(AgentVaultError::BackendUnavailable(_))));
}

#[test]
fn memory_descriptor_and_capabilities() {
    let store = MemoryStore::new();

    let descriptor = store.descriptor();
    assert_eq!(descriptor.id, "memory");
    assert_eq!(descriptor.info.get("volatile").map(String::as_str), Some("true"));

    let caps = store.capabilities();
    assert!(caps.versioning && caps.labels && caps.expiration && caps.rotation);
    assert!(!caps.persistence);
    assert!(!caps.encryption);
}

#[test]
fn contract_holds_through_a_trait_object() {
    // Backends are driven as `Box<dyn SecretBackend>` by the client, so
    // the whole surface must be object-safe.
    let backend: Box<dyn SecretBackend> = Box::new(MemoryStore::new());

    backend
        .store("acme", "api_key", b"secret123", &StoreOptions::default())
        .unwrap();
    let version = backend.rotate("acme", "api_key", b"secret456").unwrap();
    assert_eq!(version, 2);
    assert_eq!(
        backend.retrieve("acme", "api_key", None).unwrap().value,
        b"secret456"
    );
}
