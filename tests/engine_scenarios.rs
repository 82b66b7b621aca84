//! End-to-end tests for `SecretEngine` over the in-memory key service and
//! both shipped item stores.

use std::sync::Arc;

use credvault::store::{decode_record, encode_record};
use credvault::{
    AttributeValue, CredentialRecord, EncryptionContext, EngineConfig, InMemoryItemStore,
    InMemoryKms, ItemKey, ItemStore, SecretEngine, SecretError, Version, DEFAULT_KEY_ALIAS,
    DEFAULT_TABLE,
};

// ============================================================================
// Helpers
// ============================================================================

struct Harness {
    engine: SecretEngine,
    kms: Arc<InMemoryKms>,
    items: Arc<InMemoryItemStore>,
}

fn harness() -> Harness {
    let kms = Arc::new(InMemoryKms::with_key(DEFAULT_KEY_ALIAS).expect("create key"));
    let items = Arc::new(InMemoryItemStore::new());
    let engine = SecretEngine::new(kms.clone(), items.clone(), EngineConfig::default())
        .expect("valid config");
    Harness { engine, kms, items }
}

fn ctx(env: &str) -> EncryptionContext {
    EncryptionContext::new().with("env", env)
}

fn v(n: u64) -> Version {
    Version::new(n).expect("representable version")
}

/// Rewrite a stored record in place, bypassing the insert-if-absent guard.
async fn tamper(
    h: &Harness,
    name: &str,
    version: Version,
    edit: impl FnOnce(&mut CredentialRecord),
) {
    let key = ItemKey::new(name, version.encode());
    let item = h
        .items
        .get_item(DEFAULT_TABLE, &key)
        .await
        .expect("get item")
        .expect("item present");
    let mut record = decode_record(&item).expect("decode");
    edit(&mut record);
    h.items
        .put_item_unchecked(DEFAULT_TABLE, encode_record(&record))
        .expect("overwrite");
}

// ============================================================================
// db-pass lifecycle
// ============================================================================

#[tokio::test]
async fn db_pass_lifecycle() {
    let h = harness();

    h.engine
        .put("db-pass", "s3cr3t", Some(v(1)), &ctx("prod"))
        .await
        .expect("put");

    let latest = h.engine.get_latest("db-pass", &ctx("prod")).await.expect("get latest");
    assert_eq!(latest.secret(), "s3cr3t");

    let err = h
        .engine
        .get("db-pass", v(1), &ctx("staging"))
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::ContextMismatch(_)), "got {:?}", err);

    assert_eq!(h.engine.delete("db-pass").await.expect("delete"), 1);
    let err = h.engine.get_latest("db-pass", &ctx("prod")).await.unwrap_err();
    assert!(matches!(err, SecretError::NotFound { .. }));
}

// ============================================================================
// Round trip
// ============================================================================

#[tokio::test]
async fn round_trips_assorted_plaintexts_and_contexts() {
    let h = harness();
    let long = "x".repeat(10_000);
    let cases: Vec<(&str, EncryptionContext)> = vec![
        ("", EncryptionContext::new()),
        ("a", ctx("prod")),
        ("exactly sixteen!", ctx("dev")),
        ("pässwörd ✓ 🔑", ctx("prod").with("team", "payments")),
        (long.as_str(), ctx("prod")),
    ];

    for (i, (plaintext, context)) in cases.iter().enumerate() {
        let version = v(i as u64 + 1);
        h.engine
            .put("round-trip", plaintext, Some(version), context)
            .await
            .expect("put");
        let got = h
            .engine
            .get("round-trip", version, context)
            .await
            .expect("get");
        assert_eq!(got.secret(), *plaintext);
        assert_eq!(got.name(), "round-trip");
        assert_eq!(got.version(), version.encode());
    }
}

#[tokio::test]
async fn each_write_uses_a_fresh_data_key() {
    let h = harness();
    h.engine.put("a", "same", Some(v(1)), &ctx("prod")).await.unwrap();
    h.engine.put("a", "same", Some(v(2)), &ctx("prod")).await.unwrap();

    let read = |n: u64| {
        let items = h.items.clone();
        async move {
            let item = items
                .get_item(DEFAULT_TABLE, &ItemKey::new("a", v(n).encode()))
                .await
                .unwrap()
                .unwrap();
            decode_record(&item).unwrap()
        }
    };
    let (first, second) = (read(1).await, read(2).await);
    assert_ne!(first.wrapped_key, second.wrapped_key);
    assert_ne!(first.ciphertext, second.ciphertext);
    assert_ne!(first.mac, second.mac);
}

// ============================================================================
// Tamper detection
// ============================================================================

#[tokio::test]
async fn any_flipped_contents_bit_fails_integrity() {
    let h = harness();
    h.engine.put("t", "s3cr3t", None, &ctx("prod")).await.unwrap();

    let bits = "s3cr3t".len() * 8;
    for bit in 0..bits {
        tamper(&h, "t", Version::FIRST, |r| r.ciphertext[bit / 8] ^= 1 << (bit % 8)).await;
        let err = h.engine.get("t", Version::FIRST, &ctx("prod")).await.unwrap_err();
        assert!(
            matches!(err, SecretError::IntegrityFailure { .. }),
            "bit {}: {:?}",
            bit,
            err
        );
        // Flip back so each iteration changes exactly one bit.
        tamper(&h, "t", Version::FIRST, |r| r.ciphertext[bit / 8] ^= 1 << (bit % 8)).await;
    }

    let restored = h.engine.get("t", Version::FIRST, &ctx("prod")).await.unwrap();
    assert_eq!(restored.secret(), "s3cr3t");
}

#[tokio::test]
async fn any_flipped_hmac_bit_fails_integrity() {
    let h = harness();
    h.engine.put("t", "s3cr3t", None, &ctx("prod")).await.unwrap();

    for bit in 0..256 {
        tamper(&h, "t", Version::FIRST, |r| r.mac[bit / 8] ^= 1 << (bit % 8)).await;
        let err = h.engine.get_latest("t", &ctx("prod")).await.unwrap_err();
        assert!(
            matches!(err, SecretError::IntegrityFailure { .. }),
            "bit {}: {:?}",
            bit,
            err
        );
        tamper(&h, "t", Version::FIRST, |r| r.mac[bit / 8] ^= 1 << (bit % 8)).await;
    }
}

#[tokio::test]
async fn any_flipped_bit_of_stored_hmac_attribute_fails_integrity() {
    let h = harness();
    h.engine.put("t", "s3cr3t", None, &ctx("prod")).await.unwrap();

    let key = ItemKey::new("t", Version::FIRST.encode());
    let original = h
        .items
        .get_item(DEFAULT_TABLE, &key)
        .await
        .expect("get item")
        .expect("item present");
    let stored = original["hmac"].as_b().expect("hmac stored as binary").to_vec();

    for bit in 0..stored.len() * 8 {
        let mut flipped = stored.clone();
        flipped[bit / 8] ^= 1 << (bit % 8);
        let mut item = original.clone();
        item.insert("hmac".into(), AttributeValue::B(flipped));
        h.items.put_item_unchecked(DEFAULT_TABLE, item).expect("overwrite");

        let err = h.engine.get("t", Version::FIRST, &ctx("prod")).await.unwrap_err();
        assert!(
            matches!(err, SecretError::IntegrityFailure { .. }),
            "bit {}: {:?}",
            bit,
            err
        );
    }

    h.items
        .put_item_unchecked(DEFAULT_TABLE, original)
        .expect("restore");
    let restored = h.engine.get("t", Version::FIRST, &ctx("prod")).await.unwrap();
    assert_eq!(restored.secret(), "s3cr3t");
}

#[tokio::test]
async fn truncated_hmac_fails_integrity() {
    let h = harness();
    h.engine.put("t", "s3cr3t", None, &ctx("prod")).await.unwrap();
    tamper(&h, "t", Version::FIRST, |r| r.mac.truncate(16)).await;
    assert!(matches!(
        h.engine.get_latest("t", &ctx("prod")).await,
        Err(SecretError::IntegrityFailure { .. })
    ));
}

#[tokio::test]
async fn copied_tuple_still_verifies_under_another_name() {
    // The tag covers ciphertext only, so a record moved to another key
    // still verifies. Kept for compatibility with existing tables.
    let h = harness();
    h.engine.put("src", "s3cr3t", None, &ctx("prod")).await.unwrap();
    let item = h
        .items
        .get_item(DEFAULT_TABLE, &ItemKey::new("src", Version::FIRST.encode()))
        .await
        .unwrap()
        .unwrap();
    let mut record = decode_record(&item).unwrap();
    record.name = "dst".into();
    h.items
        .put_item_unchecked(DEFAULT_TABLE, encode_record(&record))
        .unwrap();

    let copied = h.engine.get_latest("dst", &ctx("prod")).await.unwrap();
    assert_eq!(copied.secret(), "s3cr3t");
}

// ============================================================================
// Context binding and access
// ============================================================================

#[tokio::test]
async fn context_must_match_exactly() {
    let h = harness();
    let written = ctx("prod").with("team", "payments");
    h.engine.put("k", "v", None, &written).await.unwrap();

    for wrong in [
        EncryptionContext::new(),
        ctx("prod"),
        ctx("staging").with("team", "payments"),
        written.clone().with("extra", "1"),
    ] {
        let err = h.engine.get_latest("k", &wrong).await.unwrap_err();
        assert!(matches!(err, SecretError::ContextMismatch(_)), "{:?}", err);
    }
    assert_eq!(h.engine.get_latest("k", &written).await.unwrap().secret(), "v");
}

#[tokio::test]
async fn denied_key_surfaces_access_denied() {
    let h = harness();
    h.engine.put("k", "v", None, &ctx("prod")).await.unwrap();

    h.kms.deny(DEFAULT_KEY_ALIAS);
    let err = h.engine.get_latest("k", &ctx("prod")).await.unwrap_err();
    assert!(matches!(err, SecretError::AccessDenied(_)), "{:?}", err);
    let err = h.engine.put("k", "w", Some(v(2)), &ctx("prod")).await.unwrap_err();
    assert!(matches!(err, SecretError::AccessDenied(_)), "{:?}", err);
    assert_eq!(h.items.len(DEFAULT_TABLE), 1);

    h.kms.allow(DEFAULT_KEY_ALIAS);
    assert_eq!(h.engine.get_latest("k", &ctx("prod")).await.unwrap().secret(), "v");
}

#[tokio::test]
async fn missing_wrapping_key_is_a_collaborator_error() {
    let h = harness();
    let engine = SecretEngine::new(
        h.kms.clone(),
        h.items.clone(),
        EngineConfig::default().with_key_alias("alias/nope"),
    )
    .unwrap();
    let err = engine.put("k", "v", None, &ctx("prod")).await.unwrap_err();
    assert!(matches!(err, SecretError::Collaborator(_)), "{:?}", err);
    assert!(h.items.is_empty(DEFAULT_TABLE));
}

// ============================================================================
// Immutability and versions
// ============================================================================

#[tokio::test]
async fn second_put_at_same_version_is_rejected() {
    let h = harness();
    h.engine.put("k", "original", Some(v(3)), &ctx("prod")).await.unwrap();
    let before = h
        .items
        .get_item(DEFAULT_TABLE, &ItemKey::new("k", v(3).encode()))
        .await
        .unwrap();

    let err = h
        .engine
        .put("k", "replacement", Some(v(3)), &ctx("prod"))
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::AlreadyExists { .. }), "{:?}", err);

    let after = h
        .items
        .get_item(DEFAULT_TABLE, &ItemKey::new("k", v(3).encode()))
        .await
        .unwrap();
    assert_eq!(before, after);
    assert_eq!(h.engine.get("k", v(3), &ctx("prod")).await.unwrap().secret(), "original");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_puts_have_one_winner() {
    let h = harness();
    let mut tasks = Vec::new();
    for i in 0..16 {
        let engine = h.engine.clone();
        tasks.push(tokio::spawn(async move {
            engine
                .put("race", &format!("writer-{}", i), Some(Version::FIRST), &ctx("prod"))
                .await
        }));
    }

    let mut winners = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(_) => winners += 1,
            Err(SecretError::AlreadyExists { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(h.items.len(DEFAULT_TABLE), 1);
}

#[tokio::test]
async fn resolve_next_version_auto_increments() {
    let h = harness();
    let first = h.engine.resolve_next_version("svc", 0).await.unwrap();
    assert_eq!(first.encode(), "0000000000000000001");
    assert_eq!(h.engine.highest_version("svc").await.unwrap(), None);

    h.engine.put("svc", "one", Some(first), &ctx("prod")).await.unwrap();
    let second = h.engine.resolve_next_version("svc", 0).await.unwrap();
    assert_eq!(second.encode(), "0000000000000000002");

    h.engine.put("svc", "two", Some(second), &ctx("prod")).await.unwrap();
    assert_eq!(h.engine.highest_version("svc").await.unwrap(), Some(v(2)));
    assert_eq!(h.engine.get_latest("svc", &ctx("prod")).await.unwrap().secret(), "two");
}

#[tokio::test]
async fn latest_follows_numeric_order_past_nine() {
    let h = harness();
    for n in [2, 9, 10, 100, 42] {
        h.engine
            .put("many", &format!("value-{}", n), Some(v(n)), &ctx("prod"))
            .await
            .unwrap();
    }
    let latest = h.engine.get_latest("many", &ctx("prod")).await.unwrap();
    assert_eq!(latest.secret(), "value-100");
    assert_eq!(h.engine.resolve_next_version("many", 0).await.unwrap(), v(101));
}

#[tokio::test]
async fn non_numeric_latest_version_is_reported() {
    let h = harness();
    h.engine.put("legacy", "old", None, &ctx("prod")).await.unwrap();

    let item = h
        .items
        .get_item(DEFAULT_TABLE, &ItemKey::new("legacy", Version::FIRST.encode()))
        .await
        .unwrap()
        .unwrap();
    let mut record = decode_record(&item).unwrap();
    record.version = "v2-final".into();
    h.items
        .put_item_unchecked(DEFAULT_TABLE, encode_record(&record))
        .unwrap();

    let err = h.engine.resolve_next_version("legacy", 0).await.unwrap_err();
    assert!(matches!(err, SecretError::InvalidVersion(_)), "{:?}", err);

    // Still readable: the version string is carried as stored.
    let latest = h.engine.get_latest("legacy", &ctx("prod")).await.unwrap();
    assert_eq!(latest.version(), "v2-final");
    assert_eq!(latest.secret(), "old");
}

#[tokio::test]
async fn version_at_the_top_has_no_successor() {
    let h = harness();
    h.engine
        .put("top", "max", Some(v(Version::MAX)), &ctx("prod"))
        .await
        .unwrap();
    let err = h.engine.resolve_next_version("top", 0).await.unwrap_err();
    assert!(matches!(err, SecretError::InvalidVersion(_)));
    assert!(matches!(
        h.engine.resolve_next_version("top", Version::MAX + 1).await,
        Err(SecretError::InvalidVersion(_))
    ));
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn delete_removes_every_version_and_nothing_else() {
    let h = harness();
    for n in 1..=3 {
        h.engine.put("gone", "x", Some(v(n)), &ctx("prod")).await.unwrap();
    }
    h.engine.put("kept", "y", None, &ctx("prod")).await.unwrap();

    assert_eq!(h.engine.delete("gone").await.unwrap(), 3);
    assert_eq!(h.engine.highest_version("gone").await.unwrap(), None);
    assert_eq!(h.engine.get_latest("kept", &ctx("prod")).await.unwrap().secret(), "y");
    assert_eq!(h.engine.delete("gone").await.unwrap(), 0);

    // A deleted name starts over at the first version.
    assert_eq!(h.engine.resolve_next_version("gone", 0).await.unwrap(), Version::FIRST);
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn engine_from_json_config() {
    let kms = Arc::new(InMemoryKms::with_key("alias/team-a").unwrap());
    let items = Arc::new(InMemoryItemStore::new());
    let config =
        EngineConfig::from_json(r#"{"table": "team-a-secrets", "key_alias": "alias/team-a"}"#)
            .unwrap();
    let engine = SecretEngine::new(kms, items.clone(), config).unwrap();

    engine.put("k", "v", None, &ctx("prod")).await.unwrap();
    assert_eq!(items.len("team-a-secrets"), 1);
    assert!(items.is_empty(DEFAULT_TABLE));
}

#[tokio::test]
async fn for_table_isolates_tables() {
    let h = harness();
    let other = h.engine.for_table("other");
    h.engine.put("k", "default", None, &ctx("prod")).await.unwrap();
    other.put("k", "other", None, &ctx("prod")).await.unwrap();

    assert_eq!(h.engine.get_latest("k", &ctx("prod")).await.unwrap().secret(), "default");
    assert_eq!(other.get_latest("k", &ctx("prod")).await.unwrap().secret(), "other");

    other.delete("k").await.unwrap();
    assert!(h.engine.get_latest("k", &ctx("prod")).await.is_ok());
}

// ============================================================================
// SQLite store
// ============================================================================

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn lifecycle_over_sqlite_file() {
    use credvault::SqliteItemStore;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.db");
    let kms = Arc::new(InMemoryKms::with_key(DEFAULT_KEY_ALIAS).unwrap());

    {
        let store = Arc::new(SqliteItemStore::open(&path).unwrap());
        let engine = SecretEngine::new(kms.clone(), store, EngineConfig::default()).unwrap();
        let next = engine.resolve_next_version("db-pass", 0).await.unwrap();
        engine.put("db-pass", "s3cr3t", Some(next), &ctx("prod")).await.unwrap();
        let next = engine.resolve_next_version("db-pass", 0).await.unwrap();
        engine.put("db-pass", "rotated", Some(next), &ctx("prod")).await.unwrap();
    }

    let store = Arc::new(SqliteItemStore::open(&path).unwrap());
    let engine = SecretEngine::new(kms, store, EngineConfig::default()).unwrap();
    assert_eq!(engine.get_latest("db-pass", &ctx("prod")).await.unwrap().secret(), "rotated");
    assert_eq!(engine.get("db-pass", v(1), &ctx("prod")).await.unwrap().secret(), "s3cr3t");
    assert!(matches!(
        engine.put("db-pass", "again", Some(v(2)), &ctx("prod")).await,
        Err(SecretError::AlreadyExists { .. })
    ));
    assert!(matches!(
        engine.get("db-pass", v(1), &ctx("staging")).await,
        Err(SecretError::ContextMismatch(_))
    ));

    assert_eq!(engine.delete("db-pass").await.unwrap(), 2);
    assert!(matches!(
        engine.get_latest("db-pass", &ctx("prod")).await,
        Err(SecretError::NotFound { .. })
    ));
}
