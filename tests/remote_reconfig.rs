//! Remote reconfiguration: batches are applied whole or not at all.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sgxlkl_config::config::{RemoteConfigListener, RemoteUpdate, ValidationError};
use sgxlkl_config::{ConfigError, OptionKey};

mod common;

const KEY_A: &str = "00112233445566778899aabbccddeeff";

#[tokio::test]
async fn test_non_updatable_key_leaves_store_unchanged() {
    let handle = common::handle_from("remote_config = true\nsthreads = 2");
    let before = handle.snapshot();

    let err = handle
        .apply_remote("cwd = \"/srv\"\nsthreads = 16")
        .unwrap_err();
    assert_eq!(
        err.violations(),
        &[ValidationError::NotUpdatable {
            key: "sthreads".into()
        }]
    );

    let after = handle.snapshot();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.get_str(OptionKey::Cwd), Some("/"));
    assert_eq!(after.get_u64(OptionKey::Sthreads), 2);
}

#[tokio::test]
async fn test_remote_channel_disabled() {
    let handle = common::handle_from("");
    let (listener, tx) = RemoteConfigListener::new(Arc::clone(&handle));
    tokio::spawn(listener.run());

    let (update, outcome) = RemoteUpdate::new("cwd = \"/srv\"");
    tx.send(update).unwrap();
    let err = outcome.await.unwrap().unwrap_err();

    assert!(matches!(err, ConfigError::RemoteConfigDisabled));
    assert_eq!(handle.snapshot().get_str(OptionKey::Cwd), Some("/"));
}

#[tokio::test]
async fn test_updated_keys_become_explicit() {
    let handle = common::handle_from("remote_config = true\nsthreads = 2");

    let store = handle
        .apply_remote(&format!(
            "hd_key = \"{}\"\nhds = \"/data.img:/data\"",
            KEY_A
        ))
        .unwrap();

    assert!(store.is_explicitly_set(OptionKey::HdKey));
    assert_eq!(store.disks().len(), 1);
    // Keys outside the batch keep their value and provenance.
    assert!(store.is_explicitly_set(OptionKey::Sthreads));
    assert_eq!(store.get_u64(OptionKey::Sthreads), 2);
    assert!(!store.is_explicitly_set(OptionKey::Cwd));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_observe_partial_batch() {
    let handle = common::handle_from("remote_config = true");
    let stop = Arc::new(AtomicBool::new(false));

    let mut readers = Vec::new();
    for _ in 0..4 {
        let handle = Arc::clone(&handle);
        let stop = Arc::clone(&stop);
        readers.push(tokio::spawn(async move {
            let mut observed = 0u64;
            loop {
                let store = handle.snapshot();
                let cwd = store.get_str(OptionKey::Cwd);
                let key = store.get_str(OptionKey::HdKey);
                match (cwd, key) {
                    (Some("/"), None) | (Some("/srv"), Some(KEY_A)) => {}
                    other => panic!("inconsistent snapshot: {:?}", other),
                }
                observed += 1;
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                tokio::task::yield_now().await;
            }
            observed
        }));
    }

    let (listener, tx) = RemoteConfigListener::new(Arc::clone(&handle));
    let listener = tokio::spawn(listener.run());

    // Rejected batches must not leak their valid half.
    for _ in 0..50 {
        let (update, outcome) = RemoteUpdate::new("cwd = \"/tmp\"\nhostnet = true");
        tx.send(update).unwrap();
        assert!(outcome.await.unwrap().is_err());
    }

    let (update, outcome) = RemoteUpdate::new(format!("cwd = \"/srv\"\nhd_key = \"{}\"", KEY_A));
    tx.send(update).unwrap();
    outcome.await.unwrap().unwrap();

    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        assert!(reader.await.unwrap() > 0);
    }

    drop(tx);
    listener.await.unwrap();

    let store = handle.snapshot();
    assert_eq!(store.get_str(OptionKey::Cwd), Some("/srv"));
    assert_eq!(store.get_str(OptionKey::HdKey), Some(KEY_A));
}
