//! Tests for settings persistence across store instances.

use machgate_core::ConfigStore;
use machgate_settings::{FileStore, SETTINGS_FILE};

#[test]
fn test_values_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(SETTINGS_FILE);

    {
        let store = FileStore::open(&path).unwrap();
        store.set_u32("baud_rate", 250000).unwrap();
        store.set_u32("open_retry_ms", 500).unwrap();
    }

    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.get_u32("baud_rate"), Some(250000));
    assert_eq!(store.get_u32("open_retry_ms"), Some(500));
    assert_eq!(store.get_u32("never_written"), None);
}

#[test]
fn test_overwrite_persists_latest_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(SETTINGS_FILE);

    let store = FileStore::open(&path).unwrap();
    store.set_u32("baud_rate", 9600).unwrap();
    store.set_u32("baud_rate", 19200).unwrap();
    drop(store);

    let reopened = FileStore::open(&path).unwrap();
    assert_eq!(reopened.get_u32("baud_rate"), Some(19200));
}

#[test]
fn test_corrupted_document_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(SETTINGS_FILE);
    std::fs::write(&path, b"{not json").unwrap();

    let err = FileStore::open(&path).unwrap_err();
    assert!(err.to_string().contains("not a valid settings document"));
}

#[test]
fn test_no_temp_file_left_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(SETTINGS_FILE);

    let store = FileStore::open(&path).unwrap();
    store.set_u32("baud_rate", 115200).unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .filter(|n| n != SETTINGS_FILE)
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {:?}", leftovers);
}
