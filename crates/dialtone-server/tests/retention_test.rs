use dialtone_media::{MediaConfig, MediaStore};
use dialtone_server::retention::start_retention_task;
use std::time::Duration;
use tokio::time::sleep;

fn store(dir: &std::path::Path, retention_seconds: u64) -> MediaStore {
    MediaStore::new(&MediaConfig {
        storage_dir: dir.to_path_buf(),
        public_base_url: "https://ivr.test".to_string(),
        retention_seconds,
        ..MediaConfig::default()
    })
}

#[tokio::test]
async fn test_retention_task_deletes_expired_media() {
    let dir = tempfile::tempdir().unwrap();
    let expired = dir.path().join("expired.mp3");
    std::fs::write(&expired, [1u8; 64]).unwrap();

    let handle = tokio::spawn(start_retention_task(
        store(dir.path(), 0),
        Duration::from_secs(3600),
    ));

    // The first sweep runs immediately.
    sleep(Duration::from_millis(500)).await;
    assert!(!expired.exists(), "expired media should be deleted");

    handle.abort();
}

#[tokio::test]
async fn test_retention_task_keeps_fresh_media() {
    let dir = tempfile::tempdir().unwrap();
    let fresh = dir.path().join("fresh.mp3");
    std::fs::write(&fresh, [1u8; 64]).unwrap();

    let handle = tokio::spawn(start_retention_task(
        store(dir.path(), 3600),
        Duration::from_millis(100),
    ));

    sleep(Duration::from_millis(500)).await;
    assert!(fresh.exists(), "fresh media should be kept");

    handle.abort();
}

#[tokio::test]
async fn test_retention_task_survives_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("not-created-yet");

    let handle = tokio::spawn(start_retention_task(
        store(&missing, 0),
        Duration::from_millis(50),
    ));

    sleep(Duration::from_millis(300)).await;
    assert!(!handle.is_finished(), "retention task should keep running");

    handle.abort();
}
