use std::fs;
use std::sync::Arc;
use std::time::Duration;

use bucketfile_core::BucketError;
use bucketfile_ops::{
    MutationCoordinator, OperationResult, OperationType, TransferController, TransferEvent,
    TransferState, UploadFile, collect_upload_files, download, download_to, start_bulk_delete,
    start_folder_delete, start_upload,
};
use bucketfile_store::{MemoryStore, StoreOp};

fn files(names: &[&str]) -> Vec<UploadFile> {
    names
        .iter()
        .map(|name| UploadFile::from_bytes(*name, format!("contents of {name}")))
        .collect()
}

#[tokio::test]
async fn test_upload_rebases_relative_paths() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    let controller = TransferController::new(store.clone(), 1024, 4);

    let outcome = controller
        .upload("b", "in/", files(&["./trip/day1.jpg", "notes.txt"]), |_| {})
        .await
        .unwrap();

    assert!(!outcome.cancelled);
    assert_eq!(outcome.files_uploaded, 2);
    assert!(store.contains("b", "in/trip/day1.jpg"));
    assert!(store.contains("b", "in/notes.txt"));
    assert_eq!(controller.state(), TransferState::Completed);
    assert!(!controller.is_active());
}

#[tokio::test]
async fn test_second_upload_is_rejected_while_active() {
    let store = Arc::new(MemoryStore::with_bucket("b").with_latency(Duration::from_millis(200)));
    let controller = Arc::new(TransferController::new(store.clone(), 1024, 4));

    let first = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.upload("b", "", files(&["first.txt"]), |_| {}).await })
    };
    while !controller.is_active() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let second = controller
        .upload("b", "", files(&["second.txt"]), |_| {})
        .await
        .unwrap();
    assert!(second.cancelled);
    assert_eq!(second.files_uploaded, 0);

    let first = first.await.unwrap().unwrap();
    assert!(!first.cancelled);
    assert!(store.calls().iter().all(|call| call.key != "second.txt"));
    assert!(!store.contains("b", "second.txt"));
}

#[tokio::test]
async fn test_multipart_progress_is_strictly_increasing() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    let controller = TransferController::new(store.clone(), 4, 1);

    let mut reported = Vec::new();
    controller
        .upload(
            "b",
            "",
            vec![UploadFile::from_bytes("big.bin", "0123456789")],
            |pct| reported.push(pct),
        )
        .await
        .unwrap();

    assert_eq!(reported, vec![40, 80, 100]);
    assert_eq!(store.count(StoreOp::UploadPart), 3);
    assert_eq!(store.count(StoreOp::Put), 0);
    assert_eq!(store.object("b", "big.bin").unwrap(), "0123456789");
    assert_eq!(store.pending_uploads(), 0);
}

#[tokio::test]
async fn test_parallel_parts_assemble_in_order() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    let controller = TransferController::new(store.clone(), 3, 4);
    let body: String = ('a'..='z').collect();

    controller
        .upload("b", "x/", vec![UploadFile::from_bytes("abc.txt", body.clone())], |_| {})
        .await
        .unwrap();

    assert_eq!(store.object("b", "x/abc.txt").unwrap(), body.as_bytes());
    assert_eq!(store.count(StoreOp::UploadPart), 9);
}

#[tokio::test]
async fn test_cancel_after_first_file() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    let controller = Arc::new(TransferController::new(store.clone(), 1024, 4));

    let canceller = controller.clone();
    let outcome = controller
        .upload("b", "", files(&["1.txt", "2.txt", "3.txt"]), move |pct| {
            if pct >= 33 {
                canceller.cancel();
            }
        })
        .await
        .unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.files_uploaded, 1);
    assert!(store.contains("b", "1.txt"));
    assert_eq!(store.count(StoreOp::Put), 1);
    assert_eq!(controller.state(), TransferState::Cancelled);
}

#[tokio::test]
async fn test_cancel_mid_multipart_aborts_upload() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    let controller = Arc::new(TransferController::new(store.clone(), 4, 1));

    let canceller = controller.clone();
    let outcome = controller
        .upload(
            "b",
            "",
            vec![UploadFile::from_bytes("big.bin", "0123456789")],
            move |_| canceller.cancel(),
        )
        .await
        .unwrap();

    assert!(outcome.cancelled);
    assert!(!store.contains("b", "big.bin"));
    assert_eq!(store.count(StoreOp::AbortMultipart), 1);
    assert_eq!(store.pending_uploads(), 0);
}

#[tokio::test]
async fn test_failed_file_abandons_queue() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    store.fail_key(StoreOp::Put, "dst/2.txt");
    let controller = TransferController::new(store.clone(), 1024, 4);

    let err = controller
        .upload("b", "dst/", files(&["1.txt", "2.txt", "3.txt"]), |_| {})
        .await
        .unwrap_err();

    match err {
        BucketError::UploadFailed { key, .. } => assert_eq!(key, "dst/2.txt"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.contains("b", "dst/1.txt"));
    assert!(store.calls().iter().all(|call| call.key != "dst/3.txt"));
    assert_eq!(controller.state(), TransferState::Failed);
    assert!(!controller.is_active());
}

#[tokio::test]
async fn test_failed_part_aborts_multipart() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    store.fail_call(StoreOp::UploadPart, 2);
    let controller = TransferController::new(store.clone(), 4, 1);

    let result = controller
        .upload("b", "", vec![UploadFile::from_bytes("big.bin", "0123456789")], |_| {})
        .await;

    assert!(matches!(result, Err(BucketError::UploadFailed { .. })));
    assert_eq!(store.count(StoreOp::AbortMultipart), 1);
    assert_eq!(store.count(StoreOp::CompleteMultipart), 0);
    assert_eq!(store.pending_uploads(), 0);
}

#[tokio::test]
async fn test_failed_complete_aborts_multipart() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    store.fail_call(StoreOp::CompleteMultipart, 1);
    let controller = TransferController::new(store.clone(), 4, 2);

    let result = controller
        .upload("b", "", vec![UploadFile::from_bytes("big.bin", "0123456789")], |_| {})
        .await;

    assert!(matches!(result, Err(BucketError::UploadFailed { ref key, .. }) if key == "big.bin"));
    assert_eq!(store.count(StoreOp::UploadPart), 3);
    assert_eq!(store.count(StoreOp::AbortMultipart), 1);
    assert_eq!(store.pending_uploads(), 0);
    assert!(!store.contains("b", "big.bin"));
    assert_eq!(controller.state(), TransferState::Failed);
}

#[tokio::test]
async fn test_start_upload_reports_through_channel() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    let controller = Arc::new(TransferController::new(store.clone(), 1024, 4));

    let mut rx = start_upload(controller, "b".into(), "".into(), files(&["a", "b"]));
    let mut progress = Vec::new();
    let mut finished = None;
    while let Some(event) = rx.recv().await {
        match event {
            TransferEvent::Progress(pct) => progress.push(pct),
            TransferEvent::Finished(result) => finished = Some(result),
        }
    }

    assert_eq!(progress, vec![50, 100]);
    assert_eq!(finished.unwrap().unwrap().files_uploaded, 2);
}

#[test]
fn test_collect_upload_files_flattens_directories() {
    let dir = tempfile::tempdir().unwrap();
    let photos = dir.path().join("photos");
    fs::create_dir_all(photos.join("sub")).unwrap();
    fs::write(photos.join("a.jpg"), b"aaa").unwrap();
    fs::write(photos.join("sub/b.jpg"), b"bb").unwrap();
    fs::write(photos.join("scratch.tmp"), b"x").unwrap();
    let single = dir.path().join("single.txt");
    fs::write(&single, b"s").unwrap();

    let collected =
        collect_upload_files(&[photos, single], &["*.tmp".to_string()]).unwrap();
    let mut paths: Vec<_> = collected
        .iter()
        .map(|f| (f.relative_path.as_str(), f.size))
        .collect();
    paths.sort();

    assert_eq!(
        paths,
        vec![("photos/a.jpg", 3), ("photos/sub/b.jpg", 2), ("single.txt", 1)]
    );
}

#[tokio::test]
async fn test_bulk_delete_attempts_every_item() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    for key in ["a", "b", "c"] {
        store.insert("b", key, "x");
    }
    store.fail_key(StoreOp::Delete, "b");
    let coordinator = MutationCoordinator::new(store.clone(), 1000, 2);

    let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let err = coordinator.delete_bulk("b", &keys).await.unwrap_err();

    match err {
        BucketError::BulkDeleteFailed { failures, attempted } => {
            assert_eq!(attempted, 3);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].key, "b");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.keys("b"), vec!["b"]);
    assert_eq!(store.count(StoreOp::Delete), 3);
}

#[tokio::test]
async fn test_bulk_delete_mixed_selection() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    for key in ["readme.md", "docs/", "docs/a.txt", "docs/old/b.txt", "keep.txt"] {
        store.insert("b", key, "x");
    }
    let coordinator = MutationCoordinator::new(store.clone(), 1000, 4);

    let keys = vec![
        "readme.md".to_string(),
        "docs/".to_string(),
        "readme.md".to_string(),
    ];
    coordinator.delete_bulk("b", &keys).await.unwrap();

    assert_eq!(store.keys("b"), vec!["keep.txt"]);
}

#[tokio::test]
async fn test_folder_delete_removes_markers_last() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    for key in ["docs/", "docs/a.txt", "docs/sub/", "docs/sub/b.txt", "other.txt"] {
        store.insert("b", key, "x");
    }
    let coordinator = MutationCoordinator::new(store.clone(), 2, 4);

    let deleted = coordinator.delete_folder("b", "docs/").await.unwrap();

    assert_eq!(deleted, 4);
    assert_eq!(store.keys("b"), vec!["other.txt"]);
    let deletes: Vec<_> = store
        .calls_of(StoreOp::Delete)
        .into_iter()
        .map(|call| call.key)
        .collect();
    assert_eq!(&deletes[2..], &["docs/sub/".to_string(), "docs/".to_string()]);
}

#[tokio::test]
async fn test_empty_folder_delete_is_noop() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    store.insert("b", "elsewhere.txt", "x");
    let coordinator = MutationCoordinator::new(store.clone(), 1000, 4);

    assert_eq!(coordinator.delete_folder("b", "ghost/").await.unwrap(), 0);
    assert_eq!(store.count(StoreOp::Delete), 0);
}

#[tokio::test]
async fn test_folder_delete_reports_partial_failure() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    for key in ["docs/a.txt", "docs/b.txt", "docs/c.txt"] {
        store.insert("b", key, "x");
    }
    store.fail_key(StoreOp::Delete, "docs/b.txt");
    let coordinator = MutationCoordinator::new(store.clone(), 1000, 4);

    let err = coordinator.delete_folder("b", "docs/").await.unwrap_err();
    assert!(matches!(
        err,
        BucketError::FolderDeleteFailed { failed: 1, attempted: 3, .. }
    ));
    assert_eq!(store.keys("b"), vec!["docs/b.txt"]);
}

#[tokio::test]
async fn test_delete_missing_key_succeeds() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    let coordinator = MutationCoordinator::new(store, 1000, 4);
    coordinator.delete_one("b", "never-existed").await.unwrap();
}

#[tokio::test]
async fn test_create_folder() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    let coordinator = MutationCoordinator::new(store.clone(), 1000, 4);

    let key = coordinator.create_folder("b", "projects/", "2024").await.unwrap();
    assert_eq!(key, "projects/2024/");
    assert_eq!(store.object("b", "projects/2024/").unwrap().len(), 0);

    let err = coordinator.create_folder("b", "", "a/b").await.unwrap_err();
    assert!(matches!(err, BucketError::InvalidName { .. }));
    assert_eq!(store.count(StoreOp::Put), 1);

    store.fail_key(StoreOp::Put, "broken/");
    let err = coordinator.create_folder("b", "", "broken").await.unwrap_err();
    assert!(matches!(err, BucketError::CreateFolderFailed { .. }));
}

#[tokio::test]
async fn test_start_bulk_delete_summary() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    for key in ["a", "b", "c"] {
        store.insert("b", key, "x");
    }
    store.fail_key(StoreOp::Delete, "c");
    let coordinator = Arc::new(MutationCoordinator::new(store, 1000, 4));

    let mut rx = start_bulk_delete(
        coordinator,
        "b".into(),
        vec!["a".into(), "b".into(), "c".into()],
    );
    let mut updates = 0;
    let mut complete = None;
    while let Some(result) = rx.recv().await {
        match result {
            OperationResult::Progress(_) => updates += 1,
            OperationResult::Complete(c) => complete = Some(c),
        }
    }

    let complete = complete.unwrap();
    assert_eq!(complete.succeeded, 2);
    assert_eq!(complete.failed, 1);
    assert_eq!(complete.summary(), "Deleted 2 items, 1 failed");
    assert_eq!(updates, 4);
}

#[tokio::test]
async fn test_start_folder_delete_reports_each_object() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    for key in ["docs/", "docs/a.txt", "docs/sub/", "docs/sub/b.txt"] {
        store.insert("b", key, "x");
    }
    let coordinator = Arc::new(MutationCoordinator::new(store.clone(), 1000, 4));

    let mut rx = start_folder_delete(coordinator, "b".into(), "docs/".into());
    let mut seen = Vec::new();
    let mut complete = None;
    while let Some(result) = rx.recv().await {
        match result {
            OperationResult::Progress(p) => {
                assert_eq!(p.operation_type, OperationType::DeleteFolder);
                assert_eq!(p.items_total, 4);
                seen.push(p.items_completed);
            }
            OperationResult::Complete(c) => complete = Some(c),
        }
    }

    assert_eq!(seen, vec![1, 2, 3, 4]);
    let complete = complete.unwrap();
    assert_eq!(complete.operation_type, OperationType::DeleteFolder);
    assert!(complete.is_success());
    assert_eq!(complete.summary(), "Deleted 4 objects");
    assert!(store.keys("b").is_empty());
}

#[tokio::test]
async fn test_start_folder_delete_collects_failures() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    for key in ["docs/a.txt", "docs/b.txt", "docs/c.txt"] {
        store.insert("b", key, "x");
    }
    store.fail_key(StoreOp::Delete, "docs/b.txt");
    let coordinator = Arc::new(MutationCoordinator::new(store.clone(), 1000, 4));

    let mut rx = start_folder_delete(coordinator, "b".into(), "docs/".into());
    let mut last_progress = None;
    let mut complete = None;
    while let Some(result) = rx.recv().await {
        match result {
            OperationResult::Progress(p) => last_progress = Some(p),
            OperationResult::Complete(c) => complete = Some(c),
        }
    }

    let last_progress = last_progress.unwrap();
    assert!(last_progress.has_errors());
    assert_eq!(last_progress.percentage(), 100.0);

    let complete = complete.unwrap();
    assert_eq!(complete.succeeded, 2);
    assert_eq!(complete.failed, 1);
    assert_eq!(complete.errors[0].key, "docs/b.txt");
    assert_eq!(complete.summary(), "Deleted 2 objects, 1 failed");
}

#[tokio::test]
async fn test_start_folder_delete_of_empty_folder() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    let coordinator = Arc::new(MutationCoordinator::new(store.clone(), 1000, 4));

    let mut rx = start_folder_delete(coordinator, "b".into(), "ghost/".into());
    match rx.recv().await {
        Some(OperationResult::Complete(c)) => {
            assert!(c.is_success());
            assert_eq!(c.succeeded, 0);
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert!(rx.recv().await.is_none());
    assert_eq!(store.count(StoreOp::Delete), 0);
}

#[tokio::test]
async fn test_download_to_directory() {
    let store = Arc::new(MemoryStore::with_bucket("b"));
    store.insert("b", "docs/report.pdf", "pdf-bytes");
    let dir = tempfile::tempdir().unwrap();

    let body = download(store.as_ref(), "b", "docs/report.pdf").await.unwrap();
    assert_eq!(body, "pdf-bytes");

    let path = download_to(store.as_ref(), "b", "docs/report.pdf", dir.path())
        .await
        .unwrap();
    assert_eq!(path, dir.path().join("report.pdf"));
    assert_eq!(fs::read(&path).unwrap(), b"pdf-bytes");

    let err = download(store.as_ref(), "b", "missing").await.unwrap_err();
    assert!(matches!(err, BucketError::DownloadFailed { .. }));
}
