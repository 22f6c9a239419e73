use std::fs;

use bytes::Bytes;

use bucketfile_core::{ListRequest, ObjectStore};
use bucketfile_store::{LocalStore, MemoryStore, StoreOp};

fn local_bucket() -> (tempfile::TempDir, LocalStore) {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("bucket")).unwrap();
    let store = LocalStore::new(dir.path());
    (dir, store)
}

#[tokio::test]
async fn test_local_put_creates_nested_directories() {
    let (dir, store) = local_bucket();

    store
        .put_object("bucket", "docs/2024/report.txt", Bytes::from_static(b"report"))
        .await
        .unwrap();

    let on_disk = fs::read(dir.path().join("bucket/docs/2024/report.txt")).unwrap();
    assert_eq!(on_disk, b"report");
}

#[tokio::test]
async fn test_local_delimited_listing() {
    let (_dir, store) = local_bucket();
    store.put_object("bucket", "a.txt", Bytes::from_static(b"aa")).await.unwrap();
    store.put_object("bucket", "docs/", Bytes::new()).await.unwrap();
    store.put_object("bucket", "docs/x.txt", Bytes::from_static(b"x")).await.unwrap();
    store.put_object("bucket", "empty/", Bytes::new()).await.unwrap();

    let root = store
        .list_objects("bucket", &ListRequest::delimited("", 100))
        .await
        .unwrap();
    let keys: Vec<_> = root.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["a.txt"]);
    assert_eq!(root.common_prefixes, vec!["docs/", "empty/"]);
    assert_eq!(root.entries[0].size, 2);
    assert!(root.entries[0].last_modified.is_some());

    let docs = store
        .list_objects("bucket", &ListRequest::delimited("docs/", 100))
        .await
        .unwrap();
    let keys: Vec<_> = docs.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["docs/", "docs/x.txt"]);
}

#[tokio::test]
async fn test_local_delimited_listing_stops_at_children() {
    let (_dir, store) = local_bucket();
    store.put_object("bucket", "deep/a/b/c.txt", Bytes::from_static(b"abc")).await.unwrap();
    store.put_object("bucket", "deep/top.txt", Bytes::from_static(b"t")).await.unwrap();

    let root = store
        .list_objects("bucket", &ListRequest::delimited("", 100))
        .await
        .unwrap();
    assert!(root.entries.is_empty());
    assert_eq!(root.common_prefixes, vec!["deep/"]);

    let deep = store
        .list_objects("bucket", &ListRequest::delimited("deep/", 100))
        .await
        .unwrap();
    let keys: Vec<_> = deep.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["deep/", "deep/top.txt"]);
    assert_eq!(deep.common_prefixes, vec!["deep/a/"]);

    let all = store
        .list_objects("bucket", &ListRequest::recursive("deep/", 100))
        .await
        .unwrap();
    let keys: Vec<_> = all.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["deep/", "deep/a/", "deep/a/b/", "deep/a/b/c.txt", "deep/top.txt"]);
}

#[tokio::test]
async fn test_local_delete_marker_after_content() {
    let (dir, store) = local_bucket();
    store.put_object("bucket", "docs/x.txt", Bytes::from_static(b"x")).await.unwrap();

    // Non-empty marker delete is accepted but leaves content in place
    store.delete_object("bucket", "docs/").await.unwrap();
    assert!(dir.path().join("bucket/docs/x.txt").exists());

    store.delete_object("bucket", "docs/x.txt").await.unwrap();
    store.delete_object("bucket", "docs/").await.unwrap();
    assert!(!dir.path().join("bucket/docs").exists());

    // Absent keys delete cleanly
    store.delete_object("bucket", "docs/x.txt").await.unwrap();
}

#[tokio::test]
async fn test_local_get_missing_is_not_found() {
    let (_dir, store) = local_bucket();
    let err = store.get_object("bucket", "nothing.bin").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_local_multipart_upload() {
    let (dir, store) = local_bucket();
    let id = store.create_multipart_upload("bucket", "big.bin").await.unwrap();
    let first = store
        .upload_part("bucket", "big.bin", &id, 1, Bytes::from_static(b"abc"))
        .await
        .unwrap();
    let second = store
        .upload_part("bucket", "big.bin", &id, 2, Bytes::from_static(b"def"))
        .await
        .unwrap();
    store
        .complete_multipart_upload("bucket", "big.bin", &id, vec![first, second])
        .await
        .unwrap();

    assert_eq!(fs::read(dir.path().join("bucket/big.bin")).unwrap(), b"abcdef");
}

#[tokio::test]
async fn test_memory_recursive_listing_pages() {
    let store = MemoryStore::with_bucket("b").with_page_size(2);
    for key in ["a", "b", "c", "d", "e"] {
        store.insert("b", key, "x");
    }

    let mut token = None;
    let mut pages = 0;
    loop {
        let page = store
            .list_objects("b", &ListRequest::recursive("", 1000).with_token(token))
            .await
            .unwrap();
        pages += 1;
        if !page.is_truncated {
            break;
        }
        token = page.next_continuation_token;
    }

    assert_eq!(pages, 3);
    assert_eq!(store.count(StoreOp::List), 3);
}
