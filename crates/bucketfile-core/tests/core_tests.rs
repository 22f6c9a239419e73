use bucketfile_core::namespace::{
    destination_key, folder_key, is_displayable_file, is_displayable_folder, leaf_name,
    parent_prefix,
};
use bucketfile_core::{BucketError, DirectoryListing, ObjectEntry, SelectionModel, SessionConfig};

#[test]
fn test_folder_visibility_rule() {
    let cases = [
        ("a/b/", "a/", true),
        ("a/b/c/", "a/", false),
        ("a/", "a/", false),
        ("x/", "", true),
        ("x/y/", "", false),
        ("ab/", "a", true),
        ("b/", "a/", false),
        ("a/ /", "a/", false),
    ];

    for (prefix, current, expected) in cases {
        assert_eq!(
            is_displayable_folder(prefix, current),
            expected,
            "prefix={prefix:?} current={current:?}"
        );
    }
}

#[test]
fn test_file_validity() {
    assert!(!is_displayable_file("docs/"));
    assert!(is_displayable_file("docs/report.pdf"));
    assert!(!is_displayable_file(""));
    assert!(is_displayable_file("top-level.txt"));
}

#[test]
fn test_parent_prefix_reaches_root() {
    let starts = [
        "a/b/c/d/",
        "a/b/c",
        "/leading/slash/",
        "double//slash//",
        "",
        "/",
        "no-delimiter",
    ];

    for start in starts {
        let mut prefix = start.to_string();
        let mut steps = 0;
        while !prefix.is_empty() {
            let parent = parent_prefix(&prefix);
            assert!(parent.len() < prefix.len(), "no progress from {prefix:?}");
            prefix = parent;
            steps += 1;
            assert!(steps <= start.len());
        }
        assert_eq!(parent_prefix(&prefix), "");
    }
}

#[test]
fn test_folder_key_round_trips_through_namespace() {
    let key = folder_key("projects/", "2024");
    assert_eq!(key, "projects/2024/");
    assert!(is_displayable_folder(&key, "projects/"));
    assert!(!is_displayable_file(&key));
    assert_eq!(parent_prefix(&key), "projects/");
}

#[test]
fn test_upload_destination_is_listed_under_prefix() {
    let key = destination_key("photos/", "./trip/day1.jpg");
    assert_eq!(key, "photos/trip/day1.jpg");
    assert_eq!(leaf_name(&key, "photos/"), "day1.jpg");
}

#[test]
fn test_select_all_from_listing() {
    let listing = DirectoryListing {
        prefix: "docs/".into(),
        objects: vec![ObjectEntry::new("docs/a.txt", 1), ObjectEntry::new("docs/b.txt", 2)],
        prefixes: vec!["docs/old/".into()],
        truncated: false,
    };

    let mut selection = SelectionModel::new();
    selection.enter_mode();
    selection.select_all(listing.keys());

    assert_eq!(selection.len(), 3);
    assert!(selection.is_selected("docs/old/"));
}

#[test]
fn test_config_validation_error_kind() {
    let err = SessionConfig::from_toml_str("delete_concurrency = 0").unwrap_err();
    assert!(matches!(err, BucketError::InvalidConfig { .. }));
}
