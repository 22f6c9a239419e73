//! Sorting, searching, and row building for a folder view.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use bucketfile_core::namespace::{folder_label, leaf_name};
use bucketfile_core::{DirectoryListing, ObjectEntry};

/// Column files are sorted by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Key,
    Size,
    #[strum(serialize = "modified")]
    #[serde(rename = "modified")]
    LastModified,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[strum(to_string = "↑")]
    Ascending,
    #[strum(to_string = "↓")]
    Descending,
}

impl SortDirection {
    /// The opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// A sort column and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortOrder {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Sort by `key`, flipping direction when it is already the sort key.
    pub fn toggle(self, key: SortKey) -> Self {
        if self.key == key {
            Self::new(key, self.direction.reverse())
        } else {
            Self::new(key, SortDirection::Ascending)
        }
    }
}

/// Compare two optional values; absent values sort last in either direction.
fn compare_present<T: Ord>(a: Option<T>, b: Option<T>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match direction {
            SortDirection::Ascending => a.cmp(&b),
            SortDirection::Descending => b.cmp(&a),
        },
    }
}

/// Sort file entries in place. The sort is stable.
pub fn sort_objects(objects: &mut [ObjectEntry], order: SortOrder) {
    objects.sort_by(|a, b| match order.key {
        SortKey::Key => compare_present(Some(&a.key), Some(&b.key), order.direction),
        SortKey::Size => compare_present(Some(a.size), Some(b.size), order.direction),
        SortKey::LastModified => {
            compare_present(a.last_modified, b.last_modified, order.direction)
        }
    });
}

/// Case-insensitive substring match. A blank term matches everything.
pub fn matches_search(name: &str, term: &str) -> bool {
    let term = term.trim();
    term.is_empty() || name.to_lowercase().contains(&term.to_lowercase())
}

/// Human-readable size, e.g. `1.50 KiB`.
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// What a row shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Folder,
    File,
}

/// One displayed row of a folder view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRow {
    pub kind: RowKind,
    /// Object key, or folder prefix.
    pub key: String,
    /// Display name relative to the current folder.
    pub name: CompactString,
    /// Size in bytes (files only).
    pub size: Option<u64>,
    /// Last modification time (files only).
    pub last_modified: Option<DateTime<Utc>>,
}

impl DirectoryRow {
    /// Size column text; empty for folders.
    pub fn size_label(&self) -> String {
        self.size.map(format_size).unwrap_or_default()
    }

    /// Modified column text; empty when unknown.
    pub fn modified_label(&self) -> String {
        self.last_modified
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default()
    }
}

/// Build view rows: folders first in listing order, then files sorted by
/// `order`. Rows whose display name does not match `search` are dropped.
pub fn directory_rows(listing: &DirectoryListing, order: SortOrder, search: &str) -> Vec<DirectoryRow> {
    let prefix = listing.prefix.as_str();

    let folders = listing
        .prefixes
        .iter()
        .map(|p| DirectoryRow {
            kind: RowKind::Folder,
            key: p.clone(),
            name: CompactString::new(folder_label(p, prefix)),
            size: None,
            last_modified: None,
        })
        .filter(|row| matches_search(&row.name, search));

    let mut files = listing.objects.clone();
    sort_objects(&mut files, order);
    let files = files
        .into_iter()
        .map(|o| DirectoryRow {
            kind: RowKind::File,
            name: CompactString::new(leaf_name(&o.key, prefix)),
            key: o.key,
            size: Some(o.size),
            last_modified: o.last_modified,
        })
        .filter(|row| matches_search(&row.name, search));

    folders.chain(files).collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn entry(key: &str, size: u64, day: Option<u32>) -> ObjectEntry {
        let entry = ObjectEntry::new(key, size);
        match day {
            Some(d) => entry.with_last_modified(Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()),
            None => entry,
        }
    }

    fn keys(objects: &[ObjectEntry]) -> Vec<&str> {
        objects.iter().map(|o| o.key.as_str()).collect()
    }

    #[test]
    fn test_sort_by_size() {
        let mut objects = vec![entry("a", 30, None), entry("b", 10, None), entry("c", 20, None)];
        sort_objects(&mut objects, SortOrder::new(SortKey::Size, SortDirection::Ascending));
        assert_eq!(keys(&objects), vec!["b", "c", "a"]);

        sort_objects(&mut objects, SortOrder::new(SortKey::Size, SortDirection::Descending));
        assert_eq!(keys(&objects), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_missing_dates_sort_last() {
        let mut objects = vec![entry("none", 1, None), entry("late", 1, Some(9)), entry("early", 1, Some(2))];

        sort_objects(&mut objects, SortOrder::new(SortKey::LastModified, SortDirection::Ascending));
        assert_eq!(keys(&objects), vec!["early", "late", "none"]);

        sort_objects(&mut objects, SortOrder::new(SortKey::LastModified, SortDirection::Descending));
        assert_eq!(keys(&objects), vec!["late", "early", "none"]);
    }

    #[test]
    fn test_sort_toggle() {
        let order = SortOrder::default().toggle(SortKey::Key);
        assert_eq!(order.direction, SortDirection::Descending);
        let order = order.toggle(SortKey::Size);
        assert_eq!(order, SortOrder::new(SortKey::Size, SortDirection::Ascending));
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!("modified".parse::<SortKey>().unwrap(), SortKey::LastModified);
        assert_eq!(SortKey::Size.to_string(), "size");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        assert!(matches_search("Report.PDF", "report"));
        assert!(matches_search("anything", "   "));
        assert!(!matches_search("photo.png", "doc"));
    }

    #[test]
    fn test_rows_folders_first_and_filtered() {
        let listing = DirectoryListing {
            prefix: "docs/".into(),
            objects: vec![entry("docs/b.txt", 2048, None), entry("docs/a.md", 5, None)],
            prefixes: vec!["docs/archive/".into(), "docs/tax/".into()],
            truncated: false,
        };

        let rows = directory_rows(&listing, SortOrder::default(), "");
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["archive", "tax", "a.md", "b.txt"]);
        assert_eq!(rows[0].kind, RowKind::Folder);
        assert_eq!(rows[0].size_label(), "");
        assert_eq!(rows[3].size_label(), "2 KiB");

        let rows = directory_rows(&listing, SortOrder::default(), "TA");
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["tax"]);
    }
}
