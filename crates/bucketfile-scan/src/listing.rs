//! Single-folder listing.

use std::sync::Arc;

use bucketfile_core::namespace::{is_displayable_file, is_displayable_folder};
use bucketfile_core::{
    BucketError, BucketResult, DirectoryListing, ListRequest, ListingPage, ObjectEntry,
    ObjectStore, SessionConfig, StoreResult,
};

/// Split one delimited page into displayable files and direct child folders.
///
/// Folder markers, the current folder itself, and anything deeper than one
/// level are dropped.
pub fn partition_page(page: &ListingPage, prefix: &str) -> (Vec<ObjectEntry>, Vec<String>) {
    let objects = page
        .entries
        .iter()
        .filter(|entry| entry.key.starts_with(prefix) && is_displayable_file(&entry.key))
        .cloned()
        .collect();

    let prefixes = page
        .common_prefixes
        .iter()
        .filter(|p| is_displayable_folder(p, prefix))
        .cloned()
        .collect();

    (objects, prefixes)
}

/// Lists one virtual folder at a time and holds the last result.
pub struct ListingCursor {
    store: Arc<dyn ObjectStore>,
    max_keys: usize,
    auto_paginate: bool,
    current: DirectoryListing,
}

impl ListingCursor {
    /// Create a cursor that fetches at most `max_keys` entries per call.
    pub fn new(store: Arc<dyn ObjectStore>, max_keys: usize) -> Self {
        Self {
            store,
            max_keys: max_keys.max(1),
            auto_paginate: false,
            current: DirectoryListing::default(),
        }
    }

    /// Create a cursor from session settings.
    pub fn from_config(store: Arc<dyn ObjectStore>, config: &SessionConfig) -> Self {
        Self::new(store, config.max_keys).with_auto_paginate(config.auto_paginate_listing)
    }

    /// Follow continuation tokens instead of stopping at the first page.
    pub fn with_auto_paginate(mut self, auto_paginate: bool) -> Self {
        self.auto_paginate = auto_paginate;
        self
    }

    /// The most recent listing (empty after a failure).
    pub fn current(&self) -> &DirectoryListing {
        &self.current
    }

    /// List the folder `prefix` in `bucket`.
    ///
    /// On failure the held listing is reset to empty before the error is
    /// returned. Nothing is retried.
    pub async fn list(&mut self, bucket: &str, prefix: &str) -> BucketResult<&DirectoryListing> {
        match self.fetch(bucket, prefix).await {
            Ok(listing) => {
                tracing::debug!(
                    bucket,
                    prefix,
                    files = listing.objects.len(),
                    folders = listing.prefixes.len(),
                    truncated = listing.truncated,
                    "listed folder"
                );
                self.current = listing;
                Ok(&self.current)
            }
            Err(source) => {
                self.current = DirectoryListing::empty(prefix);
                Err(BucketError::ListingFailed {
                    bucket: bucket.to_string(),
                    prefix: prefix.to_string(),
                    source,
                })
            }
        }
    }

    async fn fetch(&self, bucket: &str, prefix: &str) -> StoreResult<DirectoryListing> {
        let mut listing = DirectoryListing::empty(prefix);
        let mut token = None;

        loop {
            let request = ListRequest::delimited(prefix, self.max_keys).with_token(token.take());
            let page = self.store.list_objects(bucket, &request).await?;

            let (objects, prefixes) = partition_page(&page, prefix);
            listing.objects.extend(objects);
            listing.prefixes.extend(prefixes);

            if !page.is_truncated {
                listing.truncated = false;
                break;
            }
            listing.truncated = true;

            match page.next_continuation_token {
                Some(next) if self.auto_paginate => token = Some(next),
                _ => break,
            }
        }

        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_drops_markers_and_self() {
        let page = ListingPage {
            entries: vec![
                ObjectEntry::new("docs/", 0),
                ObjectEntry::new("docs/a.txt", 10),
                ObjectEntry::new("docs/ ", 1),
            ],
            common_prefixes: vec!["docs/".into(), "docs/old/".into(), "docs//".into()],
            ..Default::default()
        };

        let (objects, prefixes) = partition_page(&page, "docs/");
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].key, "docs/a.txt");
        assert_eq!(prefixes, vec!["docs/old/"]);
    }

    #[test]
    fn test_partition_at_root() {
        let page = ListingPage {
            entries: vec![ObjectEntry::new("readme.md", 5)],
            common_prefixes: vec!["a/".into(), "b/".into()],
            ..Default::default()
        };

        let (objects, prefixes) = partition_page(&page, "");
        assert_eq!(objects.len(), 1);
        assert_eq!(prefixes, vec!["a/", "b/"]);
    }
}
