//! ListObjectsV2 paging over a sorted key set.

use bucketfile_core::{ListRequest, ListingPage, ObjectEntry};

const KEY_TOKEN: &str = "k:";
const PREFIX_TOKEN: &str = "p:";

enum Item<'a> {
    Entry(&'a ObjectEntry),
    Prefix(String),
}

/// Produce one page of results for `request`.
///
/// `sorted` must yield entries in ascending key order. With a delimiter,
/// keys whose remainder after the prefix contains it roll up into a single
/// common prefix. Entries and common prefixes both count toward `max_keys`.
pub fn paginate<'a, I>(sorted: I, request: &ListRequest) -> ListingPage
where
    I: IntoIterator<Item = &'a ObjectEntry>,
{
    let max_keys = request.max_keys.max(1);
    let resume = request.continuation_token.as_deref().map(Resume::parse);

    let mut page = ListingPage::default();
    let mut returned = 0usize;
    let mut last_token = None;

    for entry in sorted {
        let Some(rest) = entry.key.strip_prefix(request.prefix.as_str()) else {
            continue;
        };
        if resume.as_ref().is_some_and(|r| r.skips(&entry.key)) {
            continue;
        }

        let item = match request.delimiter.and_then(|d| rest.find(d).map(|idx| (d, idx))) {
            Some((d, idx)) => {
                let mut prefix = String::with_capacity(request.prefix.len() + idx + 1);
                prefix.push_str(&request.prefix);
                prefix.push_str(&rest[..idx]);
                prefix.push(d);
                Item::Prefix(prefix)
            }
            None => Item::Entry(entry),
        };

        if let Item::Prefix(ref prefix) = item {
            if page.common_prefixes.last() == Some(prefix) {
                continue;
            }
        }

        if returned == max_keys {
            page.is_truncated = true;
            break;
        }
        returned += 1;

        match item {
            Item::Entry(entry) => {
                last_token = Some(format!("{KEY_TOKEN}{}", entry.key));
                page.entries.push(entry.clone());
            }
            Item::Prefix(prefix) => {
                last_token = Some(format!("{PREFIX_TOKEN}{prefix}"));
                page.common_prefixes.push(prefix);
            }
        }
    }

    if page.is_truncated {
        page.next_continuation_token = last_token;
    }
    page
}

enum Resume<'a> {
    AfterKey(&'a str),
    AfterPrefix(&'a str),
}

impl<'a> Resume<'a> {
    fn parse(token: &'a str) -> Self {
        if let Some(prefix) = token.strip_prefix(PREFIX_TOKEN) {
            Self::AfterPrefix(prefix)
        } else {
            Self::AfterKey(token.strip_prefix(KEY_TOKEN).unwrap_or(token))
        }
    }

    fn skips(&self, key: &str) -> bool {
        match self {
            Self::AfterKey(last) => key <= *last,
            Self::AfterPrefix(prefix) => key <= *prefix || key.starts_with(prefix),
        }
    }
}
