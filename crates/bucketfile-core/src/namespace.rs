//! Virtual folder view over flat object keys.
//!
//! An object store has no directories. Folders are derived from keys that
//! share a prefix ending in [`DELIMITER`], and a zero-byte object whose key
//! ends in the delimiter marks a folder that has no content yet.
//!
//! Every function here is total: any string input produces an answer.

use crate::DELIMITER;

/// Label shown for a file whose leaf segment is empty.
pub const UNNAMED_FILE: &str = "Unnamed File";

/// Label shown for a folder whose name is empty.
pub const UNNAMED_FOLDER: &str = "Unnamed Folder";

/// Maximum length of a single folder name in bytes.
pub const MAX_NAME_LEN: usize = 255;

fn strip_current<'a>(key: &'a str, current_prefix: &str) -> &'a str {
    key.strip_prefix(current_prefix).unwrap_or(key)
}

/// Name of a child folder relative to the current prefix, without the
/// trailing delimiter.
pub fn child_folder_name<'a>(prefix: &'a str, current_prefix: &str) -> &'a str {
    let rest = strip_current(prefix, current_prefix);
    rest.strip_suffix(DELIMITER).unwrap_or(rest)
}

/// Display label for a child folder, falling back to [`UNNAMED_FOLDER`].
pub fn folder_label<'a>(prefix: &'a str, current_prefix: &str) -> &'a str {
    let name = child_folder_name(prefix, current_prefix);
    if name.trim().is_empty() {
        UNNAMED_FOLDER
    } else {
        name
    }
}

/// Leaf segment of a key, falling back to [`UNNAMED_FILE`].
pub fn leaf_name<'a>(key: &'a str, current_prefix: &str) -> &'a str {
    let rest = strip_current(key, current_prefix);
    match rest.rsplit(DELIMITER).next() {
        Some(leaf) if !leaf.is_empty() => leaf,
        _ => UNNAMED_FILE,
    }
}

/// Whether `prefix` is a direct child folder of `current_prefix`.
///
/// Deeper descendants and the current folder itself are not displayable.
pub fn is_displayable_folder(prefix: &str, current_prefix: &str) -> bool {
    let Some(rest) = prefix.strip_prefix(current_prefix) else {
        return false;
    };
    let name = rest.strip_suffix(DELIMITER).unwrap_or(rest);
    !name.trim().is_empty() && !name.contains(DELIMITER)
}

/// Whether `key` names displayable file content (not a folder marker).
pub fn is_displayable_file(key: &str) -> bool {
    if key.is_empty() || is_folder_marker(key) {
        return false;
    }
    key.rsplit(DELIMITER)
        .next()
        .is_some_and(|leaf| !leaf.trim().is_empty())
}

/// Whether `key` is a folder marker (ends in the delimiter).
pub fn is_folder_marker(key: &str) -> bool {
    key.ends_with(DELIMITER)
}

/// Prefix of the folder containing `current_prefix`; `""` at the root.
///
/// Repeated application always reaches `""`, and `parent_prefix("")` is `""`.
pub fn parent_prefix(current_prefix: &str) -> String {
    let trimmed = current_prefix
        .strip_suffix(DELIMITER)
        .unwrap_or(current_prefix);
    match trimmed.rfind(DELIMITER) {
        Some(idx) => {
            let mut parent = String::with_capacity(idx + 1);
            parent.push_str(&trimmed[..idx]);
            parent.push(DELIMITER);
            parent
        }
        None => String::new(),
    }
}

/// Key of the marker object for folder `name` inside `current_prefix`.
pub fn folder_key(current_prefix: &str, name: &str) -> String {
    format!("{current_prefix}{name}{DELIMITER}")
}

/// Destination key for an uploaded file.
///
/// Relative paths from directory drops may start with `./` or `/`; those
/// markers are stripped before the path is rebased under `destination_prefix`.
pub fn destination_key(destination_prefix: &str, relative_path: &str) -> String {
    let mut path = relative_path;
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix(DELIMITER) {
            path = rest;
        } else {
            break;
        }
    }
    format!("{destination_prefix}{path}")
}

/// Validate a name for a new folder.
pub fn validate_folder_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name cannot be empty".into());
    }

    if name.len() > MAX_NAME_LEN {
        return Err(format!("Name is too long (max {MAX_NAME_LEN} characters)"));
    }

    for c in [DELIMITER, '\0'] {
        if name.contains(c) {
            return Err(format!("Name cannot contain '{}'", c.escape_default()));
        }
    }

    Ok(())
}
