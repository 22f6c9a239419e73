//! Upload sources.
//!
//! Dropped directories are flattened into individual files whose relative
//! path starts with the directory's own name, so `photos/` dropped into
//! `trips/` lands at `trips/photos/...`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use globset::{Glob, GlobSet, GlobSetBuilder};
use jwalk::WalkDir;
use thiserror::Error;

use bucketfile_core::{DELIMITER, StoreError, StoreResult};

/// Failures while gathering local files for upload.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A path could not be read.
    #[error("Cannot read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed.
    #[error("Failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },

    /// An exclude pattern did not parse.
    #[error("Invalid exclude pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Where an upload's bytes come from.
#[derive(Debug, Clone)]
pub enum UploadBody {
    /// Bytes already in memory.
    Memory(Bytes),
    /// A local file read in part-sized ranges.
    File(PathBuf),
}

impl UploadBody {
    /// Read `len` bytes starting at `offset`.
    pub(crate) async fn read_range(&self, offset: u64, len: u64) -> StoreResult<Bytes> {
        match self {
            Self::Memory(bytes) => {
                let start = usize::try_from(offset).unwrap_or(usize::MAX).min(bytes.len());
                let end = start
                    .saturating_add(usize::try_from(len).unwrap_or(usize::MAX))
                    .min(bytes.len());
                Ok(bytes.slice(start..end))
            }
            Self::File(path) => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || read_file_range(&path, offset, len))
                    .await
                    .map_err(|e| StoreError::transport(format!("Task failed: {e}")))?
            }
        }
    }
}

fn read_file_range(path: &Path, offset: u64, len: u64) -> StoreResult<Bytes> {
    let mut file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| StoreError::io(path, e))?;
    let mut buf = vec![0u8; len as usize];
    file.read_exact(&mut buf)
        .map_err(|e| StoreError::io(path, e))?;
    Ok(Bytes::from(buf))
}

/// One file of an upload job.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Path relative to the destination folder, using `/` separators.
    pub relative_path: String,
    /// Source of the file's bytes.
    pub body: UploadBody,
    /// Size in bytes.
    pub size: u64,
}

impl UploadFile {
    /// A file held in memory.
    pub fn from_bytes(relative_path: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            relative_path: relative_path.into(),
            size: bytes.len() as u64,
            body: UploadBody::Memory(bytes),
        }
    }

    /// A file on disk of known size.
    pub fn from_path(relative_path: impl Into<String>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            relative_path: relative_path.into(),
            body: UploadBody::File(path.into()),
            size,
        }
    }
}

fn build_excludes(patterns: &[String]) -> Result<GlobSet, SourceError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| SourceError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| SourceError::InvalidPattern {
        pattern: patterns.join(", "),
        source,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Flatten local files and directories into an upload job.
///
/// Directories are walked recursively; only regular files are collected.
/// Relative paths matching any `excludes` glob are skipped.
pub fn collect_upload_files(
    paths: &[PathBuf],
    excludes: &[String],
) -> Result<Vec<UploadFile>, SourceError> {
    let excludes = build_excludes(excludes)?;
    let mut files = Vec::new();

    for path in paths {
        let metadata = std::fs::metadata(path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        let base = display_name(path);

        if metadata.is_file() {
            if !excludes.is_match(&base) {
                files.push(UploadFile::from_path(base, path, metadata.len()));
            }
            continue;
        }

        for entry_result in WalkDir::new(path).sort(true).skip_hidden(false) {
            let entry = entry_result.map_err(|e| SourceError::Walk {
                path: path.clone(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let entry_path = entry.path();
            let Ok(relative) = entry_path.strip_prefix(path) else {
                continue;
            };
            let mut relative_path = base.clone();
            for component in relative.components() {
                relative_path.push(DELIMITER);
                relative_path.push_str(&component.as_os_str().to_string_lossy());
            }
            if excludes.is_match(&relative_path) {
                tracing::debug!(path = %relative_path, "excluded from upload");
                continue;
            }

            let size = entry
                .metadata()
                .map_err(|e| SourceError::Walk {
                    path: entry_path.clone(),
                    message: e.to_string(),
                })?
                .len();
            files.push(UploadFile::from_path(relative_path, entry_path, size));
        }
    }

    Ok(files)
}
