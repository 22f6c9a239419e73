//! Session configuration types.

use std::path::Path;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{BucketError, BucketResult};

/// Smallest part size S3-compatible stores accept (except the last part).
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Configuration for a bucket session.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct SessionConfig {
    /// Region passed to the store client.
    #[builder(default = "default_region()")]
    pub region: String,

    /// Page size cap for list calls.
    #[builder(default = "1000")]
    pub max_keys: usize,

    /// Follow continuation tokens when listing a folder.
    #[builder(default = "false")]
    pub auto_paginate_listing: bool,

    /// Bytes per multipart chunk.
    #[builder(default = "10 * 1024 * 1024")]
    pub part_size: u64,

    /// Chunks in flight per file.
    #[builder(default = "4")]
    pub queue_size: usize,

    /// Deletes in flight during folder and bulk deletion.
    #[builder(default = "16")]
    pub delete_concurrency: usize,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn check(max_keys: usize, part_size: u64, queue_size: usize, delete_concurrency: usize) -> Result<(), String> {
    if max_keys == 0 {
        return Err("max_keys must be at least 1".to_string());
    }
    if part_size < MIN_PART_SIZE {
        return Err(format!("part_size must be at least {MIN_PART_SIZE} bytes"));
    }
    if queue_size == 0 {
        return Err("queue_size must be at least 1".to_string());
    }
    if delete_concurrency == 0 {
        return Err("delete_concurrency must be at least 1".to_string());
    }
    Ok(())
}

impl SessionConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref region) = self.region {
            if region.trim().is_empty() {
                return Err("Region cannot be empty".to_string());
            }
        }
        check(
            self.max_keys.unwrap_or(1000),
            self.part_size.unwrap_or(MIN_PART_SIZE),
            self.queue_size.unwrap_or(1),
            self.delete_concurrency.unwrap_or(1),
        )
    }
}

impl SessionConfig {
    /// Create a new session config builder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> BucketResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| BucketError::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file; a missing file yields defaults.
    pub fn load(path: &Path) -> BucketResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(BucketError::InvalidConfig {
                message: format!("{}: {e}", path.display()),
            }),
        }
    }

    /// Check the numeric limits.
    pub fn validate(&self) -> BucketResult<()> {
        check(
            self.max_keys,
            self.part_size,
            self.queue_size,
            self.delete_concurrency,
        )
        .map_err(|message| BucketError::InvalidConfig { message })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            max_keys: 1000,
            auto_paginate_listing: false,
            part_size: 10 * 1024 * 1024,
            queue_size: 4,
            delete_concurrency: 16,
        }
    }
}
