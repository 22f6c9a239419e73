//! bucketfile - A file manager for S3-compatible object storage.
//!
//! Usage:
//!   bucketfile --root DIR --bucket NAME ls [PREFIX]       List a folder
//!   bucketfile --root DIR --bucket NAME du [PREFIX]       Storage usage
//!   bucketfile --root DIR --bucket NAME upload PATHS...   Upload files
//!   bucketfile --root DIR --bucket NAME rm KEYS...        Delete files and folders
//!   bucketfile --root DIR --bucket NAME mkdir NAME        Create a folder
//!   bucketfile --root DIR --bucket NAME get KEY           Download a file
//!   bucketfile --help                                     Show help

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use bucketfile_core::namespace::is_folder_marker;
use bucketfile_core::{ObjectStore, SessionConfig};
use bucketfile_ops::{
    OperationResult, collect_upload_files, start_bulk_delete, start_folder_delete,
};
use bucketfile_scan::{AggregateScanner, ScanScope};
use bucketfile_session::view::format_size;
use bucketfile_session::{RowKind, Session, SortDirection, SortKey, SortOrder};
use bucketfile_store::LocalStore;

#[derive(Parser)]
#[command(
    name = "bucketfile",
    version,
    about = "A file manager for S3-compatible object storage",
    long_about = "bucketfile browses a bucket as folders, uploads files and directories, \
                  and deletes whole folders or selections.\n\n\
                  Buckets are served from subdirectories of --root."
)]
struct Cli {
    /// Directory holding one subdirectory per bucket
    #[arg(long)]
    root: PathBuf,

    /// Bucket to open
    #[arg(short, long)]
    bucket: String,

    /// Config file (defaults to <config dir>/bucketfile/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the folders and files in a folder
    Ls {
        /// Folder prefix, e.g. "photos/2024/"
        #[arg(default_value = "")]
        prefix: String,

        /// Column to sort files by (key, size, modified)
        #[arg(short, long, default_value = "key")]
        sort: SortKey,

        /// Sort descending
        #[arg(short, long)]
        desc: bool,

        /// Only show names containing this text
        #[arg(long, default_value = "")]
        search: String,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show total size of the bucket or of one folder
    Du {
        /// Folder prefix (defaults to the whole bucket)
        prefix: Option<String>,
    },

    /// Upload files and directories
    Upload {
        /// Files or directories to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Destination folder prefix
        #[arg(long, default_value = "")]
        to: String,

        /// Glob of relative paths to skip (repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,
    },

    /// Delete files and folders (keys ending in "/" are folders)
    Rm {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Create a folder
    Mkdir {
        name: String,

        /// Parent folder prefix
        #[arg(long = "in", default_value = "")]
        parent: String,
    },

    /// Download a file
    Get {
        key: String,

        /// Directory to save into
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(&cli.root));
    let region = config.region.clone();
    let mut session = Session::open(store.clone(), cli.bucket.clone(), region, config);

    match cli.command {
        Command::Ls {
            prefix,
            sort,
            desc,
            search,
            json,
        } => {
            let direction = if desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            run_ls(&mut session, prefix, SortOrder::new(sort, direction), &search, json).await?;
        }
        Command::Du { prefix } => {
            run_du(store, &cli.bucket, &session, prefix).await?;
        }
        Command::Upload { paths, to, exclude } => {
            run_upload(&mut session, &paths, to, &exclude).await?;
        }
        Command::Rm { keys } => {
            run_rm(&session, keys).await?;
        }
        Command::Mkdir { name, parent } => {
            session.navigate(parent).await?;
            let key = session.create_folder(&name).await?;
            println!("Created {key}");
        }
        Command::Get { key, out } => {
            let path = session.download(&key, &out).await?;
            println!("Saved {}", path.display());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match dirs::config_dir() {
            Some(dir) => dir.join("bucketfile").join("config.toml"),
            None => return Ok(SessionConfig::default()),
        },
    };
    tracing::debug!(path = %path.display(), "loading config");
    SessionConfig::load(&path).wrap_err_with(|| format!("Failed to load {}", path.display()))
}

/// List one folder.
async fn run_ls(
    session: &mut Session,
    prefix: String,
    order: SortOrder,
    search: &str,
    json: bool,
) -> Result<()> {
    session.navigate(prefix).await.wrap_err("Listing failed")?;
    let rows = session.rows(order, search);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let location = match session.current_prefix() {
        "" => format!("{}/", session.bucket()),
        prefix => format!("{}/{prefix}", session.bucket()),
    };
    println!("{location}");
    println!("{}", "─".repeat(60));

    if rows.is_empty() {
        println!(" (empty)");
    }
    for row in &rows {
        let name = match row.kind {
            RowKind::Folder => format!("{}/", row.name),
            RowKind::File => row.name.to_string(),
        };
        println!(" {:>10}  {:16}  {name}", row.size_label(), row.modified_label());
    }

    if session.listing().truncated {
        println!();
        println!(" More entries exist; set auto_paginate_listing to list them all.");
    }
    Ok(())
}

/// Report total size of the bucket or one folder. Ctrl-C stops the scan.
async fn run_du(
    store: Arc<dyn ObjectStore>,
    bucket: &str,
    session: &Session,
    prefix: Option<String>,
) -> Result<()> {
    let scope = match prefix {
        Some(prefix) if !prefix.is_empty() => ScanScope::Folder(prefix),
        _ => ScanScope::Bucket,
    };

    let scanner = AggregateScanner::new(store, session.config().max_keys);
    let mut progress = scanner.subscribe();
    tokio::spawn(async move {
        while let Ok(p) = progress.recv().await {
            eprint!("\rScanning... {} objects, {}", p.objects_seen, format_size(p.bytes_seen));
            let _ = std::io::stderr().flush();
        }
    });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let result = scanner
        .scan_all_with_cancel(bucket, &scope, &cancel)
        .await
        .wrap_err("Scan failed")?;
    eprintln!();

    let target = match &scope {
        ScanScope::Bucket => bucket.to_string(),
        ScanScope::Folder(prefix) => format!("{bucket}/{prefix}"),
    };
    println!(
        "{target}: {} in {} objects ({} list calls)",
        format_size(result.total_bytes),
        result.object_count,
        result.pages
    );
    Ok(())
}

/// Upload local files under a destination folder. Ctrl-C cancels.
async fn run_upload(
    session: &mut Session,
    paths: &[PathBuf],
    destination: String,
    excludes: &[String],
) -> Result<()> {
    let files = collect_upload_files(paths, excludes).wrap_err("Failed to read upload sources")?;
    if files.is_empty() {
        bail!("Nothing to upload");
    }

    let total = files.iter().map(|f| f.size).sum::<u64>();
    eprintln!("Uploading {} files ({})...", files.len(), format_size(total));

    session.navigate(destination).await?;

    let transfers = session.transfers();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            transfers.cancel();
        }
    });

    let outcome = session
        .upload(files, |percent| {
            eprint!("\rUploading... {percent}%");
            let _ = std::io::stderr().flush();
        })
        .await;
    watcher.abort();
    eprintln!();

    let outcome = outcome.wrap_err("Upload failed")?;
    if outcome.cancelled {
        println!(
            "Upload cancelled after {} files ({})",
            outcome.files_uploaded,
            format_size(outcome.bytes_uploaded)
        );
    } else {
        println!(
            "Uploaded {} files ({})",
            outcome.files_uploaded,
            format_size(outcome.bytes_uploaded)
        );
    }
    Ok(())
}

/// Delete a mixed set of keys and folder prefixes.
///
/// A single folder reports progress per object; anything else per item.
async fn run_rm(session: &Session, mut keys: Vec<String>) -> Result<()> {
    let bucket = session.bucket().to_string();
    let mut results = if keys.len() == 1 && is_folder_marker(&keys[0]) {
        let prefix = keys.swap_remove(0);
        start_folder_delete(session.mutations(), bucket, prefix)
    } else {
        start_bulk_delete(session.mutations(), bucket, keys)
    };

    while let Some(result) = results.recv().await {
        match result {
            OperationResult::Progress(progress) => {
                if let Some(key) = &progress.current_key {
                    let failed = if progress.has_errors() {
                        format!(" ({} failed)", progress.errors.len())
                    } else {
                        String::new()
                    };
                    eprint!(
                        "\r{}... {:.0}% {}/{}{failed} {key}",
                        progress.operation_type,
                        progress.percentage().floor(),
                        progress.items_completed,
                        progress.items_total
                    );
                    let _ = std::io::stderr().flush();
                }
            }
            OperationResult::Complete(complete) => {
                eprintln!();
                println!("{}", complete.summary());
                for failure in &complete.errors {
                    println!("  {}: {}", failure.key, failure.message);
                }
                if !complete.is_success() {
                    bail!("{} items could not be deleted", complete.failed);
                }
            }
        }
    }
    Ok(())
}
