// src/bin/cli.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Command-line front end for uploading directories as tarballs and deleting them again.
//!
//! Examples:
//! ```bash
//! dataexporter gcs upload /data/node my-bucket snapshot-2025-01-01
//! dataexporter gcs delete my-bucket snapshot-2025-01-01
//! dataexporter --log-level debug file --root /mnt/exports upload /data/node bkt snap
//! ```
//!
//! Every flag falls back to an environment variable (CHUNK_SIZE, PART_SIZE, ...), and a
//! `.env` file in the working directory is loaded first.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use bytesize::ByteSize;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dataexporter::constants::{
    DEFAULT_BUFFER_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_PART_SIZE, DEFAULT_SIZE_LIMIT,
    ENV_BUFFER_SIZE, ENV_CHUNK_SIZE, ENV_CONCURRENT_JOBS, ENV_FILE_STORE_ROOT, ENV_LOG_LEVEL,
    ENV_PART_SIZE, ENV_REPORT_PERIOD, ENV_SIZE_LIMIT,
};
use dataexporter::progress::SpinnerObserver;
use dataexporter::{parse_size, DeleteOptions, Exporter, Provider, UploadOptions};

#[derive(Parser)]
#[command(
    name = "dataexporter",
    author,
    version,
    about = "CLI tool for exporting and managing data",
    long_about = "Uploads directories as tarballs to external storage and deletes them."
)]
struct Cli {
    /// Log level: trace, debug, info, warn or error. RUST_LOG takes precedence.
    #[arg(long = "log-level", env = ENV_LOG_LEVEL, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    provider: ProviderCommand,
}

#[derive(Subcommand)]
enum ProviderCommand {
    /// Google Cloud Storage (GCS) operations
    Gcs {
        #[command(subcommand)]
        action: Action,
    },
    /// Local directory tree standing in for a bucket store
    File {
        /// Root directory; buckets are its subdirectories
        #[arg(long, env = ENV_FILE_STORE_ROOT)]
        root: PathBuf,

        #[command(subcommand)]
        action: Action,
    },
}

#[derive(Subcommand)]
enum Action {
    /// Uploads data to external storage
    Upload(UploadArgs),
    /// Deletes objects from external storage
    Delete(DeleteArgs),
}

#[derive(Args)]
struct UploadArgs {
    dir: PathBuf,
    bucket: String,
    name: String,

    /// Chunk size for multi-part uploads
    #[arg(long, env = ENV_CHUNK_SIZE, default_value = DEFAULT_CHUNK_SIZE, value_parser = size_arg)]
    chunk_size: ByteSize,

    /// Part size on multi-part uploads (when size limit is crossed)
    #[arg(long, env = ENV_PART_SIZE, default_value = DEFAULT_PART_SIZE, value_parser = size_arg)]
    part_size: ByteSize,

    /// Size limit for single file
    #[arg(long, env = ENV_SIZE_LIMIT, default_value = DEFAULT_SIZE_LIMIT, value_parser = size_arg)]
    size_limit: ByteSize,

    /// Buffer size on upload
    #[arg(long, env = ENV_BUFFER_SIZE, default_value = DEFAULT_BUFFER_SIZE, value_parser = size_arg)]
    buffer_size: ByteSize,

    /// Period for progress reporting
    #[arg(long, env = ENV_REPORT_PERIOD, default_value = "1s", value_parser = humantime::parse_duration)]
    report_period: Duration,

    /// Number of concurrent jobs
    #[arg(long, env = ENV_CONCURRENT_JOBS, default_value_t = 10)]
    concurrent_jobs: usize,

    /// Abort as soon as a chunk upload fails
    #[arg(long)]
    fail_fast: bool,

    /// Show a spinner instead of periodic progress log lines
    #[arg(long = "progress-bar")]
    progress_bar: bool,
}

#[derive(Args)]
struct DeleteArgs {
    bucket: String,
    name: String,

    /// Number of concurrent jobs
    #[arg(long, env = ENV_CONCURRENT_JOBS, default_value_t = 10)]
    concurrent_jobs: usize,
}

fn size_arg(s: &str) -> Result<ByteSize, String> {
    parse_size(s).map_err(|e| e.to_string())
}

/// Install the fmt subscriber; it also routes `log` records from dependencies.
fn init_logging(level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}

#[tokio::main]
async fn main() {
    // Loads any variables from .env file that are not already set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    if let Err(e) = run(cli, cancel).await {
        error!("{:#}", e);
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let (exporter, action) = match cli.provider {
        ProviderCommand::Gcs { action } => (Exporter::from_provider(Provider::Gcs, None).await?, action),
        ProviderCommand::File { root, action } => {
            (Exporter::from_provider(Provider::File, Some(&root)).await?, action)
        }
    };

    let start = Instant::now();
    match action {
        Action::Upload(args) => {
            let opts = UploadOptions::default()
                .with_chunk_size(args.chunk_size)
                .with_part_size(args.part_size)
                .with_size_limit(args.size_limit)
                .with_buffer_size(args.buffer_size)
                .with_report_period(args.report_period)
                .with_concurrent_jobs(args.concurrent_jobs)
                .with_fail_fast(args.fail_fast)
                .with_cancellation_token(cancel);

            let finals = if args.progress_bar {
                let spinner = Arc::new(SpinnerObserver::new("upload"));
                let res = exporter
                    .with_observer(spinner.clone())
                    .upload(&args.dir, &args.bucket, &args.name, opts)
                    .await;
                spinner.finish(if res.is_ok() { "done" } else { "failed" });
                res?
            } else {
                exporter.upload(&args.dir, &args.bucket, &args.name, opts).await?
            };

            info!(
                time_elapsed = %humantime::format_duration(round_ms(start.elapsed())),
                objects = %finals.join(","),
                "upload successful"
            );
        }
        Action::Delete(args) => {
            let opts = DeleteOptions::default()
                .with_concurrent_jobs(args.concurrent_jobs)
                .with_cancellation_token(cancel);
            exporter.delete(&args.bucket, &args.name, opts).await?;

            info!(
                time_elapsed = %humantime::format_duration(round_ms(start.elapsed())),
                "delete successful"
            );
        }
    }
    Ok(())
}

fn round_ms(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}
