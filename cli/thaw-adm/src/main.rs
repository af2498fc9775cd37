// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Frozen bucket migration CLI
//!
//! Drives the bucket migration pipeline stage by stage, or end to end
//! with `run`. Configuration comes from `THAW_*` environment variables
//! with command-line flags layered on top.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use thaw_pipeline::cacheman::{self, CachemanClient};
use thaw_pipeline::config::PipelineConfig;
use thaw_pipeline::evict::Evictor;
use thaw_pipeline::ledger::Ledger;
use thaw_pipeline::poll::CompletionPoller;
use thaw_pipeline::restore::{RestoreError, RestorePool, ScriptRestorer};
use thaw_pipeline::scan::Scanner;
use thaw_pipeline::stores::{FsSinkStore, FsSourceStore};

/// Exit status for a run that found zero eligible buckets to restore.
const EXIT_NOTHING_TO_DO: i32 = 2;

#[derive(Parser)]
#[command(name = "thaw-adm")]
#[command(about = "Frozen bucket migration utility", long_about = None)]
#[command(version)]
struct Cli {
    /// Base URL of the remote cache-management service
    #[arg(long, global = true)]
    remote_url: Option<String>,

    /// Root of the mounted source store (frozen archives)
    #[arg(long, global = true)]
    source_root: Option<PathBuf>,

    /// Listing prefix within the source store
    #[arg(long, global = true)]
    source_prefix: Option<String>,

    /// Root of the mounted sink store (upload receipts)
    #[arg(long, global = true)]
    sink_root: Option<PathBuf>,

    /// Local restoration path
    #[arg(long, global = true)]
    local_base: Option<PathBuf>,

    /// Ledger file location
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,

    /// External restoration script
    #[arg(long, global = true)]
    script: Option<PathBuf>,

    /// Restoration worker-pool width
    #[arg(long, global = true)]
    width: Option<usize>,

    /// Number of buckets to restore this run
    #[arg(long, global = true)]
    count: Option<usize>,

    /// Target index (default: first index with a todo bucket)
    #[arg(long, global = true)]
    index: Option<String>,

    /// Give up waiting for a bucket's remote upload after this many
    /// seconds (default: wait forever)
    #[arg(long, global = true)]
    poll_deadline_secs: Option<u64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the ledger from source-store, sink-store, and local
    /// observations
    Scan,

    /// Restore todo buckets to local disk through the worker pool
    Restore,

    /// Register restored buckets with the remote cache tier
    Upload,

    /// Wait for remote ingestion and mark confirmed buckets evictable
    Check,

    /// Evict confirmed buckets from the local store
    Evict,

    /// Run the full pipeline: scan, restore, upload, check, evict
    Run,
}

impl Cli {
    /// Environment configuration with CLI flags layered on top.
    fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::from_env();

        if let Some(url) = &self.remote_url {
            config.remote_url = url.clone();
        }
        if let Some(root) = &self.source_root {
            config.source_root = root.clone();
        }
        if let Some(prefix) = &self.source_prefix {
            config.source_prefix = prefix.clone();
        }
        if let Some(root) = &self.sink_root {
            config.sink_root = root.clone();
        }
        if let Some(base) = &self.local_base {
            config.local_base = base.clone();
        }
        if let Some(path) = &self.ledger {
            config.ledger_path = path.clone();
        }
        if let Some(script) = &self.script {
            config.restore_script = script.clone();
        }
        if let Some(width) = self.width {
            config.pool_width = width;
        }
        if let Some(count) = self.count {
            config.buckets_per_run = count;
        }
        if let Some(index) = &self.index {
            config.target_index = Some(index.clone());
        }
        if let Some(secs) = self.poll_deadline_secs {
            config.poll_deadline_secs = Some(secs);
        }

        config
    }
}

fn scanner(config: &PipelineConfig) -> Scanner {
    Scanner::new(
        Arc::new(FsSourceStore::new(&config.source_root)),
        Arc::new(FsSinkStore::new(&config.sink_root)),
        config.source_prefix.clone(),
        &config.local_base,
    )
}

fn client(config: &PipelineConfig) -> Result<Arc<CachemanClient>> {
    let client = CachemanClient::new(
        &config.remote_url,
        &config.remote_user,
        &config.remote_password,
        Duration::from_secs(config.http_timeout_secs),
    )
    .context("failed to build cacheman client")?;
    Ok(Arc::new(client))
}

async fn scan(config: &PipelineConfig) -> Result<()> {
    let ledger = scanner(config).scan().await?;
    ledger.save(&config.ledger_path).await?;

    let buckets: usize = ledger.indexes.values().map(Vec::len).sum();
    println!(
        "Scanned {} indexes, {} buckets -> {}",
        ledger.indexes.len(),
        buckets,
        config.ledger_path.display()
    );
    Ok(())
}

/// Resolve the target index, falling back to the first one with work.
async fn target_index(config: &PipelineConfig) -> Result<Option<String>> {
    if let Some(index) = &config.target_index {
        return Ok(Some(index.clone()));
    }
    let ledger = Ledger::load(&config.ledger_path).await?;
    Ok(ledger.first_index_with_todo())
}

async fn restore(config: &PipelineConfig) -> Result<()> {
    let Some(index) = target_index(config).await? else {
        eprintln!("No index has todo buckets; nothing to restore.");
        std::process::exit(EXIT_NOTHING_TO_DO);
    };

    let pool = RestorePool::new(
        Arc::new(ScriptRestorer::new(&config.restore_script)),
        &config.ledger_path,
        &config.local_base,
        config.pool_width,
    );

    match pool.restore(&index, config.buckets_per_run).await {
        Ok(summary) => {
            println!(
                "Restored {} buckets in index {} ({} failed). Restart the host service to pick them up.",
                summary.restored, index, summary.failed
            );
            Ok(())
        }
        Err(RestoreError::NothingToDo(index)) => {
            eprintln!("No todo buckets in index {}; nothing to restore.", index);
            std::process::exit(EXIT_NOTHING_TO_DO);
        }
        Err(e) => Err(e.into()),
    }
}

async fn upload(config: &PipelineConfig) -> Result<()> {
    let client = client(config)?;
    let summary = cacheman::promote_pending(&client, &config.ledger_path).await?;
    println!(
        "Promoted {} buckets to uploaded ({} failed).",
        summary.promoted, summary.failed
    );
    Ok(())
}

async fn check(config: &PipelineConfig) -> Result<()> {
    let poller = CompletionPoller::new(
        client(config)?,
        Arc::new(FsSinkStore::new(&config.sink_root)),
        &config.ledger_path,
        Duration::from_secs(config.poll_interval_secs),
        config.poll_deadline_secs.map(Duration::from_secs),
    );

    let summary = poller.await_and_mark_evictable().await?;
    println!(
        "Marked {} buckets pendingevict ({} awaiting receipt, {} timed out).",
        summary.marked, summary.awaiting_receipt, summary.timed_out
    );
    Ok(())
}

async fn evict(config: &PipelineConfig) -> Result<()> {
    let evictor = Evictor::new(client(config)?, &config.ledger_path, &config.local_base);
    let summary = evictor.evict_pending().await?;
    println!(
        "Evicted {} buckets ({} failed).",
        summary.evicted, summary.failed
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config();

    match cli.command {
        Commands::Scan => scan(&config).await,
        Commands::Restore => restore(&config).await,
        Commands::Upload => upload(&config).await,
        Commands::Check => check(&config).await,
        Commands::Evict => evict(&config).await,
        Commands::Run => {
            scan(&config).await?;
            restore(&config).await?;
            upload(&config).await?;
            check(&config).await?;
            evict(&config).await
        }
    }
}
