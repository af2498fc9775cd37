// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Restoration pool
//!
//! Rebuilds `todo` buckets on local disk through a bounded worker pool.
//! This is the only stage with internal parallelism: each worker performs
//! one long external restoration call, reports its outcome, and the pool
//! merges all outcomes into the ledger with a single batched write.
//! Workers never touch the ledger file themselves.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::ledger::{self, Ledger, LedgerError, Status, StatusUpdate};
use crate::manifest;

/// Default worker-pool width.
pub const DEFAULT_POOL_WIDTH: usize = 10;

/// Why one bucket's restoration failed.
#[derive(Debug, Error)]
pub enum RestoreFailure {
    #[error("restore command failed to start: {0}")]
    Spawn(std::io::Error),

    #[error("restore command exited with {0}")]
    Exited(ExitStatus),
}

/// Restoration stage errors.
///
/// `NothingToDo` is a clean early-exit for callers, not a fault: it means
/// the index currently holds no `todo` records.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("index {0:?} not present in ledger")]
    UnknownIndex(String),

    #[error("no buckets with status todo in index {0:?}")]
    NothingToDo(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Rebuilds one bucket's on-disk layout from its frozen archive.
#[async_trait]
pub trait Restorer: Send + Sync {
    async fn restore(&self, index: &str, bucket: &str) -> Result<(), RestoreFailure>;
}

/// Restorer that shells out to the external restoration script.
///
/// The script receives `<bucket> <index>` and is expected to pull the
/// frozen archive and unpack it into the local restoration path. It may
/// run for minutes; nothing here cancels it once started.
#[derive(Debug, Clone)]
pub struct ScriptRestorer {
    script: PathBuf,
}

impl ScriptRestorer {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

#[async_trait]
impl Restorer for ScriptRestorer {
    async fn restore(&self, index: &str, bucket: &str) -> Result<(), RestoreFailure> {
        let status = tokio::process::Command::new(&self.script)
            .arg(bucket)
            .arg(index)
            .status()
            .await
            .map_err(RestoreFailure::Spawn)?;

        if status.success() {
            Ok(())
        } else {
            Err(RestoreFailure::Exited(status))
        }
    }
}

/// Outcome counts of one restoration batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreSummary {
    pub restored: usize,
    pub failed: usize,
}

/// Bounded-concurrency restoration of `todo` buckets.
pub struct RestorePool {
    restorer: Arc<dyn Restorer>,
    ledger_path: PathBuf,
    local_base: PathBuf,
    width: usize,
}

impl RestorePool {
    pub fn new(
        restorer: Arc<dyn Restorer>,
        ledger_path: impl Into<PathBuf>,
        local_base: impl Into<PathBuf>,
        width: usize,
    ) -> Self {
        Self {
            restorer,
            ledger_path: ledger_path.into(),
            local_base: local_base.into(),
            width: width.max(1),
        }
    }

    /// Restore up to `max_count` `todo` buckets of `index`.
    ///
    /// Each dispatched record goes `todo -> inprogress` in memory, then
    /// `pendingupload` on success or back to `todo` on failure so a later
    /// run retries it. Outcomes are independent across buckets and may
    /// complete in any order; every dispatched record lands in the
    /// persisted ledger exactly once via one batched merge.
    pub async fn restore(
        &self,
        index: &str,
        max_count: usize,
    ) -> Result<RestoreSummary, RestoreError> {
        let ledger = Ledger::load(&self.ledger_path).await?;
        let records = ledger
            .indexes
            .get(index)
            .ok_or_else(|| RestoreError::UnknownIndex(index.to_string()))?;

        let candidates: Vec<String> = records
            .iter()
            .filter(|r| r.status == Status::Todo)
            .take(max_count)
            .map(|r| r.bucket.clone())
            .collect();

        if candidates.is_empty() {
            return Err(RestoreError::NothingToDo(index.to_string()));
        }

        tracing::info!(
            index = %index,
            count = candidates.len(),
            width = self.width,
            "dispatching restoration workers"
        );

        let semaphore = Arc::new(Semaphore::new(self.width));
        let mut workers = JoinSet::new();

        for bucket in candidates {
            let restorer = Arc::clone(&self.restorer);
            let semaphore = Arc::clone(&semaphore);
            let index = index.to_string();

            workers.spawn(async move {
                let _permit = semaphore.acquire_owned().await;

                // inprogress lives only in memory; the file is written
                // once, after the whole batch settles.
                tracing::info!(index = %index, bucket = %bucket, status = %Status::Inprogress, "restoring bucket");

                let status = match restorer.restore(&index, &bucket).await {
                    Ok(()) => {
                        tracing::info!(index = %index, bucket = %bucket, "bucket restored");
                        Status::Pendingupload
                    }
                    Err(e) => {
                        tracing::warn!(
                            index = %index,
                            bucket = %bucket,
                            error = %e,
                            "bucket restore failed, reverting to todo"
                        );
                        Status::Todo
                    }
                };

                (bucket, status)
            });
        }

        let mut updates = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((bucket, status)) => updates.push(StatusUpdate {
                    index: index.to_string(),
                    bucket,
                    status,
                }),
                Err(e) => {
                    tracing::error!(error = %e, "restoration worker panicked");
                }
            }
        }

        // Manifest for every dispatched bucket, restored or not; the
        // write is a no-op (logged) when the directory never appeared.
        for update in &updates {
            if let Err(e) =
                manifest::write_local_manifest(&self.local_base, index, &update.bucket).await
            {
                tracing::warn!(
                    index = %index,
                    bucket = %update.bucket,
                    error = %e,
                    "cache manifest write failed"
                );
            }
        }

        ledger::apply_status_updates(&self.ledger_path, &updates).await?;

        let restored = updates
            .iter()
            .filter(|u| u.status == Status::Pendingupload)
            .count();
        let summary = RestoreSummary {
            restored,
            failed: updates.len() - restored,
        };

        tracing::info!(
            index = %index,
            restored = summary.restored,
            failed = summary.failed,
            "restoration batch complete"
        );
        Ok(summary)
    }
}
