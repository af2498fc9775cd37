// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Completion poller
//!
//! Waits for the remote tier to finish ingesting each `uploaded` bucket.
//! The remote upload runs asynchronously after `close`, so this stage
//! blocks: it polls the cacheman status with a fixed delay until the
//! upload worker reports idle, then requires the durable upload receipt
//! in the sink store before marking the bucket `pendingevict`.
//!
//! By default the wait has no deadline, matching the source system's
//! operational behaviour; set a per-record deadline to bound it, in
//! which case expiry is surfaced as a timeout count and the record stays
//! `uploaded` for a later run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bucket::BucketName;
use crate::cacheman::CachemanClient;
use crate::ledger::{Ledger, LedgerError, Status};
use crate::stores::SinkStore;

/// Default delay between status polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Outcome counts of one polling batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollSummary {
    /// Records that reached `pendingevict`.
    pub marked: usize,
    /// Records whose upload went idle but whose receipt has not appeared.
    pub awaiting_receipt: usize,
    /// Records abandoned because the configured deadline expired.
    pub timed_out: usize,
}

/// Blocks on remote upload completion for `uploaded` records.
pub struct CompletionPoller {
    client: Arc<CachemanClient>,
    sink: Arc<dyn SinkStore>,
    ledger_path: PathBuf,
    interval: Duration,
    deadline: Option<Duration>,
}

impl CompletionPoller {
    pub fn new(
        client: Arc<CachemanClient>,
        sink: Arc<dyn SinkStore>,
        ledger_path: impl Into<PathBuf>,
        interval: Duration,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            client,
            sink,
            ledger_path: ledger_path.into(),
            interval,
            deadline,
        }
    }

    /// Wait for every `uploaded` record and mark the confirmed ones
    /// `pendingevict`. The ledger is written once, and only if something
    /// transitioned.
    pub async fn await_and_mark_evictable(&self) -> Result<PollSummary, LedgerError> {
        let mut ledger = Ledger::load(&self.ledger_path).await?;
        let uploaded = ledger.records_with_status(Status::Uploaded);

        let mut summary = PollSummary::default();

        for (index, record) in uploaded {
            let name = match BucketName::parse(&record.bucket) {
                Ok(name) => name,
                Err(e) => {
                    tracing::warn!(index = %index, error = %e, "skipping unparseable bucket");
                    continue;
                }
            };
            let bid = name.bid(&index);

            if !self.wait_until_idle(&bid).await {
                summary.timed_out += 1;
                continue;
            }

            let receipt_key = name.receipt_key(&index);
            match self.sink.exists(&receipt_key).await {
                Ok(true) => {
                    tracing::info!(
                        bid = %bid,
                        from = %Status::Uploaded,
                        to = %Status::Pendingevict,
                        "remote copy confirmed durable"
                    );
                    ledger.set_status(&index, &record.bucket, Status::Pendingevict);
                    summary.marked += 1;
                }
                Ok(false) => {
                    tracing::info!(
                        bid = %bid,
                        key = %receipt_key,
                        "upload idle but receipt not present yet"
                    );
                    summary.awaiting_receipt += 1;
                }
                Err(e) => {
                    tracing::warn!(bid = %bid, error = %e, "receipt lookup failed");
                    summary.awaiting_receipt += 1;
                }
            }
        }

        if summary.marked > 0 {
            ledger.save(&self.ledger_path).await?;
        }
        Ok(summary)
    }

    /// Poll the remote status until the upload worker goes idle.
    ///
    /// Transient query failures are logged and retried; the loop only
    /// gives up (returning false) if a deadline is configured and
    /// expires.
    async fn wait_until_idle(&self, bid: &str) -> bool {
        let started = Instant::now();
        loop {
            match self.client.bucket_status(bid).await {
                Ok(status) if status.is_idle() => {
                    tracing::info!(
                        bid = %bid,
                        bucket_status = ?status.bucket_status,
                        "remote upload idle"
                    );
                    return true;
                }
                Ok(status) => {
                    tracing::debug!(
                        bid = %bid,
                        upload_status = ?status.upload_status,
                        "waiting for remote upload"
                    );
                }
                Err(e) => {
                    tracing::warn!(bid = %bid, error = %e, "status query failed, will retry");
                }
            }

            if let Some(deadline) = self.deadline {
                if started.elapsed() >= deadline {
                    tracing::warn!(
                        bid = %bid,
                        waited_secs = started.elapsed().as_secs(),
                        "deadline expired waiting for remote upload"
                    );
                    return false;
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
