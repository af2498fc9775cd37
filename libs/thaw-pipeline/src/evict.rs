// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Eviction stage
//!
//! Drops the local copy of every `pendingevict` bucket. The cache
//! manifest is rewritten immediately before the eviction call so the
//! remote service removes exactly the expected file set.

use std::path::PathBuf;
use std::sync::Arc;

use crate::bucket::BucketName;
use crate::cacheman::CachemanClient;
use crate::ledger::{Ledger, LedgerError, Status};
use crate::manifest;

/// Outcome counts of one eviction batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvictSummary {
    pub evicted: usize,
    pub failed: usize,
}

/// Evicts confirmed-durable buckets from the local store.
pub struct Evictor {
    client: Arc<CachemanClient>,
    ledger_path: PathBuf,
    local_base: PathBuf,
}

impl Evictor {
    pub fn new(
        client: Arc<CachemanClient>,
        ledger_path: impl Into<PathBuf>,
        local_base: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            ledger_path: ledger_path.into(),
            local_base: local_base.into(),
        }
    }

    /// Evict every `pendingevict` record. Per-record failures are logged
    /// and left `pendingevict` for a later run. The ledger is written
    /// once, and only if something transitioned.
    pub async fn evict_pending(&self) -> Result<EvictSummary, LedgerError> {
        let mut ledger = Ledger::load(&self.ledger_path).await?;
        let pending = ledger.records_with_status(Status::Pendingevict);

        let mut summary = EvictSummary::default();

        for (index, record) in pending {
            let name = match BucketName::parse(&record.bucket) {
                Ok(name) => name,
                Err(e) => {
                    tracing::warn!(index = %index, error = %e, "skipping unparseable bucket");
                    summary.failed += 1;
                    continue;
                }
            };
            let bid = name.bid(&index);

            if let Err(e) =
                manifest::write_local_manifest(&self.local_base, &index, &record.bucket).await
            {
                tracing::warn!(
                    bid = %bid,
                    error = %e,
                    "cache manifest rewrite failed before eviction"
                );
            }

            match self.client.evict(&bid).await {
                Ok(()) => {
                    tracing::info!(
                        bid = %bid,
                        from = %Status::Pendingevict,
                        to = %Status::Done,
                        "bucket evicted"
                    );
                    ledger.set_status(&index, &record.bucket, Status::Done);
                    summary.evicted += 1;
                }
                Err(e) => {
                    tracing::warn!(bid = %bid, error = %e, "eviction failed, will retry later");
                    summary.failed += 1;
                }
            }
        }

        if summary.evicted > 0 {
            ledger.save(&self.ledger_path).await?;
        }
        Ok(summary)
    }
}
