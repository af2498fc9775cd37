// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Durable bucket-status ledger
//!
//! `bucket_structure.json` maps index names to ordered bucket records and
//! is the single source of truth for pipeline progress. Every stage loads
//! it fresh, mutates only the records it owns for that stage, and writes
//! the whole file back once. There is no file locking: the design assumes
//! one pipeline invocation at a time, serialized by an external scheduler.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default ledger file name.
pub const LEDGER_FILE: &str = "bucket_structure.json";

/// Ledger I/O errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Lifecycle status of one bucket.
///
/// Transitions only ever move forward along
/// `todo -> inprogress -> pendingupload -> uploaded -> pendingevict -> done`,
/// except the explicit failure revert `inprogress -> todo`. `done` is
/// terminal. `inprogress` is an in-memory state of the restoration pool
/// and only appears in a persisted ledger if a run died mid-batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Todo,
    Inprogress,
    Pendingupload,
    Uploaded,
    Pendingevict,
    Done,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Todo => "todo",
            Status::Inprogress => "inprogress",
            Status::Pendingupload => "pendingupload",
            Status::Uploaded => "uploaded",
            Status::Pendingevict => "pendingevict",
            Status::Done => "done",
        };
        f.write_str(s)
    }
}

/// One bucket entry in the ledger.
///
/// Identity (`bucket`) is fixed for the record's lifetime; only `status`
/// is ever mutated, by exactly one stage at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRecord {
    pub bucket: String,
    pub status: Status,
}

/// A batched status change, applied by [`apply_status_updates`].
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub index: String,
    pub bucket: String,
    pub status: Status,
}

/// The full ledger: index name -> ordered bucket records.
///
/// A bucket id appears at most once within its index's sequence. Key
/// order in the JSON file is irrelevant; record order within an index is
/// preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    pub indexes: HashMap<String, Vec<BucketRecord>>,
}

impl Ledger {
    /// Load the ledger from disk.
    ///
    /// Fails if the file is missing or not valid JSON; run the scan stage
    /// first to create it.
    pub async fn load(path: &Path) -> Result<Self, LedgerError> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the ledger back to disk, fully replacing prior content.
    pub async fn save(&self, path: &Path) -> Result<(), LedgerError> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Append a record, enforcing bucket-id uniqueness within the index.
    ///
    /// Returns false (and leaves the ledger untouched) if the bucket is
    /// already present.
    pub fn push_record(&mut self, index: &str, record: BucketRecord) -> bool {
        let records = self.indexes.entry(index.to_string()).or_default();
        if records.iter().any(|r| r.bucket == record.bucket) {
            return false;
        }
        records.push(record);
        true
    }

    /// Set one record's status. Returns false if the record is unknown.
    pub fn set_status(&mut self, index: &str, bucket: &str, status: Status) -> bool {
        let Some(records) = self.indexes.get_mut(index) else {
            return false;
        };
        match records.iter_mut().find(|r| r.bucket == bucket) {
            Some(record) => {
                record.status = status;
                true
            }
            None => false,
        }
    }

    /// All records currently in `status`, across every index.
    ///
    /// Indexes are visited in sorted order so batch stages behave
    /// deterministically.
    pub fn records_with_status(&self, status: Status) -> Vec<(String, BucketRecord)> {
        let mut index_names: Vec<&String> = self.indexes.keys().collect();
        index_names.sort();

        let mut out = Vec::new();
        for index in index_names {
            for record in &self.indexes[index] {
                if record.status == status {
                    out.push((index.clone(), record.clone()));
                }
            }
        }
        out
    }

    /// The first index (sorted by name) holding a `todo` record, used
    /// when no target index is configured.
    pub fn first_index_with_todo(&self) -> Option<String> {
        let mut index_names: Vec<&String> = self.indexes.keys().collect();
        index_names.sort();

        index_names
            .into_iter()
            .find(|index| {
                self.indexes[*index]
                    .iter()
                    .any(|r| r.status == Status::Todo)
            })
            .cloned()
    }

    /// Merge a batch of status updates into this ledger.
    ///
    /// Updates naming unknown records are logged and dropped rather than
    /// invented, so a concurrent rescan cannot be corrupted by stale
    /// worker results.
    pub fn apply_updates(&mut self, updates: &[StatusUpdate]) {
        for update in updates {
            if !self.set_status(&update.index, &update.bucket, update.status) {
                tracing::warn!(
                    index = %update.index,
                    bucket = %update.bucket,
                    status = %update.status,
                    "dropping status update for unknown ledger record"
                );
            }
        }
    }
}

/// Load the ledger fresh, merge a batch of status updates, save once.
///
/// This is the write path for the concurrent restoration stage: workers
/// report outcomes into a batch instead of racing N read-modify-write
/// cycles against the same file.
pub async fn apply_status_updates(
    path: &Path,
    updates: &[StatusUpdate],
) -> Result<Ledger, LedgerError> {
    let mut ledger = Ledger::load(path).await?;
    ledger.apply_updates(updates);
    ledger.save(path).await?;
    Ok(ledger)
}
