// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Discovery scanner
//!
//! Builds the initial ledger from ground truth: the source store's
//! index/bucket layout, the sink store's upload receipts, and the local
//! restoration path. The scanner only derives state from observations,
//! so it can be re-run at any time to reconcile the ledger.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::bucket::BucketName;
use crate::ledger::{BucketRecord, Ledger, Status};
use crate::manifest;
use crate::stores::{SinkStore, SourceStore, StoreError};

/// Scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Builds the bucket-status ledger from store and disk observations.
pub struct Scanner {
    source: Arc<dyn SourceStore>,
    sink: Arc<dyn SinkStore>,
    source_prefix: String,
    local_base: PathBuf,
}

impl Scanner {
    pub fn new(
        source: Arc<dyn SourceStore>,
        sink: Arc<dyn SinkStore>,
        source_prefix: impl Into<String>,
        local_base: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            sink,
            source_prefix: source_prefix.into(),
            local_base: local_base.into(),
        }
    }

    /// Enumerate indexes and buckets and derive each bucket's status.
    ///
    /// Status is a pure function of two observations:
    ///
    /// | receipt in sink | present locally | status        |
    /// |-----------------|-----------------|---------------|
    /// | yes             | yes             | pendingevict  |
    /// | yes             | no              | done          |
    /// | no              | yes             | pendingupload |
    /// | no              | no              | todo          |
    ///
    /// Receipt existence is resolved against one sink listing per index
    /// rather than one remote lookup per bucket. Buckets whose names do
    /// not parse are logged and skipped.
    pub async fn scan(&self) -> Result<Ledger, ScanError> {
        let mut ledger = Ledger::default();

        let indexes = self.source.list_prefixes(&self.source_prefix).await?;
        tracing::info!(
            prefix = %self.source_prefix,
            index_count = indexes.len(),
            "scanning source store"
        );

        for index in indexes {
            let receipts: HashSet<String> = self
                .sink
                .list_keys(&format!("{}/db/", index))
                .await?
                .into_iter()
                .collect();

            let bucket_prefix = if self.source_prefix.is_empty() {
                index.clone()
            } else {
                format!("{}/{}", self.source_prefix.trim_end_matches('/'), index)
            };
            let buckets = self.source.list_prefixes(&bucket_prefix).await?;

            for bucket in buckets {
                let name = match BucketName::parse(&bucket) {
                    Ok(name) => name,
                    Err(e) => {
                        tracing::warn!(index = %index, error = %e, "skipping unparseable bucket");
                        continue;
                    }
                };

                let receipt_exists = receipts.contains(&name.receipt_key(&index));
                let local = manifest::locally_present(&self.local_base, &index, &bucket).await;

                let status = match (receipt_exists, local) {
                    (true, true) => Status::Pendingevict,
                    (true, false) => Status::Done,
                    (false, true) => Status::Pendingupload,
                    (false, false) => Status::Todo,
                };

                tracing::debug!(
                    index = %index,
                    bucket = %bucket,
                    receipt = receipt_exists,
                    local = local,
                    status = %status,
                    "observed bucket"
                );

                if !ledger.push_record(
                    &index,
                    BucketRecord {
                        bucket: bucket.clone(),
                        status,
                    },
                ) {
                    tracing::warn!(index = %index, bucket = %bucket, "duplicate bucket in listing");
                }
            }

            // Indexes with no usable buckets still get an entry so the
            // ledger mirrors the source layout.
            ledger.indexes.entry(index).or_default();
        }

        Ok(ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    use crate::bucket::receipt_key;

    /// In-memory source store: prefix -> child names.
    struct MapSource {
        prefixes: HashMap<String, Vec<String>>,
    }

    #[async_trait]
    impl SourceStore for MapSource {
        async fn list_prefixes(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            Ok(self.prefixes.get(prefix).cloned().unwrap_or_default())
        }
    }

    /// In-memory sink store: a flat key set.
    struct SetSink {
        keys: HashSet<String>,
    }

    #[async_trait]
    impl SinkStore for SetSink {
        async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            Ok(self
                .keys
                .iter()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }

        async fn exists(&self, key: &str) -> Result<bool, StoreError> {
            Ok(self.keys.contains(key))
        }
    }

    fn source_with(index: &str, buckets: &[&str]) -> Arc<MapSource> {
        let mut prefixes = HashMap::new();
        prefixes.insert(String::new(), vec![index.to_string()]);
        prefixes.insert(
            index.to_string(),
            buckets.iter().map(|b| b.to_string()).collect(),
        );
        Arc::new(MapSource { prefixes })
    }

    async fn materialize(local_base: &std::path::Path, index: &str, bucket: &str) {
        let dir = manifest::bucket_dir(local_base, index, bucket);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(manifest::LOCAL_MARKER_FILE), b"")
            .await
            .unwrap();
    }

    const BUCKET: &str = "db_2_1_7_AAAA-BBBB";

    fn receipt() -> String {
        receipt_key("main", "7", "AAAA-BBBB")
    }

    #[tokio::test]
    async fn decision_table_receipt_and_local() {
        let local = tempfile::tempdir().unwrap();
        materialize(local.path(), "main", BUCKET).await;
        let sink = Arc::new(SetSink {
            keys: HashSet::from([receipt()]),
        });

        let scanner = Scanner::new(source_with("main", &[BUCKET]), sink, "", local.path());
        let ledger = scanner.scan().await.unwrap();
        assert_eq!(ledger.indexes["main"][0].status, Status::Pendingevict);
    }

    #[tokio::test]
    async fn decision_table_receipt_only() {
        let local = tempfile::tempdir().unwrap();
        let sink = Arc::new(SetSink {
            keys: HashSet::from([receipt()]),
        });

        let scanner = Scanner::new(source_with("main", &[BUCKET]), sink, "", local.path());
        let ledger = scanner.scan().await.unwrap();
        assert_eq!(ledger.indexes["main"][0].status, Status::Done);
    }

    #[tokio::test]
    async fn decision_table_local_only() {
        let local = tempfile::tempdir().unwrap();
        materialize(local.path(), "main", BUCKET).await;
        let sink = Arc::new(SetSink {
            keys: HashSet::new(),
        });

        let scanner = Scanner::new(source_with("main", &[BUCKET]), sink, "", local.path());
        let ledger = scanner.scan().await.unwrap();
        assert_eq!(ledger.indexes["main"][0].status, Status::Pendingupload);
    }

    #[tokio::test]
    async fn decision_table_neither() {
        let local = tempfile::tempdir().unwrap();
        let sink = Arc::new(SetSink {
            keys: HashSet::new(),
        });

        let scanner = Scanner::new(source_with("main", &[BUCKET]), sink, "", local.path());
        let ledger = scanner.scan().await.unwrap();
        assert_eq!(ledger.indexes["main"][0].status, Status::Todo);
    }

    #[tokio::test]
    async fn scan_is_idempotent_over_unchanged_inputs() {
        let local = tempfile::tempdir().unwrap();
        materialize(local.path(), "main", BUCKET).await;
        let sink = Arc::new(SetSink {
            keys: HashSet::from([receipt()]),
        });
        let scanner = Scanner::new(
            source_with("main", &[BUCKET, "db_4_3_8_AAAA-BBBB"]),
            sink,
            "",
            local.path(),
        );

        let first = scanner.scan().await.unwrap();
        let second = scanner.scan().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn malformed_bucket_names_are_skipped() {
        let local = tempfile::tempdir().unwrap();
        let sink = Arc::new(SetSink {
            keys: HashSet::new(),
        });
        let scanner = Scanner::new(
            source_with("main", &["not-a-bucket", BUCKET]),
            sink,
            "",
            local.path(),
        );

        let ledger = scanner.scan().await.unwrap();
        assert_eq!(ledger.indexes["main"].len(), 1);
        assert_eq!(ledger.indexes["main"][0].bucket, BUCKET);
    }

    #[tokio::test]
    async fn scan_honors_source_prefix() {
        let local = tempfile::tempdir().unwrap();
        let mut prefixes = HashMap::new();
        prefixes.insert("frozen/".to_string(), vec!["main".to_string()]);
        prefixes.insert("frozen/main".to_string(), vec![BUCKET.to_string()]);
        let source = Arc::new(MapSource { prefixes });
        let sink = Arc::new(SetSink {
            keys: HashSet::new(),
        });

        let scanner = Scanner::new(source, sink, "frozen/", local.path());
        let ledger = scanner.scan().await.unwrap();
        assert_eq!(ledger.indexes["main"][0].status, Status::Todo);
    }
}
