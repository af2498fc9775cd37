// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Object-store trait seams
//!
//! The pipeline treats the source store (frozen archives) and the sink
//! store (the remote cache tier's backing store) as external
//! collaborators. All it ever asks of them is delimiter-style prefix
//! listing and key existence, so those two operations are the whole
//! interface. The filesystem implementations below operate against a
//! locally mounted or synced copy of each store's namespace.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Store access errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store listing failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Source store holding frozen bucket archives.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// List first-level groupings under `prefix` (the delimiter-`/`
    /// listing of an object store). Returned names are bare path
    /// segments with no trailing slash.
    async fn list_prefixes(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Sink store where the remote service writes upload receipts.
#[async_trait]
pub trait SinkStore: Send + Sync {
    /// List every key under `prefix`.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Whether an object exists at exactly `key`.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

/// Directory-backed source store.
#[derive(Debug, Clone)]
pub struct FsSourceStore {
    root: PathBuf,
}

impl FsSourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SourceStore for FsSourceStore {
    async fn list_prefixes(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.root.join(prefix);
        let mut names = Vec::new();

        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}

/// Directory-backed sink store.
#[derive(Debug, Clone)]
pub struct FsSinkStore {
    root: PathBuf,
}

impl FsSinkStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SinkStore for FsSinkStore {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let start = self.root.join(prefix);
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        // Breadth-first walk; async recursion is not worth the boxing.
        let mut keys = Vec::new();
        let mut pending: VecDeque<PathBuf> = VecDeque::from([start]);
        while let Some(dir) = pending.pop_front() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push_back(path);
                } else if let Some(key) = relative_key(&self.root, &path) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(tokio::fs::try_exists(self.root.join(key)).await?)
    }
}

/// Slash-separated key of `path` relative to `root`.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}
