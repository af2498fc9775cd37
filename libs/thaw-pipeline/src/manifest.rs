// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Local cache-manifest writer
//!
//! The host service's cache manager decides what to delete on eviction by
//! reading `cachemanager_local.json` from the bucket directory. The
//! pipeline (re)writes that manifest after restoration and again right
//! before eviction so the eviction call removes exactly the expected
//! file set.

use std::path::{Path, PathBuf};

use serde_json::json;

/// Manifest file name inside each bucket directory.
pub const MANIFEST_FILE: &str = "cachemanager_local.json";

/// Marker file whose presence means a bucket is materialized locally.
pub const LOCAL_MARKER_FILE: &str = "Hosts.data";

/// File-type tags the cache manager is told to manage.
const FILE_TYPES: [&str; 10] = [
    "strings_data",
    "sourcetypes_data",
    "sources_data",
    "hosts_data",
    "bucket_info",
    "bfidx",
    "tsidx",
    "bloomfilter",
    "journal_gz",
    "deletes",
];

/// Local directory of one bucket: `{base}/{index}/db/{bucket}`.
pub fn bucket_dir(local_base: &Path, index: &str, bucket: &str) -> PathBuf {
    local_base.join(index).join("db").join(bucket)
}

/// Whether the bucket is materialized in the local restoration path.
pub async fn locally_present(local_base: &Path, index: &str, bucket: &str) -> bool {
    tokio::fs::try_exists(bucket_dir(local_base, index, bucket).join(LOCAL_MARKER_FILE))
        .await
        .unwrap_or(false)
}

/// Write (or overwrite) the cache manifest for one bucket.
///
/// Returns true if the manifest was written, false if the bucket
/// directory does not exist yet - that case is logged and skipped, never
/// fatal.
pub async fn write_local_manifest(
    local_base: &Path,
    index: &str,
    bucket: &str,
) -> std::io::Result<bool> {
    let dir = bucket_dir(local_base, index, bucket);
    if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
        tracing::warn!(
            index = %index,
            bucket = %bucket,
            path = %dir.display(),
            "bucket directory missing, skipping cache manifest write"
        );
        return Ok(false);
    }

    let content = serde_json::to_string_pretty(&json!({ "file_types": FILE_TYPES }))?;
    tokio::fs::write(dir.join(MANIFEST_FILE), content).await?;

    tracing::debug!(
        index = %index,
        bucket = %bucket,
        "wrote cache manifest"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manifest_written_into_existing_bucket_dir() {
        let base = tempfile::tempdir().unwrap();
        let dir = bucket_dir(base.path(), "main", "db_2_1_1_G");
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let written = write_local_manifest(base.path(), "main", "db_2_1_1_G")
            .await
            .unwrap();
        assert!(written);

        let content = tokio::fs::read_to_string(dir.join(MANIFEST_FILE))
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        let types = parsed["file_types"].as_array().unwrap();
        assert_eq!(types.len(), 10);
        assert_eq!(types[0], "strings_data");
        assert_eq!(types[6], "tsidx");
    }

    #[tokio::test]
    async fn manifest_overwrites_prior_content() {
        let base = tempfile::tempdir().unwrap();
        let dir = bucket_dir(base.path(), "main", "db_2_1_1_G");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(MANIFEST_FILE), "stale").await.unwrap();

        assert!(
            write_local_manifest(base.path(), "main", "db_2_1_1_G")
                .await
                .unwrap()
        );
        let content = tokio::fs::read_to_string(dir.join(MANIFEST_FILE))
            .await
            .unwrap();
        assert!(content.contains("file_types"));
    }

    #[tokio::test]
    async fn manifest_skipped_when_bucket_dir_absent() {
        let base = tempfile::tempdir().unwrap();
        let written = write_local_manifest(base.path(), "main", "db_2_1_1_G")
            .await
            .unwrap();
        assert!(!written);
    }

    #[tokio::test]
    async fn local_presence_follows_marker_file() {
        let base = tempfile::tempdir().unwrap();
        let dir = bucket_dir(base.path(), "main", "db_2_1_1_G");
        tokio::fs::create_dir_all(&dir).await.unwrap();

        assert!(!locally_present(base.path(), "main", "db_2_1_1_G").await);
        tokio::fs::write(dir.join(LOCAL_MARKER_FILE), b"").await.unwrap();
        assert!(locally_present(base.path(), "main", "db_2_1_1_G").await);
    }
}
