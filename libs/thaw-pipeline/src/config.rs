// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Pipeline configuration

use std::path::PathBuf;

use crate::cacheman::DEFAULT_HTTP_TIMEOUT_SECS;
use crate::ledger::LEDGER_FILE;
use crate::poll::DEFAULT_POLL_INTERVAL_SECS;
use crate::restore::DEFAULT_POOL_WIDTH;

/// Default management URL of the host service.
const DEFAULT_REMOTE_URL: &str = "https://localhost:8089";

/// Default management user.
const DEFAULT_REMOTE_USER: &str = "admin";

/// Default local restoration path (the host service's index store).
const DEFAULT_LOCAL_BASE: &str = "/opt/splunk/var/lib/splunk";

/// Default external restoration script.
const DEFAULT_RESTORE_SCRIPT: &str = "./process_bucket.sh";

/// Default number of buckets restored per run.
const DEFAULT_BUCKETS_PER_RUN: usize = 10;

/// Pipeline configuration, loaded from `THAW_*` environment variables
/// with CLI flags layered on top by the caller.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Base URL of the remote cache-management service.
    pub remote_url: String,
    /// Management credential pair.
    pub remote_user: String,
    pub remote_password: String,
    /// Root of the (mounted) source store holding frozen archives.
    pub source_root: PathBuf,
    /// Listing prefix within the source store.
    pub source_prefix: String,
    /// Root of the (mounted) sink store holding upload receipts.
    pub sink_root: PathBuf,
    /// Local restoration path.
    pub local_base: PathBuf,
    /// Ledger file location.
    pub ledger_path: PathBuf,
    /// External restoration script.
    pub restore_script: PathBuf,
    /// Restoration worker-pool width.
    pub pool_width: usize,
    /// Buckets restored per run.
    pub buckets_per_run: usize,
    /// Target index; None auto-selects the first index with a todo record.
    pub target_index: Option<String>,
    /// Delay between completion polls.
    pub poll_interval_secs: u64,
    /// Per-record completion deadline; None waits forever.
    pub poll_deadline_secs: Option<u64>,
    /// HTTP timeout for cacheman calls.
    pub http_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            remote_user: DEFAULT_REMOTE_USER.to_string(),
            remote_password: String::new(),
            source_root: PathBuf::from("."),
            source_prefix: String::new(),
            sink_root: PathBuf::from("."),
            local_base: PathBuf::from(DEFAULT_LOCAL_BASE),
            ledger_path: PathBuf::from(LEDGER_FILE),
            restore_script: PathBuf::from(DEFAULT_RESTORE_SCRIPT),
            pool_width: DEFAULT_POOL_WIDTH,
            buckets_per_run: DEFAULT_BUCKETS_PER_RUN,
            target_index: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            poll_deadline_secs: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            remote_url: env_string("THAW_REMOTE_URL").unwrap_or(defaults.remote_url),
            remote_user: env_string("THAW_REMOTE_USER").unwrap_or(defaults.remote_user),
            remote_password: env_string("THAW_REMOTE_PASSWORD")
                .unwrap_or(defaults.remote_password),
            source_root: env_path("THAW_SOURCE_ROOT").unwrap_or(defaults.source_root),
            source_prefix: env_string("THAW_SOURCE_PREFIX").unwrap_or(defaults.source_prefix),
            sink_root: env_path("THAW_SINK_ROOT").unwrap_or(defaults.sink_root),
            local_base: env_path("THAW_LOCAL_BASE").unwrap_or(defaults.local_base),
            ledger_path: env_path("THAW_LEDGER").unwrap_or(defaults.ledger_path),
            restore_script: env_path("THAW_RESTORE_SCRIPT").unwrap_or(defaults.restore_script),
            pool_width: env_parse("THAW_POOL_WIDTH").unwrap_or(defaults.pool_width),
            buckets_per_run: env_parse("THAW_BUCKETS_PER_RUN").unwrap_or(defaults.buckets_per_run),
            target_index: env_string("THAW_INDEX"),
            poll_interval_secs: env_parse("THAW_POLL_INTERVAL_SECS")
                .unwrap_or(defaults.poll_interval_secs),
            poll_deadline_secs: env_parse("THAW_POLL_DEADLINE_SECS"),
            http_timeout_secs: env_parse("THAW_HTTP_TIMEOUT_SECS")
                .unwrap_or(defaults.http_timeout_secs),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    // `from_env()` itself is not driven through set_var here: in edition
    // 2024 mutating the process environment is unsafe and races with
    // parallel tests. The default values are what matter.

    #[test]
    fn default_config_has_sensible_values() {
        let config = PipelineConfig::default();

        assert_eq!(config.remote_url, "https://localhost:8089");
        assert_eq!(config.remote_user, "admin");
        assert_eq!(config.ledger_path, PathBuf::from("bucket_structure.json"));
        assert_eq!(config.pool_width, 10);
        assert_eq!(config.buckets_per_run, 10);
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.poll_deadline_secs, None);
        assert_eq!(config.target_index, None);
    }
}
