// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Remote cache-management client
//!
//! Client for the host service's cacheman admin REST surface. Registering
//! a restored bucket with the remote tier is a strict three-call sequence
//! (initialize, attach, close), each keyed by the derived BID; only full
//! success promotes a ledger record to `uploaded`. Any non-200 response
//! is a per-record failure, logged and retried on a later run.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::bucket::BucketName;
use crate::ledger::{Ledger, LedgerError, Status};

/// Default cacheman request timeout.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Cacheman call errors
#[derive(Debug, Error)]
pub enum CachemanError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{call} for {bid} returned {status}")]
    Rejected {
        call: &'static str,
        bid: String,
        status: reqwest::StatusCode,
    },
}

/// Remote upload/caching state of one bucket, as reported by the
/// service's oneshot search. Both fields are absent when the service
/// has no cacheman entry for the BID yet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BucketStatus {
    pub upload_status: Option<String>,
    pub bucket_status: Option<String>,
}

impl BucketStatus {
    /// The upload worker has gone idle, i.e. nothing left to push.
    pub fn is_idle(&self) -> bool {
        self.upload_status.as_deref() == Some("idle")
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    #[serde(default)]
    title: String,
    #[serde(rename = "cm:bucket.upload_status")]
    upload_status: Option<String>,
    #[serde(rename = "cm:bucket.status")]
    bucket_status: Option<String>,
}

/// Authenticated client for the cacheman admin endpoints.
pub struct CachemanClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl CachemanClient {
    /// Build a client for the management endpoint.
    ///
    /// Certificate verification is disabled: the management port speaks
    /// TLS with a self-signed certificate and is only ever reached over
    /// localhost or a trusted network.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CachemanError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
        })
    }

    async fn post_form(
        &self,
        call: &'static str,
        bid: &str,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<reqwest::Response, CachemanError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                call = call,
                bid = %bid,
                status = %status,
                body = %body,
                "cacheman call rejected"
            );
            return Err(CachemanError::Rejected {
                call,
                bid: bid.to_string(),
                status,
            });
        }

        Ok(response)
    }

    /// Initialize the bucket in the remote cache manager.
    pub async fn initialize(&self, bid: &str) -> Result<(), CachemanError> {
        let path = format!("/services/admin/cacheman/bid|{}|", bid);
        self.post_form("initialize", bid, &path, &[("sid", bid)])
            .await?;
        Ok(())
    }

    /// Attach the local bucket directory to the cacheman entry.
    pub async fn attach(&self, bid: &str) -> Result<(), CachemanError> {
        let path = format!("/services/admin/cacheman/bid|{}|/attach", bid);
        self.post_form("attach", bid, &path, &[("sid", bid), ("directory", "")])
            .await?;
        Ok(())
    }

    /// Close the cacheman entry, kicking off the remote upload.
    pub async fn close(&self, bid: &str) -> Result<(), CachemanError> {
        let path = format!("/services/admin/cacheman/bid|{}|/close", bid);
        self.post_form("close", bid, &path, &[("sid", bid)]).await?;
        Ok(())
    }

    /// Evict the local copy of a bucket whose remote copy is durable.
    pub async fn evict(&self, bid: &str) -> Result<(), CachemanError> {
        let path = format!("/services/admin/cacheman/bid|{}|/evict", bid);
        self.post_form("evict", bid, &path, &[("output_mode", "json")])
            .await?;
        Ok(())
    }

    /// Full registration sequence for one bucket.
    ///
    /// The three calls must each succeed before the next is attempted;
    /// the first failure aborts the sequence.
    pub async fn promote(&self, bid: &str) -> Result<(), CachemanError> {
        self.initialize(bid).await?;
        self.attach(bid).await?;
        self.close(bid).await?;
        Ok(())
    }

    /// Query the remote upload/caching status of one bucket via the
    /// service's oneshot search endpoint.
    pub async fn bucket_status(&self, bid: &str) -> Result<BucketStatus, CachemanError> {
        let query = format!(
            "|rest /services/admin/cacheman/ | search title=\"bid|{}|\" | table title cm:bucket.upload_status cm:bucket.status",
            bid
        );
        let response = self
            .post_form(
                "status",
                bid,
                "/services/search/jobs",
                &[
                    ("search", query.as_str()),
                    ("output_mode", "json"),
                    ("exec_mode", "oneshot"),
                ],
            )
            .await?;

        let parsed: SearchResponse = response.json().await?;
        let wanted = format!("bid|{}|", bid);
        for entry in parsed.results {
            if entry.title == wanted {
                return Ok(BucketStatus {
                    upload_status: entry.upload_status,
                    bucket_status: entry.bucket_status,
                });
            }
        }

        Ok(BucketStatus::default())
    }
}

/// Outcome counts of one promotion batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromoteSummary {
    pub promoted: usize,
    pub failed: usize,
}

/// Register every `pendingupload` bucket with the remote cache tier.
///
/// Unlike restoration this walks all indexes, not one. A record only
/// becomes `uploaded` after the full three-call sequence succeeds; a
/// failure leaves it `pendingupload` for a later run and never blocks
/// the other records in the batch. The ledger is written once, and only
/// if something transitioned.
pub async fn promote_pending(
    client: &CachemanClient,
    ledger_path: &Path,
) -> Result<PromoteSummary, LedgerError> {
    let mut ledger = Ledger::load(ledger_path).await?;
    let pending = ledger.records_with_status(Status::Pendingupload);

    let mut summary = PromoteSummary {
        promoted: 0,
        failed: 0,
    };

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

        match client.promote(&bid).await {
            Ok(()) => {
                tracing::info!(
                    bid = %bid,
                    from = %Status::Pendingupload,
                    to = %Status::Uploaded,
                    "bucket registered with remote cache tier"
                );
                ledger.set_status(&index, &record.bucket, Status::Uploaded);
                summary.promoted += 1;
            }
            Err(e) => {
                tracing::warn!(
                    bid = %bid,
                    error = %e,
                    "bucket promotion failed, leaving pendingupload"
                );
                summary.failed += 1;
            }
        }
    }

    if summary.promoted > 0 {
        ledger.save(ledger_path).await?;
    }
    Ok(summary)
}
