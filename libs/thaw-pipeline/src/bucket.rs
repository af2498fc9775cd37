// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Bucket naming and derived keys
//!
//! Frozen bucket directories are named
//! `db_<latestTime>_<earliestTime>_<seq>_<originGuid>`. The pipeline only
//! cares about the sequence number and origin GUID, which sit at fixed
//! underscore-delimited positions. Everything the remote service needs is
//! derived from those two fields: the bucket identifier (BID) used on
//! every cache-management call, and the content-addressed sink-store key
//! of the upload receipt.

use sha1::{Digest, Sha1};
use thiserror::Error;

/// Bucket name parse errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BucketNameError {
    #[error("bucket name {0:?} does not match the expected underscore layout")]
    Malformed(String),
}

/// A parsed frozen bucket name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketName {
    raw: String,
    seq: String,
    origin_guid: String,
}

impl BucketName {
    /// Parse a bucket directory name.
    ///
    /// The sequence number is the 4th underscore-delimited token and the
    /// origin GUID the 5th. Anything shorter (or with empty tokens at
    /// those positions) is malformed.
    pub fn parse(raw: &str) -> Result<Self, BucketNameError> {
        let parts: Vec<&str> = raw.split('_').collect();
        if parts.len() < 5 || parts[3].is_empty() || parts[4].is_empty() {
            return Err(BucketNameError::Malformed(raw.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            seq: parts[3].to_string(),
            origin_guid: parts[4].to_string(),
        })
    }

    /// The full bucket directory name.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The numeric sequence position embedded in the name.
    pub fn seq(&self) -> &str {
        &self.seq
    }

    /// The globally unique origin identifier embedded in the name.
    pub fn origin_guid(&self) -> &str {
        &self.origin_guid
    }

    /// The remote bucket identifier used on every cache-management call.
    ///
    /// Never stored in the ledger, always derived.
    pub fn bid(&self, index: &str) -> String {
        format!("{}~{}~{}", index, self.seq, self.origin_guid)
    }

    /// The sink-store key of this bucket's upload receipt.
    pub fn receipt_key(&self, index: &str) -> String {
        receipt_key(index, &self.seq, &self.origin_guid)
    }
}

impl std::fmt::Display for BucketName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Hex SHA-1 digest of `{seq}~{origin_guid}`.
///
/// The remote service shards receipt objects under the first four hex
/// characters of this digest; the same derivation has to be reproduced
/// here byte for byte or receipt lookups miss.
pub fn derive_key(seq: &str, origin_guid: &str) -> String {
    let digest = Sha1::digest(format!("{}~{}", seq, origin_guid).as_bytes());
    format!("{:x}", digest)
}

/// Sink-store key of the upload receipt for one bucket.
///
/// Layout: `{index}/db/{sha[0..2]}/{sha[2..4]}/{seq}~{guid}/receipt.json`.
/// Existence of an object at this key is the authoritative signal that
/// the bucket's remote copy is fully durable.
pub fn receipt_key(index: &str, seq: &str, origin_guid: &str) -> String {
    let sha = derive_key(seq, origin_guid);
    format!(
        "{}/db/{}/{}/{}~{}/receipt.json",
        index,
        &sha[..2],
        &sha[2..4],
        seq,
        origin_guid
    )
}
