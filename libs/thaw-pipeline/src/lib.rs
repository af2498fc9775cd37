// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Frozen bucket migration pipeline
//!
//! This library drives "frozen" index buckets out of a source object store
//! and into the remote cache tier of the host search service. Each bucket
//! moves through a fixed lifecycle recorded in a durable ledger file:
//!
//! 1. `scan` - build the ledger from source-store, sink-store, and
//!    local-disk observations
//! 2. `restore` - rebuild bucket directories locally from their frozen
//!    archives (`todo` -> `pendingupload`)
//! 3. `upload` - register restored buckets with the remote cache manager
//!    (`pendingupload` -> `uploaded`)
//! 4. `check` - wait for remote ingestion and the durable upload receipt
//!    (`uploaded` -> `pendingevict`)
//! 5. `evict` - drop the local copy once the remote one is confirmed
//!    (`pendingevict` -> `done`)
//!
//! Every stage loads the ledger fresh, touches only the records it owns,
//! and writes the file back once, so the pipeline can be re-run
//! idempotently at any stage boundary.

pub mod bucket;
pub mod cacheman;
pub mod config;
pub mod evict;
pub mod ledger;
pub mod manifest;
pub mod poll;
pub mod restore;
pub mod scan;
pub mod stores;
