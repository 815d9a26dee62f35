// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Syncer Contract
//!
//! A syncer mirrors exactly one upstream object type into the feature
//! store. `init` prepares the destination tables; `sync` fetches the
//! current upstream state, replaces the store's contents for that type in
//! one transaction, and returns the item count.
//!
//! A syncer whose dependency has not been mirrored yet returns the
//! distinguished [`SchedulerError::DependencyNotReady`] waiting error; the
//! datasource reconciler surfaces it as a non-terminal condition and
//! requeues.

use cortex_bootstrap::CancellationToken;
use cortex_domain::SchedulerError;
use async_trait::async_trait;
use std::time::Duration;

/// Pacing sleep between per-parent sub-fetch launches, to avoid stampeding
/// the upstream.
pub const SUBFETCH_PACING: Duration = Duration::from_millis(50);

/// One upstream object type mirrored into the store.
#[async_trait]
pub trait Syncer: Send + Sync {
    /// The datasource kind string this syncer serves.
    fn name(&self) -> &str;

    /// Prepares destination tables. Idempotent.
    async fn init(&self) -> Result<(), SchedulerError>;

    /// Fetches upstream state, replaces the mirror, returns the item count.
    /// Long fan-outs observe the token and abort when it fires.
    async fn sync(&self, token: &CancellationToken) -> Result<usize, SchedulerError>;
}
