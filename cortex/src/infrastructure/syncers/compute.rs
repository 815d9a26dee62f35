// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Compute-service syncers: hypervisors, servers, and failover
//! reservations. Each mirrors one list call into its table; no
//! dependencies between them.

use crate::infrastructure::store::FeatureStore;
use crate::infrastructure::syncers::apis::ComputeApi;
use crate::infrastructure::syncers::base::Syncer;
use cortex_bootstrap::CancellationToken;
use cortex_domain::SchedulerError;
use async_trait::async_trait;
use std::sync::Arc;

/// Mirrors the hypervisor inventory.
pub struct HypervisorSyncer {
    api: Arc<dyn ComputeApi>,
    store: Arc<FeatureStore>,
}

impl HypervisorSyncer {
    pub fn new(api: Arc<dyn ComputeApi>, store: Arc<FeatureStore>) -> Self {
        Self { api, store }
    }
}

#[async_trait]
impl Syncer for HypervisorSyncer {
    fn name(&self) -> &str {
        "compute-hypervisors"
    }

    async fn init(&self) -> Result<(), SchedulerError> {
        self.store.ensure_schema().await
    }

    async fn sync(&self, _token: &CancellationToken) -> Result<usize, SchedulerError> {
        let hypervisors = self.api.list_hypervisors().await?;
        self.store.replace_all(&hypervisors).await
    }
}

/// Mirrors the server inventory.
pub struct ServerSyncer {
    api: Arc<dyn ComputeApi>,
    store: Arc<FeatureStore>,
}

impl ServerSyncer {
    pub fn new(api: Arc<dyn ComputeApi>, store: Arc<FeatureStore>) -> Self {
        Self { api, store }
    }
}

#[async_trait]
impl Syncer for ServerSyncer {
    fn name(&self) -> &str {
        "compute-servers"
    }

    async fn init(&self) -> Result<(), SchedulerError> {
        self.store.ensure_schema().await
    }

    async fn sync(&self, _token: &CancellationToken) -> Result<usize, SchedulerError> {
        let servers = self.api.list_servers().await?;
        self.store.replace_all(&servers).await
    }
}

/// Mirrors the failover reservations.
pub struct ReservationSyncer {
    api: Arc<dyn ComputeApi>,
    store: Arc<FeatureStore>,
}

impl ReservationSyncer {
    pub fn new(api: Arc<dyn ComputeApi>, store: Arc<FeatureStore>) -> Self {
        Self { api, store }
    }
}

#[async_trait]
impl Syncer for ReservationSyncer {
    fn name(&self) -> &str {
        "compute-reservations"
    }

    async fn init(&self) -> Result<(), SchedulerError> {
        self.store.ensure_schema().await
    }

    async fn sync(&self, _token: &CancellationToken) -> Result<usize, SchedulerError> {
        let reservations = self.api.list_reservations().await?;
        self.store.replace_all(&reservations).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::syncers::apis::{Hypervisor, StaticUpstream, UpstreamSnapshot};

    fn hypervisor(name: &str) -> Hypervisor {
        Hypervisor {
            name: name.to_string(),
            kind: "qemu".to_string(),
            state: "up".to_string(),
            vcpus_total: 96,
            vcpus_used: 10,
            memory_mb_total: 256_000,
            memory_mb_used: 32_000,
            disk_gb_total: 4_000,
            disk_gb_used: 500,
        }
    }

    #[tokio::test]
    async fn test_sync_replaces_the_mirror() {
        let store = Arc::new(FeatureStore::in_memory().await.unwrap());
        let upstream = Arc::new(StaticUpstream::new(UpstreamSnapshot {
            hypervisors: vec![hypervisor("h1"), hypervisor("h2")],
            ..Default::default()
        }));
        let syncer = HypervisorSyncer::new(upstream.clone(), store.clone());
        syncer.init().await.unwrap();

        let token = CancellationToken::default();
        assert_eq!(syncer.sync(&token).await.unwrap(), 2);
        assert_eq!(store.count("hypervisors").await.unwrap(), 2);

        // Upstream shrinks; the mirror follows.
        upstream.set(UpstreamSnapshot {
            hypervisors: vec![hypervisor("h1")],
            ..Default::default()
        });
        assert_eq!(syncer.sync(&token).await.unwrap(), 1);
        assert_eq!(store.count("hypervisors").await.unwrap(), 1);
    }
}
