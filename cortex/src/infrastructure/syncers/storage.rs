// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Storage-side syncers: block-storage pools, share hosts, and bare-machine
//! pools. Plain single-call mirrors without dependencies.

use crate::infrastructure::store::FeatureStore;
use crate::infrastructure::syncers::apis::{BareMetalApi, StorageApi};
use crate::infrastructure::syncers::base::Syncer;
use cortex_bootstrap::CancellationToken;
use cortex_domain::SchedulerError;
use async_trait::async_trait;
use std::sync::Arc;

/// Mirrors the block-storage pool list.
pub struct StoragePoolSyncer {
    api: Arc<dyn StorageApi>,
    store: Arc<FeatureStore>,
}

impl StoragePoolSyncer {
    pub fn new(api: Arc<dyn StorageApi>, store: Arc<FeatureStore>) -> Self {
        Self { api, store }
    }
}

#[async_trait]
impl Syncer for StoragePoolSyncer {
    fn name(&self) -> &str {
        "block-storage-pools"
    }

    async fn init(&self) -> Result<(), SchedulerError> {
        self.store.ensure_schema().await
    }

    async fn sync(&self, _token: &CancellationToken) -> Result<usize, SchedulerError> {
        let pools = self.api.list_storage_pools().await?;
        self.store.replace_all(&pools).await
    }
}

/// Mirrors the share host list.
pub struct ShareHostSyncer {
    api: Arc<dyn StorageApi>,
    store: Arc<FeatureStore>,
}

impl ShareHostSyncer {
    pub fn new(api: Arc<dyn StorageApi>, store: Arc<FeatureStore>) -> Self {
        Self { api, store }
    }
}

#[async_trait]
impl Syncer for ShareHostSyncer {
    fn name(&self) -> &str {
        "share-hosts"
    }

    async fn init(&self) -> Result<(), SchedulerError> {
        self.store.ensure_schema().await
    }

    async fn sync(&self, _token: &CancellationToken) -> Result<usize, SchedulerError> {
        let hosts = self.api.list_share_hosts().await?;
        self.store.replace_all(&hosts).await
    }
}

/// Mirrors the bare-machine pool list.
pub struct MachinePoolSyncer {
    api: Arc<dyn BareMetalApi>,
    store: Arc<FeatureStore>,
}

impl MachinePoolSyncer {
    pub fn new(api: Arc<dyn BareMetalApi>, store: Arc<FeatureStore>) -> Self {
        Self { api, store }
    }
}

#[async_trait]
impl Syncer for MachinePoolSyncer {
    fn name(&self) -> &str {
        "machine-pools"
    }

    async fn init(&self) -> Result<(), SchedulerError> {
        self.store.ensure_schema().await
    }

    async fn sync(&self, _token: &CancellationToken) -> Result<usize, SchedulerError> {
        let pools = self.api.list_machine_pools().await?;
        self.store.replace_all(&pools).await
    }
}
