// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Placement Syncer
//!
//! Mirrors resource providers and their per-provider traits and
//! inventories. The per-parent sub-fetches run concurrently with a small
//! pacing sleep between launches; the first failure aborts everything
//! outstanding, and cancellation is observed between launches and joins.

use crate::infrastructure::store::FeatureStore;
use crate::infrastructure::syncers::apis::{PlacementApi, ProviderInventory, ProviderTrait};
use crate::infrastructure::syncers::base::{Syncer, SUBFETCH_PACING};
use cortex_bootstrap::CancellationToken;
use cortex_domain::SchedulerError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Mirrors resource providers plus their traits and inventories.
pub struct ResourceProviderSyncer {
    api: Arc<dyn PlacementApi>,
    store: Arc<FeatureStore>,
}

impl ResourceProviderSyncer {
    pub fn new(api: Arc<dyn PlacementApi>, store: Arc<FeatureStore>) -> Self {
        Self { api, store }
    }
}

#[async_trait]
impl Syncer for ResourceProviderSyncer {
    fn name(&self) -> &str {
        "placement-resource-providers"
    }

    async fn init(&self) -> Result<(), SchedulerError> {
        self.store.ensure_schema().await
    }

    async fn sync(&self, token: &CancellationToken) -> Result<usize, SchedulerError> {
        let providers = self.api.list_resource_providers().await?;

        let mut fetches: JoinSet<Result<(Vec<ProviderTrait>, Vec<ProviderInventory>), SchedulerError>> =
            JoinSet::new();
        for provider in &providers {
            if token.is_cancelled() {
                fetches.abort_all();
                return Err(SchedulerError::Cancelled("provider sub-fetch fan-out".to_string()));
            }
            let api = self.api.clone();
            let provider_id = provider.id.clone();
            fetches.spawn(async move {
                let traits = api.list_provider_traits(&provider_id).await?;
                let inventories = api.list_provider_inventories(&provider_id).await?;
                Ok((traits, inventories))
            });
            tokio::time::sleep(SUBFETCH_PACING).await;
        }

        let mut traits = Vec::new();
        let mut inventories = Vec::new();
        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok(Ok((t, i))) => {
                    traits.extend(t);
                    inventories.extend(i);
                }
                Ok(Err(e)) => {
                    fetches.abort_all();
                    return Err(e);
                }
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    fetches.abort_all();
                    return Err(SchedulerError::internal_error(format!("sub-fetch task failed: {e}")));
                }
            }
        }

        let count = self.store.replace_all(&providers).await?;
        self.store.replace_all(&traits).await?;
        self.store.replace_all(&inventories).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::syncers::apis::{ResourceProvider, StaticUpstream, UpstreamSnapshot};
    use async_trait::async_trait;

    fn provider(id: &str) -> ResourceProvider {
        ResourceProvider {
            id: id.to_string(),
            name: format!("provider-{id}"),
        }
    }

    #[tokio::test]
    async fn test_fans_out_per_provider() {
        let store = Arc::new(FeatureStore::in_memory().await.unwrap());
        store.ensure_schema().await.unwrap();
        let upstream = Arc::new(StaticUpstream::new(UpstreamSnapshot {
            resource_providers: vec![provider("rp1"), provider("rp2")],
            provider_traits: vec![
                ProviderTrait {
                    provider_id: "rp1".to_string(),
                    trait_name: "COMPUTE_VOLUME_MULTI_ATTACH".to_string(),
                },
                ProviderTrait {
                    provider_id: "rp2".to_string(),
                    trait_name: "HW_CPU_X86_AVX2".to_string(),
                },
            ],
            provider_inventories: vec![ProviderInventory {
                provider_id: "rp1".to_string(),
                resource: "VCPU".to_string(),
                total: 96,
                used: 12,
                reserved: 4,
                allocation_ratio: 4.0,
            }],
            ..Default::default()
        }));

        let syncer = ResourceProviderSyncer::new(upstream, store.clone());
        let count = syncer.sync(&CancellationToken::default()).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.count("provider_traits").await.unwrap(), 2);
        assert_eq!(store.count("provider_inventories").await.unwrap(), 1);
    }

    struct FailingPlacement;

    #[async_trait]
    impl PlacementApi for FailingPlacement {
        async fn list_resource_providers(&self) -> Result<Vec<ResourceProvider>, SchedulerError> {
            Ok(vec![provider("rp1"), provider("rp2")])
        }

        async fn list_provider_traits(&self, provider_id: &str) -> Result<Vec<ProviderTrait>, SchedulerError> {
            if provider_id == "rp1" {
                Err(SchedulerError::upstream_unavailable("placement timeout"))
            } else {
                Ok(vec![])
            }
        }

        async fn list_provider_inventories(&self, _provider_id: &str) -> Result<Vec<ProviderInventory>, SchedulerError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_first_error_aborts_and_writes_nothing() {
        let store = Arc::new(FeatureStore::in_memory().await.unwrap());
        store.ensure_schema().await.unwrap();
        let syncer = ResourceProviderSyncer::new(Arc::new(FailingPlacement), store.clone());

        let err = syncer.sync(&CancellationToken::default()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.count("resource_providers").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_fan_out() {
        let store = Arc::new(FeatureStore::in_memory().await.unwrap());
        store.ensure_schema().await.unwrap();
        let upstream = Arc::new(StaticUpstream::new(UpstreamSnapshot {
            resource_providers: vec![provider("rp1")],
            ..Default::default()
        }));
        let syncer = ResourceProviderSyncer::new(upstream, store);

        let token = CancellationToken::default();
        token.cancel();
        let err = syncer.sync(&token).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Cancelled(_)));
    }
}
