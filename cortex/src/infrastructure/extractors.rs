// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Feature Extractors
//!
//! SQL-driven feature derivations over the shared store. Each extractor
//! reads the datasource mirror tables, publishes its rows into its own
//! feature table (replace-all, one transaction), and returns the feature
//! list that lands in the Knowledge record's status.
//!
//! Extractors are registered by name, like stages; a Knowledge's
//! `extractor` key resolves here.

pub mod base;
pub mod flavor_runtime;
pub mod histogram;
pub mod host_utilization;
pub mod pool_capacity;
pub mod reservation_cover;
pub mod workload_placement;

use crate::infrastructure::extractors::base::{ExtractorContext, FeatureExtractor};
use cortex_domain::SchedulerError;
use std::collections::HashMap;
use std::sync::Arc;

type ExtractorFactory =
    Box<dyn Fn(&ExtractorContext) -> Result<Arc<dyn FeatureExtractor>, SchedulerError> + Send + Sync>;

/// Name → factory table for extractors.
pub struct ExtractorRegistry {
    factories: HashMap<&'static str, ExtractorFactory>,
}

impl ExtractorRegistry {
    pub fn build(&self, name: &str, context: &ExtractorContext) -> Result<Arc<dyn FeatureExtractor>, SchedulerError> {
        match self.factories.get(name) {
            Some(factory) => factory(context),
            None => Err(SchedulerError::invalid_config(format!("unknown extractor: {name}"))),
        }
    }
}

/// The extractor catalogue.
pub fn extractor_registry() -> ExtractorRegistry {
    let mut factories: HashMap<&'static str, ExtractorFactory> = HashMap::new();
    factories.insert(
        host_utilization::HostUtilizationExtractor::NAME,
        Box::new(|ctx| {
            Ok(Arc::new(host_utilization::HostUtilizationExtractor::new(ctx)?) as Arc<dyn FeatureExtractor>)
        }),
    );
    factories.insert(
        workload_placement::WorkloadPlacementExtractor::NAME,
        Box::new(|ctx| {
            Ok(Arc::new(workload_placement::WorkloadPlacementExtractor::new(ctx)?) as Arc<dyn FeatureExtractor>)
        }),
    );
    factories.insert(
        pool_capacity::PoolCapacityExtractor::NAME,
        Box::new(|ctx| Ok(Arc::new(pool_capacity::PoolCapacityExtractor::new(ctx)?) as Arc<dyn FeatureExtractor>)),
    );
    factories.insert(
        flavor_runtime::FlavorRuntimeExtractor::NAME,
        Box::new(|ctx| Ok(Arc::new(flavor_runtime::FlavorRuntimeExtractor::new(ctx)?) as Arc<dyn FeatureExtractor>)),
    );
    factories.insert(
        reservation_cover::ReservationCoverExtractor::NAME,
        Box::new(|ctx| {
            Ok(Arc::new(reservation_cover::ReservationCoverExtractor::new(ctx)?) as Arc<dyn FeatureExtractor>)
        }),
    );
    ExtractorRegistry { factories }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::FeatureStore;

    #[tokio::test]
    async fn test_unknown_extractor_is_a_configuration_error() {
        let registry = extractor_registry();
        let store = Arc::new(FeatureStore::in_memory().await.unwrap());
        let err = registry
            .build("nope", &ExtractorContext::new(Some(store), serde_json::Value::Null))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_catalogue_builds_every_extractor() {
        let registry = extractor_registry();
        let store = Arc::new(FeatureStore::in_memory().await.unwrap());
        for name in [
            "host_utilization",
            "workload_placement",
            "pool_capacity",
            "flavor_runtime_histogram",
            "reservation_cover",
        ] {
            registry
                .build(name, &ExtractorContext::new(Some(store.clone()), serde_json::Value::Null))
                .unwrap_or_else(|e| panic!("extractor {name} failed to build: {e}"));
        }
    }
}
