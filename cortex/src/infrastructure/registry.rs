// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Registries
//!
//! Name → factory tables, one per pipeline kind. The tables are separate on
//! purpose: plugin names may collide across kinds and the request shape
//! differs, so collapsing them into one registry would only trade type
//! safety for a downcast. A Step's `implementation` key is resolved against
//! the registry of its pipeline's kind at assembly time; an unknown key is
//! a configuration error recorded on the pipeline.

use crate::infrastructure::stages::binpack::UtilizationBinpack;
use crate::infrastructure::stages::capacity_balance::{HostCapacityBalance, PoolCapacityBalance};
use crate::infrastructure::stages::evacuation::EvacuationReservation;
use crate::infrastructure::stages::hot_host::HotHostEvictor;
use crate::infrastructure::stages::pool_packing::PoolPacking;
use crate::infrastructure::stages::smallest_host::SmallestHost;
use crate::infrastructure::stages::soft_affinity::SoftAffinity;
use crate::infrastructure::store::FeatureStore;
use cortex_domain::entities::{BareMachineRequest, BlockStorageRequest, ComputeRequest, FileShareRequest};
use cortex_domain::services::{DeschedulerStage, PipelineRequest, SchedulerStage};
use cortex_domain::SchedulerError;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a stage factory gets to work with.
pub struct StageContext {
    /// The shared feature store. Stages that read features treat a missing
    /// store as a hard configuration error.
    pub store: Option<Arc<FeatureStore>>,
    /// The Step's opaque options.
    pub options: serde_json::Value,
}

impl StageContext {
    pub fn new(store: Option<Arc<FeatureStore>>, options: serde_json::Value) -> Self {
        Self { store, options }
    }

    /// The feature store, or a hard error for stages that need one.
    pub fn store(&self) -> Result<&Arc<FeatureStore>, SchedulerError> {
        self.store
            .as_ref()
            .ok_or_else(|| SchedulerError::invalid_config("stage requires a feature store but none was wired"))
    }
}

/// Parses a step's opaque options into the stage's typed options.
///
/// Null or absent options mean defaults; anything else must deserialize
/// cleanly or the stage fails at init, not mid-run.
pub fn parse_options<T>(value: &serde_json::Value) -> Result<T, SchedulerError>
where
    T: DeserializeOwned + Default,
{
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value.clone()).map_err(|e| SchedulerError::invalid_config(format!("bad stage options: {e}")))
}

type StageFactory<R> = Box<dyn Fn(&StageContext) -> Result<Arc<dyn SchedulerStage<R>>, SchedulerError> + Send + Sync>;

/// Name → factory table for one pipeline kind.
pub struct StageRegistry<R: PipelineRequest> {
    kind: &'static str,
    factories: HashMap<&'static str, StageFactory<R>>,
}

impl<R: PipelineRequest> StageRegistry<R> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, factory: StageFactory<R>) {
        self.factories.insert(name, factory);
    }

    /// Instantiates the named stage, or fails with `UnknownStage`.
    pub fn build(&self, name: &str, context: &StageContext) -> Result<Arc<dyn SchedulerStage<R>>, SchedulerError> {
        match self.factories.get(name) {
            Some(factory) => factory(context),
            None => Err(SchedulerError::UnknownStage(format!(
                "{name} is not registered for {} pipelines",
                self.kind
            ))),
        }
    }

    pub fn known_stages(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// The compute catalogue.
pub fn compute_registry() -> StageRegistry<ComputeRequest> {
    let mut registry = StageRegistry::new("compute");
    registry.register(
        UtilizationBinpack::NAME,
        Box::new(|ctx| Ok(Arc::new(UtilizationBinpack::new(ctx)?) as Arc<dyn SchedulerStage<ComputeRequest>>)),
    );
    registry.register(
        SmallestHost::NAME,
        Box::new(|ctx| Ok(Arc::new(SmallestHost::new(ctx)?) as Arc<dyn SchedulerStage<ComputeRequest>>)),
    );
    registry.register(
        SoftAffinity::NAME,
        Box::new(|ctx| Ok(Arc::new(SoftAffinity::new(ctx)?) as Arc<dyn SchedulerStage<ComputeRequest>>)),
    );
    registry.register(
        EvacuationReservation::NAME,
        Box::new(|ctx| Ok(Arc::new(EvacuationReservation::new(ctx)?) as Arc<dyn SchedulerStage<ComputeRequest>>)),
    );
    registry.register(
        HostCapacityBalance::NAME,
        Box::new(|ctx| Ok(Arc::new(HostCapacityBalance::new(ctx)?) as Arc<dyn SchedulerStage<ComputeRequest>>)),
    );
    registry
}

/// The block-storage catalogue.
pub fn block_storage_registry() -> StageRegistry<BlockStorageRequest> {
    let mut registry = StageRegistry::new("block-storage");
    registry.register(
        PoolCapacityBalance::BLOCK_NAME,
        Box::new(|ctx| {
            Ok(Arc::new(PoolCapacityBalance::for_block_storage(ctx)?) as Arc<dyn SchedulerStage<BlockStorageRequest>>)
        }),
    );
    registry
}

/// The file-share catalogue.
pub fn file_share_registry() -> StageRegistry<FileShareRequest> {
    let mut registry = StageRegistry::new("file-share");
    registry.register(
        PoolCapacityBalance::SHARE_NAME,
        Box::new(|ctx| {
            Ok(Arc::new(PoolCapacityBalance::for_file_share(ctx)?) as Arc<dyn SchedulerStage<FileShareRequest>>)
        }),
    );
    registry
}

/// The bare-machine catalogue.
pub fn bare_machine_registry() -> StageRegistry<BareMachineRequest> {
    let mut registry = StageRegistry::new("bare-machine");
    registry.register(
        PoolPacking::NAME,
        Box::new(|ctx| Ok(Arc::new(PoolPacking::new(ctx)?) as Arc<dyn SchedulerStage<BareMachineRequest>>)),
    );
    registry
}

type DeschedulerFactory = Box<dyn Fn(&StageContext) -> Result<Arc<dyn DeschedulerStage>, SchedulerError> + Send + Sync>;

/// Name → factory table for descheduler stages.
pub struct DeschedulerRegistry {
    factories: HashMap<&'static str, DeschedulerFactory>,
}

impl DeschedulerRegistry {
    pub fn build(&self, name: &str, context: &StageContext) -> Result<Arc<dyn DeschedulerStage>, SchedulerError> {
        match self.factories.get(name) {
            Some(factory) => factory(context),
            None => Err(SchedulerError::UnknownStage(format!(
                "{name} is not registered for descheduler pipelines"
            ))),
        }
    }
}

/// The descheduler catalogue.
pub fn descheduler_registry() -> DeschedulerRegistry {
    let mut factories: HashMap<&'static str, DeschedulerFactory> = HashMap::new();
    factories.insert(
        HotHostEvictor::NAME,
        Box::new(|ctx| Ok(Arc::new(HotHostEvictor::new(ctx)?) as Arc<dyn DeschedulerStage>)),
    );
    DeschedulerRegistry { factories }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_stage_name_is_a_configuration_error() {
        let registry = compute_registry();
        let store = Arc::new(FeatureStore::in_memory().await.unwrap());
        let err = registry
            .build("does_not_exist", &StageContext::new(Some(store), serde_json::Value::Null))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownStage(_)));
    }

    #[tokio::test]
    async fn test_compute_catalogue_builds_every_stage() {
        let registry = compute_registry();
        let store = Arc::new(FeatureStore::in_memory().await.unwrap());
        for name in registry.known_stages() {
            registry
                .build(name, &StageContext::new(Some(store.clone()), serde_json::Value::Null))
                .unwrap_or_else(|e| panic!("stage {name} failed to build: {e}"));
        }
    }

    #[tokio::test]
    async fn test_names_do_not_collide_across_kinds() {
        // The block and share catalogues both balance pools but keep their
        // own keys; neither resolves in the compute table.
        let compute = compute_registry();
        let store = Arc::new(FeatureStore::in_memory().await.unwrap());
        let err = compute
            .build(
                PoolCapacityBalance::BLOCK_NAME,
                &StageContext::new(Some(store), serde_json::Value::Null),
            )
            .unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownStage(_)));
    }

    #[test]
    fn test_parse_options_null_means_defaults() {
        #[derive(serde::Deserialize, Default, PartialEq, Debug)]
        struct Opts {
            #[serde(default)]
            limit: u32,
        }
        let opts: Opts = parse_options(&serde_json::Value::Null).unwrap();
        assert_eq!(opts, Opts { limit: 0 });

        let err = parse_options::<Opts>(&serde_json::json!({"limit": "NaN"})).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfiguration(_)));
    }
}
