// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Datasource Syncers
//!
//! Per-source polling syncers mirroring upstream inventories into the
//! feature store. A Datasource record's kind selects the syncer through
//! [`syncer_for`]; the datasource reconciler drives it on the record's
//! interval.

pub mod apis;
pub mod base;
pub mod compute;
pub mod identity;
pub mod placement;
pub mod storage;

use crate::infrastructure::store::FeatureStore;
use crate::infrastructure::syncers::apis::{BareMetalApi, ComputeApi, IdentityApi, PlacementApi, StorageApi};
use crate::infrastructure::syncers::base::Syncer;
use cortex_domain::entities::DatasourceKind;
use std::sync::Arc;

/// The upstream ports and store handle the syncers share.
#[derive(Clone)]
pub struct SyncerDeps {
    pub store: Arc<FeatureStore>,
    pub compute: Arc<dyn ComputeApi>,
    pub identity: Arc<dyn IdentityApi>,
    pub placement: Arc<dyn PlacementApi>,
    pub storage: Arc<dyn StorageApi>,
    pub bare_metal: Arc<dyn BareMetalApi>,
}

/// Instantiates the syncer serving one datasource kind.
pub fn syncer_for(kind: DatasourceKind, deps: &SyncerDeps) -> Arc<dyn Syncer> {
    match kind {
        DatasourceKind::ComputeHypervisors => {
            Arc::new(compute::HypervisorSyncer::new(deps.compute.clone(), deps.store.clone()))
        }
        DatasourceKind::ComputeServers => {
            Arc::new(compute::ServerSyncer::new(deps.compute.clone(), deps.store.clone()))
        }
        DatasourceKind::ComputeReservations => {
            Arc::new(compute::ReservationSyncer::new(deps.compute.clone(), deps.store.clone()))
        }
        DatasourceKind::IdentityProjects => {
            Arc::new(identity::ProjectSyncer::new(deps.identity.clone(), deps.store.clone()))
        }
        DatasourceKind::IdentityCommitments => {
            Arc::new(identity::CommitmentSyncer::new(deps.identity.clone(), deps.store.clone()))
        }
        DatasourceKind::PlacementResourceProviders => Arc::new(placement::ResourceProviderSyncer::new(
            deps.placement.clone(),
            deps.store.clone(),
        )),
        DatasourceKind::BlockStoragePools => {
            Arc::new(storage::StoragePoolSyncer::new(deps.storage.clone(), deps.store.clone()))
        }
        DatasourceKind::ShareHosts => {
            Arc::new(storage::ShareHostSyncer::new(deps.storage.clone(), deps.store.clone()))
        }
        DatasourceKind::MachinePools => {
            Arc::new(storage::MachinePoolSyncer::new(deps.bare_metal.clone(), deps.store.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::syncers::apis::StaticUpstream;

    #[tokio::test]
    async fn test_every_kind_resolves_to_a_syncer() {
        let store = Arc::new(FeatureStore::in_memory().await.unwrap());
        let upstream = Arc::new(StaticUpstream::default());
        let deps = SyncerDeps {
            store,
            compute: upstream.clone(),
            identity: upstream.clone(),
            placement: upstream.clone(),
            storage: upstream.clone(),
            bare_metal: upstream,
        };
        for kind in [
            DatasourceKind::ComputeHypervisors,
            DatasourceKind::ComputeServers,
            DatasourceKind::ComputeReservations,
            DatasourceKind::IdentityProjects,
            DatasourceKind::IdentityCommitments,
            DatasourceKind::PlacementResourceProviders,
            DatasourceKind::BlockStoragePools,
            DatasourceKind::ShareHosts,
            DatasourceKind::MachinePools,
        ] {
            let syncer = syncer_for(kind, &deps);
            assert_eq!(syncer.name(), kind.to_string());
        }
    }
}
