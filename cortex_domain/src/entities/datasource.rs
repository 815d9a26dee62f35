// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Datasource Record
//!
//! A `Datasource` names an external source to poll and the store to mirror
//! it into. It is created by an operator, mutated only by the syncer
//! reconciler, and garbage-collected by operator delete.
//!
//! ## Readiness
//!
//! A datasource with a non-empty status error is considered not ready and
//! must not satisfy any dependent's readiness; a Knowledge gated on a
//! failing datasource stays pending until the sync recovers.

use crate::entities::meta::ResourceMeta;
use crate::value_objects::ResourceRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind tag selecting the syncer implementation for a datasource.
///
/// The kind determines the single upstream object type this record mirrors
/// and the destination table it replaces on every sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasourceKind {
    ComputeHypervisors,
    ComputeServers,
    ComputeReservations,
    IdentityProjects,
    IdentityCommitments,
    PlacementResourceProviders,
    BlockStoragePools,
    ShareHosts,
    MachinePools,
}

impl std::fmt::Display for DatasourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DatasourceKind::ComputeHypervisors => "compute-hypervisors",
            DatasourceKind::ComputeServers => "compute-servers",
            DatasourceKind::ComputeReservations => "compute-reservations",
            DatasourceKind::IdentityProjects => "identity-projects",
            DatasourceKind::IdentityCommitments => "identity-commitments",
            DatasourceKind::PlacementResourceProviders => "placement-resource-providers",
            DatasourceKind::BlockStoragePools => "block-storage-pools",
            DatasourceKind::ShareHosts => "share-hosts",
            DatasourceKind::MachinePools => "machine-pools",
        };
        f.write_str(s)
    }
}

/// Operator-provided half of a datasource record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasourceSpec {
    pub kind: DatasourceKind,
    /// Kind-specific upstream configuration, opaque to the reconciler.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Credential record for the target store.
    pub secret_ref: ResourceRef,
    /// Logical store identity. All upstreams of one Knowledge must agree.
    pub store: String,
    /// Polling interval in seconds.
    pub sync_interval_secs: u64,
}

/// Reconciler-owned half of a datasource record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasourceStatus {
    pub last_synced: Option<DateTime<Utc>>,
    pub next_due: Option<DateTime<Utc>>,
    pub object_count: u64,
    pub last_duration_ms: u64,
    /// Empty when healthy.
    #[serde(default)]
    pub error: String,
}

/// A declarative record naming an external source and its target store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datasource {
    pub meta: ResourceMeta,
    pub spec: DatasourceSpec,
    #[serde(default)]
    pub status: DatasourceStatus,
}

impl Datasource {
    /// Ready iff the last sync succeeded and no error is recorded.
    pub fn is_ready(&self) -> bool {
        self.status.error.is_empty() && self.status.last_synced.is_some()
    }

    /// Due for a sync at `now`: never synced, past `next_due`, or carrying
    /// an error to recover from.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.status.next_due {
            None => true,
            Some(due) => now >= due,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::ResourceRef;

    fn datasource() -> Datasource {
        Datasource {
            meta: ResourceMeta::new("hypervisors", "monsoon", "cortex"),
            spec: DatasourceSpec {
                kind: DatasourceKind::ComputeHypervisors,
                config: serde_json::Value::Null,
                secret_ref: ResourceRef::new("compute-creds", "monsoon"),
                store: "cortex-db".to_string(),
                sync_interval_secs: 300,
            },
            status: DatasourceStatus::default(),
        }
    }

    #[test]
    fn test_unsynced_datasource_is_not_ready() {
        assert!(!datasource().is_ready());
    }

    #[test]
    fn test_error_makes_datasource_not_ready() {
        let mut ds = datasource();
        ds.status.last_synced = Some(Utc::now());
        assert!(ds.is_ready());

        ds.status.error = "compute API timeout".to_string();
        assert!(!ds.is_ready());
    }

    #[test]
    fn test_due_when_never_synced() {
        assert!(datasource().is_due(Utc::now()));
    }
}
