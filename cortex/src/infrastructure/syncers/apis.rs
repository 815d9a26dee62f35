// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upstream API Ports
//!
//! Narrow async ports in front of the upstream services the syncers poll.
//! The concrete protocol clients (HTTP, auth, retries on the wire) are
//! external collaborators; everything behind these traits is replaceable,
//! and tests plug in the in-memory [`StaticUpstream`].
//!
//! The wire structs double as store records: each one knows its mirror
//! table and how to bind itself onto the insert statement.

use crate::infrastructure::store::StoreRecord;
use chrono::{DateTime, Utc};
use cortex_domain::SchedulerError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;

/// One hypervisor as reported by the compute service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypervisor {
    pub name: String,
    pub kind: String,
    pub state: String,
    pub vcpus_total: i64,
    pub vcpus_used: i64,
    pub memory_mb_total: i64,
    pub memory_mb_used: i64,
    pub disk_gb_total: i64,
    pub disk_gb_used: i64,
}

impl StoreRecord for Hypervisor {
    const TABLE: &'static str = "hypervisors";
    const INSERT: &'static str = "INSERT INTO hypervisors (name, kind, state, vcpus_total, vcpus_used, \
         memory_mb_total, memory_mb_used, disk_gb_total, disk_gb_used) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(&self.name)
            .bind(&self.kind)
            .bind(&self.state)
            .bind(self.vcpus_total)
            .bind(self.vcpus_used)
            .bind(self.memory_mb_total)
            .bind(self.memory_mb_used)
            .bind(self.disk_gb_total)
            .bind(self.disk_gb_used)
    }
}

/// One server instance as reported by the compute service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub uuid: String,
    pub name: String,
    pub project_id: String,
    pub host: String,
    pub flavor: String,
    pub vcpus: i64,
    pub memory_mb: i64,
    pub created_at: DateTime<Utc>,
}

impl StoreRecord for Server {
    const TABLE: &'static str = "servers";
    const INSERT: &'static str = "INSERT INTO servers (uuid, name, project_id, host, flavor, vcpus, memory_mb, \
         created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(&self.uuid)
            .bind(&self.name)
            .bind(&self.project_id)
            .bind(&self.host)
            .bind(&self.flavor)
            .bind(self.vcpus)
            .bind(self.memory_mb)
            .bind(self.created_at.to_rfc3339())
    }
}

/// One failover reservation held for a workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub uuid: String,
    pub workload: String,
    pub host: String,
    pub ready: bool,
    pub vcpus: i64,
    pub memory_mb: i64,
}

impl StoreRecord for Reservation {
    const TABLE: &'static str = "reservations";
    const INSERT: &'static str =
        "INSERT INTO reservations (uuid, workload, host, ready, vcpus, memory_mb) VALUES (?, ?, ?, ?, ?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(&self.uuid)
            .bind(&self.workload)
            .bind(&self.host)
            .bind(self.ready as i64)
            .bind(self.vcpus)
            .bind(self.memory_mb)
    }
}

/// One project known to the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub domain_id: String,
}

impl StoreRecord for Project {
    const TABLE: &'static str = "projects";
    const INSERT: &'static str = "INSERT INTO projects (id, name, domain_id) VALUES (?, ?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query.bind(&self.id).bind(&self.name).bind(&self.domain_id)
    }
}

/// One resource commitment of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commitment {
    pub id: String,
    pub project_id: String,
    pub resource: String,
    pub amount: i64,
}

impl StoreRecord for Commitment {
    const TABLE: &'static str = "commitments";
    const INSERT: &'static str = "INSERT INTO commitments (id, project_id, resource, amount) VALUES (?, ?, ?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(&self.id)
            .bind(&self.project_id)
            .bind(&self.resource)
            .bind(self.amount)
    }
}

/// One placement resource provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceProvider {
    pub id: String,
    pub name: String,
}

impl StoreRecord for ResourceProvider {
    const TABLE: &'static str = "resource_providers";
    const INSERT: &'static str = "INSERT INTO resource_providers (id, name) VALUES (?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query.bind(&self.id).bind(&self.name)
    }
}

/// One trait attached to a resource provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTrait {
    pub provider_id: String,
    pub trait_name: String,
}

impl StoreRecord for ProviderTrait {
    const TABLE: &'static str = "provider_traits";
    const INSERT: &'static str = "INSERT INTO provider_traits (provider_id, trait_name) VALUES (?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query.bind(&self.provider_id).bind(&self.trait_name)
    }
}

/// One inventory of one resource class on a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInventory {
    pub provider_id: String,
    pub resource: String,
    pub total: i64,
    pub used: i64,
    pub reserved: i64,
    pub allocation_ratio: f64,
}

impl StoreRecord for ProviderInventory {
    const TABLE: &'static str = "provider_inventories";
    const INSERT: &'static str = "INSERT INTO provider_inventories (provider_id, resource, total, used, reserved, \
         allocation_ratio) VALUES (?, ?, ?, ?, ?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(&self.provider_id)
            .bind(&self.resource)
            .bind(self.total)
            .bind(self.used)
            .bind(self.reserved)
            .bind(self.allocation_ratio)
    }
}

/// One block-storage pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoragePool {
    pub name: String,
    pub backend: String,
    pub capacity_gb: f64,
    pub free_gb: f64,
}

impl StoreRecord for StoragePool {
    const TABLE: &'static str = "storage_pools";
    const INSERT: &'static str =
        "INSERT INTO storage_pools (name, backend, capacity_gb, free_gb) VALUES (?, ?, ?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(&self.name)
            .bind(&self.backend)
            .bind(self.capacity_gb)
            .bind(self.free_gb)
    }
}

/// One file-share host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareHost {
    pub name: String,
    pub capacity_gb: f64,
    pub free_gb: f64,
}

impl StoreRecord for ShareHost {
    const TABLE: &'static str = "share_hosts";
    const INSERT: &'static str = "INSERT INTO share_hosts (name, capacity_gb, free_gb) VALUES (?, ?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query.bind(&self.name).bind(self.capacity_gb).bind(self.free_gb)
    }
}

/// One bare-machine pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachinePool {
    pub name: String,
    pub size: String,
    pub capacity: i64,
    pub allocated: i64,
}

impl StoreRecord for MachinePool {
    const TABLE: &'static str = "machine_pools";
    const INSERT: &'static str = "INSERT INTO machine_pools (name, size, capacity, allocated) VALUES (?, ?, ?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(&self.name)
            .bind(&self.size)
            .bind(self.capacity)
            .bind(self.allocated)
    }
}

/// Compute service port.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn list_hypervisors(&self) -> Result<Vec<Hypervisor>, SchedulerError>;
    async fn list_servers(&self) -> Result<Vec<Server>, SchedulerError>;
    async fn list_reservations(&self) -> Result<Vec<Reservation>, SchedulerError>;
}

/// Identity service port.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, SchedulerError>;
    async fn list_commitments(&self) -> Result<Vec<Commitment>, SchedulerError>;
}

/// Placement service port.
#[async_trait]
pub trait PlacementApi: Send + Sync {
    async fn list_resource_providers(&self) -> Result<Vec<ResourceProvider>, SchedulerError>;
    async fn list_provider_traits(&self, provider_id: &str) -> Result<Vec<ProviderTrait>, SchedulerError>;
    async fn list_provider_inventories(&self, provider_id: &str) -> Result<Vec<ProviderInventory>, SchedulerError>;
}

/// Block-storage and share service port.
#[async_trait]
pub trait StorageApi: Send + Sync {
    async fn list_storage_pools(&self) -> Result<Vec<StoragePool>, SchedulerError>;
    async fn list_share_hosts(&self) -> Result<Vec<ShareHost>, SchedulerError>;
}

/// Bare-metal service port.
#[async_trait]
pub trait BareMetalApi: Send + Sync {
    async fn list_machine_pools(&self) -> Result<Vec<MachinePool>, SchedulerError>;
}

/// In-memory snapshot of every upstream, implementing all five ports.
///
/// Used for local runs (loaded from a YAML snapshot) and tests. The
/// snapshot is mutable behind a lock so tests can change the world between
/// syncs.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpstreamSnapshot {
    #[serde(default)]
    pub hypervisors: Vec<Hypervisor>,
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub reservations: Vec<Reservation>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub commitments: Vec<Commitment>,
    #[serde(default)]
    pub resource_providers: Vec<ResourceProvider>,
    #[serde(default)]
    pub provider_traits: Vec<ProviderTrait>,
    #[serde(default)]
    pub provider_inventories: Vec<ProviderInventory>,
    #[serde(default)]
    pub storage_pools: Vec<StoragePool>,
    #[serde(default)]
    pub share_hosts: Vec<ShareHost>,
    #[serde(default)]
    pub machine_pools: Vec<MachinePool>,
}

/// Static upstream serving a [`UpstreamSnapshot`].
#[derive(Default)]
pub struct StaticUpstream {
    snapshot: RwLock<UpstreamSnapshot>,
}

impl StaticUpstream {
    pub fn new(snapshot: UpstreamSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self, SchedulerError> {
        let snapshot: UpstreamSnapshot = serde_yaml::from_str(text)
            .map_err(|e| SchedulerError::invalid_config(format!("bad upstream snapshot: {e}")))?;
        Ok(Self::new(snapshot))
    }

    /// Replaces the snapshot; the next sync sees the new world.
    pub fn set(&self, snapshot: UpstreamSnapshot) {
        *self.snapshot.write() = snapshot;
    }
}

#[async_trait]
impl ComputeApi for StaticUpstream {
    async fn list_hypervisors(&self) -> Result<Vec<Hypervisor>, SchedulerError> {
        Ok(self.snapshot.read().hypervisors.clone())
    }

    async fn list_servers(&self) -> Result<Vec<Server>, SchedulerError> {
        Ok(self.snapshot.read().servers.clone())
    }

    async fn list_reservations(&self) -> Result<Vec<Reservation>, SchedulerError> {
        Ok(self.snapshot.read().reservations.clone())
    }
}

#[async_trait]
impl IdentityApi for StaticUpstream {
    async fn list_projects(&self) -> Result<Vec<Project>, SchedulerError> {
        Ok(self.snapshot.read().projects.clone())
    }

    async fn list_commitments(&self) -> Result<Vec<Commitment>, SchedulerError> {
        Ok(self.snapshot.read().commitments.clone())
    }
}

#[async_trait]
impl PlacementApi for StaticUpstream {
    async fn list_resource_providers(&self) -> Result<Vec<ResourceProvider>, SchedulerError> {
        Ok(self.snapshot.read().resource_providers.clone())
    }

    async fn list_provider_traits(&self, provider_id: &str) -> Result<Vec<ProviderTrait>, SchedulerError> {
        Ok(self
            .snapshot
            .read()
            .provider_traits
            .iter()
            .filter(|t| t.provider_id == provider_id)
            .cloned()
            .collect())
    }

    async fn list_provider_inventories(&self, provider_id: &str) -> Result<Vec<ProviderInventory>, SchedulerError> {
        Ok(self
            .snapshot
            .read()
            .provider_inventories
            .iter()
            .filter(|i| i.provider_id == provider_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StorageApi for StaticUpstream {
    async fn list_storage_pools(&self) -> Result<Vec<StoragePool>, SchedulerError> {
        Ok(self.snapshot.read().storage_pools.clone())
    }

    async fn list_share_hosts(&self) -> Result<Vec<ShareHost>, SchedulerError> {
        Ok(self.snapshot.read().share_hosts.clone())
    }
}

#[async_trait]
impl BareMetalApi for StaticUpstream {
    async fn list_machine_pools(&self) -> Result<Vec<MachinePool>, SchedulerError> {
        Ok(self.snapshot.read().machine_pools.clone())
    }
}
