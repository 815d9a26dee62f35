// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Feature Store
//!
//! The shared SQLite store every syncer writes into and every extractor and
//! stage reads from. Syncers write through [`FeatureStore::replace_all`],
//! which swaps the full contents of one object type inside a single
//! transaction; readers either see the previous snapshot or the new one,
//! never a half-written mix. Readers SELECT against the current state and
//! must tolerate missing rows.
//!
//! Replaying a sync with unchanged upstream data replaces the snapshot with
//! an identical one: zero observable row deltas.

use cortex_domain::SchedulerError;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions, SqliteRow};
use sqlx::{Sqlite, SqlitePool};

/// Table creation statements for every datasource mirror and feature table.
const SCHEMA: &[&str] = &[
    // Datasource mirrors, replaced wholesale by the syncers.
    "CREATE TABLE IF NOT EXISTS hypervisors (
        name TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        state TEXT NOT NULL,
        vcpus_total INTEGER NOT NULL,
        vcpus_used INTEGER NOT NULL,
        memory_mb_total INTEGER NOT NULL,
        memory_mb_used INTEGER NOT NULL,
        disk_gb_total INTEGER NOT NULL,
        disk_gb_used INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS servers (
        uuid TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        project_id TEXT NOT NULL,
        host TEXT NOT NULL,
        flavor TEXT NOT NULL,
        vcpus INTEGER NOT NULL,
        memory_mb INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS projects (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        domain_id TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS commitments (
        id TEXT PRIMARY KEY,
        project_id TEXT NOT NULL,
        resource TEXT NOT NULL,
        amount INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS resource_providers (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS provider_traits (
        provider_id TEXT NOT NULL,
        trait_name TEXT NOT NULL,
        PRIMARY KEY (provider_id, trait_name)
    )",
    "CREATE TABLE IF NOT EXISTS provider_inventories (
        provider_id TEXT NOT NULL,
        resource TEXT NOT NULL,
        total INTEGER NOT NULL,
        used INTEGER NOT NULL,
        reserved INTEGER NOT NULL,
        allocation_ratio REAL NOT NULL,
        PRIMARY KEY (provider_id, resource)
    )",
    "CREATE TABLE IF NOT EXISTS storage_pools (
        name TEXT PRIMARY KEY,
        backend TEXT NOT NULL,
        capacity_gb REAL NOT NULL,
        free_gb REAL NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS share_hosts (
        name TEXT PRIMARY KEY,
        capacity_gb REAL NOT NULL,
        free_gb REAL NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS machine_pools (
        name TEXT PRIMARY KEY,
        size TEXT NOT NULL,
        capacity INTEGER NOT NULL,
        allocated INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS reservations (
        uuid TEXT PRIMARY KEY,
        workload TEXT NOT NULL,
        host TEXT NOT NULL,
        ready INTEGER NOT NULL,
        vcpus INTEGER NOT NULL,
        memory_mb INTEGER NOT NULL
    )",
    // Feature tables, replaced wholesale by the extractors.
    "CREATE TABLE IF NOT EXISTS feature_host_utilization (
        host TEXT NOT NULL,
        resource TEXT NOT NULL,
        used REAL NOT NULL,
        capacity REAL NOT NULL,
        PRIMARY KEY (host, resource)
    )",
    "CREATE TABLE IF NOT EXISTS feature_workload_placement (
        workload TEXT NOT NULL,
        host TEXT NOT NULL,
        PRIMARY KEY (workload, host)
    )",
    "CREATE TABLE IF NOT EXISTS feature_pool_capacity (
        pool TEXT NOT NULL,
        kind TEXT NOT NULL,
        capacity REAL NOT NULL,
        free REAL NOT NULL,
        utilization_pct REAL NOT NULL,
        PRIMARY KEY (pool, kind)
    )",
    "CREATE TABLE IF NOT EXISTS feature_flavor_runtime_buckets (
        label TEXT NOT NULL,
        bucket REAL NOT NULL,
        count INTEGER NOT NULL,
        total REAL NOT NULL,
        PRIMARY KEY (label, bucket)
    )",
    "CREATE TABLE IF NOT EXISTS feature_reservation_cover (
        workload TEXT NOT NULL,
        host TEXT NOT NULL,
        ready INTEGER NOT NULL,
        PRIMARY KEY (workload, host)
    )",
];

/// A row type a syncer or extractor can publish through
/// [`FeatureStore::replace_all`].
pub trait StoreRecord: Send + Sync {
    /// Destination table.
    const TABLE: &'static str;
    /// Parameterized insert statement matching [`StoreRecord::bind`].
    const INSERT: &'static str;

    /// Binds this row's columns onto the insert statement, in order.
    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;
}

/// Handle on the shared SQLite feature store.
#[derive(Clone, Debug)]
pub struct FeatureStore {
    pool: SqlitePool,
}

impl FeatureStore {
    /// Connects to the store at the given sqlite URL.
    pub async fn connect(url: &str) -> Result<Self, SchedulerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(store_err)?;
        Ok(Self { pool })
    }

    /// An in-memory store for tests and local runs. Pinned to a single
    /// connection so the schema survives across acquires.
    pub async fn in_memory() -> Result<Self, SchedulerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(store_err)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates every table the syncers and extractors publish into.
    pub async fn ensure_schema(&self) -> Result<(), SchedulerError> {
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&self.pool).await.map_err(store_err)?;
        }
        Ok(())
    }

    /// Atomically replaces the full contents of one record type.
    pub async fn replace_all<T: StoreRecord>(&self, rows: &[T]) -> Result<usize, SchedulerError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        sqlx::query(&format!("DELETE FROM {}", T::TABLE))
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        for row in rows {
            row.bind(sqlx::query(T::INSERT)).execute(&mut *tx).await.map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(rows.len())
    }

    /// Runs a query and maps each row into `T`.
    pub async fn fetch_rows<T>(&self, sql: &str) -> Result<Vec<T>, SchedulerError>
    where
        T: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
    {
        sqlx::query_as::<_, T>(sql).fetch_all(&self.pool).await.map_err(store_err)
    }

    /// Row count of one table.
    pub async fn count(&self, table: &str) -> Result<i64, SchedulerError> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(count)
    }
}

/// Store failures are transient: reconcilers retry them with backoff.
pub(crate) fn store_err(err: sqlx::Error) -> SchedulerError {
    SchedulerError::store_error(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PoolRow {
        name: String,
        backend: String,
        capacity_gb: f64,
        free_gb: f64,
    }

    impl StoreRecord for PoolRow {
        const TABLE: &'static str = "storage_pools";
        const INSERT: &'static str = "INSERT INTO storage_pools (name, backend, capacity_gb, free_gb) VALUES (?, ?, ?, ?)";

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

    fn pool_row(name: &str, free: f64) -> PoolRow {
        PoolRow {
            name: name.to_string(),
            backend: "ceph".to_string(),
            capacity_gb: 1000.0,
            free_gb: free,
        }
    }

    #[tokio::test]
    async fn test_replace_all_swaps_the_snapshot() {
        let store = FeatureStore::in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();

        store.replace_all(&[pool_row("a", 10.0), pool_row("b", 20.0)]).await.unwrap();
        assert_eq!(store.count("storage_pools").await.unwrap(), 2);

        store.replace_all(&[pool_row("c", 30.0)]).await.unwrap();
        assert_eq!(store.count("storage_pools").await.unwrap(), 1);

        #[derive(sqlx::FromRow)]
        struct Name {
            name: String,
        }
        let rows: Vec<Name> = store.fetch_rows("SELECT name FROM storage_pools").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "c");
    }

    #[tokio::test]
    async fn test_replaying_identical_snapshot_is_idempotent() {
        let store = FeatureStore::in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();

        store.replace_all(&[pool_row("a", 10.0)]).await.unwrap();
        store.replace_all(&[pool_row("a", 10.0)]).await.unwrap();
        assert_eq!(store.count("storage_pools").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_file_backed_store_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("cortex.db").display());

        {
            let store = FeatureStore::connect(&url).await.unwrap();
            store.ensure_schema().await.unwrap();
            store.replace_all(&[pool_row("a", 10.0)]).await.unwrap();
        }

        let reopened = FeatureStore::connect(&url).await.unwrap();
        assert_eq!(reopened.count("storage_pools").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_readers_tolerate_empty_tables() {
        let store = FeatureStore::in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();

        #[derive(sqlx::FromRow)]
        struct Row {
            #[allow(dead_code)]
            host: String,
        }
        let rows: Vec<Row> = store
            .fetch_rows("SELECT host FROM feature_host_utilization")
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
