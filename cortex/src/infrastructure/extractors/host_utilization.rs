// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Host Utilization Extractor
//!
//! Flattens the hypervisor mirror into one (host, resource, used, capacity)
//! row per resource. This is the feature most compute weighers read:
//! binpack, smallest-host, and capacity balance all key off it.

use crate::infrastructure::extractors::base::{to_features, ExtractorContext, FeatureExtractor};
use crate::infrastructure::store::{FeatureStore, StoreRecord};
use cortex_domain::SchedulerError;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;
use std::sync::Arc;

/// One feature row: remaining headroom of one resource on one host.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HostUtilizationFeature {
    pub host: String,
    pub resource: String,
    pub used: f64,
    pub capacity: f64,
}

impl StoreRecord for HostUtilizationFeature {
    const TABLE: &'static str = "feature_host_utilization";
    const INSERT: &'static str =
        "INSERT INTO feature_host_utilization (host, resource, used, capacity) VALUES (?, ?, ?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(&self.host)
            .bind(&self.resource)
            .bind(self.used)
            .bind(self.capacity)
    }
}

const QUERY: &str = "\
    SELECT name AS host, 'cpu' AS resource,
           CAST(vcpus_used AS REAL) AS used, CAST(vcpus_total AS REAL) AS capacity
    FROM hypervisors
    UNION ALL
    SELECT name, 'memory', CAST(memory_mb_used AS REAL), CAST(memory_mb_total AS REAL)
    FROM hypervisors
    UNION ALL
    SELECT name, 'disk', CAST(disk_gb_used AS REAL), CAST(disk_gb_total AS REAL)
    FROM hypervisors";

/// Derives per-host, per-resource utilisation from the hypervisor mirror.
#[derive(Debug)]
pub struct HostUtilizationExtractor {
    store: Arc<FeatureStore>,
}

impl HostUtilizationExtractor {
    pub const NAME: &'static str = "host_utilization";

    pub fn new(context: &ExtractorContext) -> Result<Self, SchedulerError> {
        Ok(Self {
            store: context.store()?.clone(),
        })
    }
}

#[async_trait]
impl FeatureExtractor for HostUtilizationExtractor {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn extract(&self) -> Result<Vec<serde_json::Value>, SchedulerError> {
        let rows: Vec<HostUtilizationFeature> = self.store.fetch_rows(QUERY).await?;
        self.store.replace_all(&rows).await?;
        to_features(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_one_row_per_host_and_resource() {
        let store = FeatureStore::in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();
        sqlx::query(
            "INSERT INTO hypervisors (name, kind, state, vcpus_total, vcpus_used, memory_mb_total, \
             memory_mb_used, disk_gb_total, disk_gb_used) VALUES ('h1', 'qemu', 'up', 96, 20, 256000, 64000, 4000, 100)",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let extractor =
            HostUtilizationExtractor::new(&ExtractorContext::new(Some(Arc::new(store.clone())), serde_json::Value::Null))
                .unwrap();
        let features = extractor.extract().await.unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(store.count("feature_host_utilization").await.unwrap(), 3);

        let cpu = features
            .iter()
            .find(|f| f["resource"] == "cpu")
            .expect("cpu feature present");
        assert_eq!(cpu["used"], 20.0);
        assert_eq!(cpu["capacity"], 96.0);
    }

    #[tokio::test]
    async fn test_empty_upstream_yields_empty_list() {
        let store = FeatureStore::in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();
        let extractor =
            HostUtilizationExtractor::new(&ExtractorContext::new(Some(Arc::new(store)), serde_json::Value::Null))
                .unwrap();
        assert!(extractor.extract().await.unwrap().is_empty());
    }
}
