// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Pool capacity extractor: utilisation of block-storage pools and share
//! hosts, unified under a `kind` column so one feature table serves both
//! pool-shaped pipeline kinds.

use crate::infrastructure::extractors::base::{to_features, ExtractorContext, FeatureExtractor};
use crate::infrastructure::store::{FeatureStore, StoreRecord};
use cortex_domain::SchedulerError;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PoolCapacityFeature {
    pub pool: String,
    pub kind: String,
    pub capacity: f64,
    pub free: f64,
    pub utilization_pct: f64,
}

impl StoreRecord for PoolCapacityFeature {
    const TABLE: &'static str = "feature_pool_capacity";
    const INSERT: &'static str =
        "INSERT INTO feature_pool_capacity (pool, kind, capacity, free, utilization_pct) VALUES (?, ?, ?, ?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(&self.pool)
            .bind(&self.kind)
            .bind(self.capacity)
            .bind(self.free)
            .bind(self.utilization_pct)
    }
}

const QUERY: &str = "\
    SELECT name AS pool, 'block' AS kind, capacity_gb AS capacity, free_gb AS free,
           CASE WHEN capacity_gb > 0 THEN (capacity_gb - free_gb) / capacity_gb * 100.0 ELSE 0.0 END AS utilization_pct
    FROM storage_pools
    UNION ALL
    SELECT name, 'share', capacity_gb, free_gb,
           CASE WHEN capacity_gb > 0 THEN (capacity_gb - free_gb) / capacity_gb * 100.0 ELSE 0.0 END
    FROM share_hosts";

#[derive(Debug)]
pub struct PoolCapacityExtractor {
    store: Arc<FeatureStore>,
}

impl PoolCapacityExtractor {
    pub const NAME: &'static str = "pool_capacity";

    pub fn new(context: &ExtractorContext) -> Result<Self, SchedulerError> {
        Ok(Self {
            store: context.store()?.clone(),
        })
    }
}

#[async_trait]
impl FeatureExtractor for PoolCapacityExtractor {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn extract(&self) -> Result<Vec<serde_json::Value>, SchedulerError> {
        let rows: Vec<PoolCapacityFeature> = self.store.fetch_rows(QUERY).await?;
        self.store.replace_all(&rows).await?;
        to_features(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_block_and_share_pools_are_unified() {
        let store = FeatureStore::in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();
        sqlx::query("INSERT INTO storage_pools (name, backend, capacity_gb, free_gb) VALUES ('bp', 'ceph', 100, 40)")
            .execute(store.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO share_hosts (name, capacity_gb, free_gb) VALUES ('sh', 200, 150)")
            .execute(store.pool())
            .await
            .unwrap();

        let extractor =
            PoolCapacityExtractor::new(&ExtractorContext::new(Some(Arc::new(store)), serde_json::Value::Null))
                .unwrap();
        let features = extractor.extract().await.unwrap();
        assert_eq!(features.len(), 2);

        let block = features.iter().find(|f| f["kind"] == "block").unwrap();
        assert_eq!(block["pool"], "bp");
        assert!((block["utilization_pct"].as_f64().unwrap() - 60.0).abs() < 1e-9);
    }
}
