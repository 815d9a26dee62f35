// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Workload placement extractor: which workload currently sits on which
//! host. Feeds the soft-affinity weigher and the descheduling executor's
//! gone-check.

use crate::infrastructure::extractors::base::{to_features, ExtractorContext, FeatureExtractor};
use crate::infrastructure::store::{FeatureStore, StoreRecord};
use cortex_domain::SchedulerError;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkloadPlacementFeature {
    pub workload: String,
    pub host: String,
}

impl StoreRecord for WorkloadPlacementFeature {
    const TABLE: &'static str = "feature_workload_placement";
    const INSERT: &'static str = "INSERT INTO feature_workload_placement (workload, host) VALUES (?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query.bind(&self.workload).bind(&self.host)
    }
}

#[derive(Debug)]
pub struct WorkloadPlacementExtractor {
    store: Arc<FeatureStore>,
}

impl WorkloadPlacementExtractor {
    pub const NAME: &'static str = "workload_placement";

    pub fn new(context: &ExtractorContext) -> Result<Self, SchedulerError> {
        Ok(Self {
            store: context.store()?.clone(),
        })
    }
}

#[async_trait]
impl FeatureExtractor for WorkloadPlacementExtractor {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn extract(&self) -> Result<Vec<serde_json::Value>, SchedulerError> {
        let rows: Vec<WorkloadPlacementFeature> = self
            .store
            .fetch_rows("SELECT uuid AS workload, host FROM servers")
            .await?;
        self.store.replace_all(&rows).await?;
        to_features(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mirrors_server_placements() {
        let store = FeatureStore::in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();
        sqlx::query(
            "INSERT INTO servers (uuid, name, project_id, host, flavor, vcpus, memory_mb, created_at) \
             VALUES ('w1', 'vm-1', 'p1', 'h1', 'm1', 2, 2048, '2025-01-01T00:00:00Z')",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let extractor = WorkloadPlacementExtractor::new(&ExtractorContext::new(
            Some(Arc::new(store.clone())),
            serde_json::Value::Null,
        ))
        .unwrap();
        let features = extractor.extract().await.unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["workload"], "w1");
        assert_eq!(features[0]["host"], "h1");
    }
}
