// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Flavor runtime histogram extractor: reduces the age of every running
//! server into cumulative histogram buckets keyed by flavor. Downstream
//! weighers use the distribution to judge how long instances of a flavor
//! tend to live.

use crate::infrastructure::extractors::base::{to_features, ExtractorContext, FeatureExtractor};
use crate::infrastructure::extractors::histogram::{bucketize, HistogramRow};
use crate::infrastructure::store::{FeatureStore, StoreRecord};
use cortex_domain::SchedulerError;
use async_trait::async_trait;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;
use std::sync::Arc;

impl StoreRecord for HistogramRow {
    const TABLE: &'static str = "feature_flavor_runtime_buckets";
    const INSERT: &'static str =
        "INSERT INTO feature_flavor_runtime_buckets (label, bucket, count, total) VALUES (?, ?, ?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(&self.label)
            .bind(self.bucket)
            .bind(self.count as i64)
            .bind(self.total)
    }
}

#[derive(sqlx::FromRow)]
struct RuntimeSample {
    flavor: String,
    runtime_secs: f64,
}

const QUERY: &str = "\
    SELECT flavor, (julianday('now') - julianday(created_at)) * 86400.0 AS runtime_secs
    FROM servers
    WHERE julianday(created_at) <= julianday('now')";

#[derive(Debug)]
pub struct FlavorRuntimeExtractor {
    store: Arc<FeatureStore>,
}

impl FlavorRuntimeExtractor {
    pub const NAME: &'static str = "flavor_runtime_histogram";

    pub fn new(context: &ExtractorContext) -> Result<Self, SchedulerError> {
        Ok(Self {
            store: context.store()?.clone(),
        })
    }
}

#[async_trait]
impl FeatureExtractor for FlavorRuntimeExtractor {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn extract(&self) -> Result<Vec<serde_json::Value>, SchedulerError> {
        let samples: Vec<RuntimeSample> = self.store.fetch_rows(QUERY).await?;
        let pairs: Vec<(String, f64)> = samples.into_iter().map(|s| (s.flavor, s.runtime_secs)).collect();
        let rows = bucketize(&pairs);
        self.store.replace_all(&rows).await?;
        to_features(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::extractors::histogram::BUCKET_COUNT;

    #[tokio::test]
    async fn test_buckets_per_flavor() {
        let store = FeatureStore::in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();
        // One server that has been running for at least an hour.
        sqlx::query(
            "INSERT INTO servers (uuid, name, project_id, host, flavor, vcpus, memory_mb, created_at) \
             VALUES ('w1', 'vm-1', 'p1', 'h1', 'm1.small', 2, 2048, datetime('now', '-1 hour'))",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let extractor = FlavorRuntimeExtractor::new(&ExtractorContext::new(
            Some(Arc::new(store.clone())),
            serde_json::Value::Null,
        ))
        .unwrap();
        let features = extractor.extract().await.unwrap();
        assert_eq!(features.len(), BUCKET_COUNT);
        assert_eq!(
            store.count("feature_flavor_runtime_buckets").await.unwrap(),
            BUCKET_COUNT as i64
        );

        // The last (widest) bucket must contain the sample.
        let last = features.last().unwrap();
        assert_eq!(last["count"], 1);
    }

    #[tokio::test]
    async fn test_no_servers_means_no_buckets() {
        let store = FeatureStore::in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();
        let extractor =
            FlavorRuntimeExtractor::new(&ExtractorContext::new(Some(Arc::new(store)), serde_json::Value::Null))
                .unwrap();
        assert!(extractor.extract().await.unwrap().is_empty());
    }
}
