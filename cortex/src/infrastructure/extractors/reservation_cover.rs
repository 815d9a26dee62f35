// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Reservation cover extractor: which failover reservations allocate which
//! workload on which host, and whether they are ready. Read by the
//! evacuation weigher.

use crate::infrastructure::extractors::base::{to_features, ExtractorContext, FeatureExtractor};
use crate::infrastructure::store::{FeatureStore, StoreRecord};
use cortex_domain::SchedulerError;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReservationCoverFeature {
    pub workload: String,
    pub host: String,
    pub ready: i64,
}

impl StoreRecord for ReservationCoverFeature {
    const TABLE: &'static str = "feature_reservation_cover";
    const INSERT: &'static str = "INSERT INTO feature_reservation_cover (workload, host, ready) VALUES (?, ?, ?)";

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        query.bind(&self.workload).bind(&self.host).bind(self.ready)
    }
}

#[derive(Debug)]
pub struct ReservationCoverExtractor {
    store: Arc<FeatureStore>,
}

impl ReservationCoverExtractor {
    pub const NAME: &'static str = "reservation_cover";

    pub fn new(context: &ExtractorContext) -> Result<Self, SchedulerError> {
        Ok(Self {
            store: context.store()?.clone(),
        })
    }
}

#[async_trait]
impl FeatureExtractor for ReservationCoverExtractor {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn extract(&self) -> Result<Vec<serde_json::Value>, SchedulerError> {
        let rows: Vec<ReservationCoverFeature> = self
            .store
            .fetch_rows("SELECT workload, host, ready FROM reservations")
            .await?;
        self.store.replace_all(&rows).await?;
        to_features(&rows)
    }
}
