// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Extractor Base
//!
//! The shared contract and conveniences of the feature extractors. An
//! extractor without a store is a hard error at init; a silently empty
//! extraction would poison every downstream weigher, so the failure has to
//! happen before the first run. An extractor that finds no upstream data,
//! on the other hand, returns an empty list: that is a valid state of the
//! world, not a failure.

use crate::infrastructure::store::FeatureStore;
use cortex_domain::SchedulerError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Everything an extractor factory gets to work with.
pub struct ExtractorContext {
    pub store: Option<Arc<FeatureStore>>,
    /// The Knowledge's opaque extractor options.
    pub options: serde_json::Value,
}

impl ExtractorContext {
    pub fn new(store: Option<Arc<FeatureStore>>, options: serde_json::Value) -> Self {
        Self { store, options }
    }

    /// The feature store. Absence is a hard error, never an empty result.
    pub fn store(&self) -> Result<&Arc<FeatureStore>, SchedulerError> {
        self.store
            .as_ref()
            .ok_or_else(|| SchedulerError::internal_error("extractor requires a feature store but none was wired"))
    }
}

/// One SQL-driven feature derivation.
#[async_trait]
pub trait FeatureExtractor: Send + Sync + std::fmt::Debug {
    /// The registry key this extractor was instantiated under.
    fn name(&self) -> &str;

    /// Derives the feature list and publishes it into the extractor's
    /// feature table. SQL errors surface verbatim; no upstream data yields
    /// an empty list.
    async fn extract(&self) -> Result<Vec<serde_json::Value>, SchedulerError>;
}

/// Serializes typed feature rows into the opaque payload stored on the
/// Knowledge record.
pub fn to_features<T: Serialize>(rows: &[T]) -> Result<Vec<serde_json::Value>, SchedulerError> {
    rows.iter().map(|r| serde_json::to_value(r).map_err(Into::into)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_store_is_a_hard_error() {
        let context = ExtractorContext::new(None, serde_json::Value::Null);
        let err = context.store().unwrap_err();
        assert!(matches!(err, SchedulerError::InternalError(_)));
    }
}
