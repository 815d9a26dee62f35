// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Knowledge Record
//!
//! A `Knowledge` names an extractor, a recency window, and the upstream
//! Datasources and Knowledges it derives from. The upstream references form
//! a DAG: a Knowledge may consume other Knowledges' outputs, and the trigger
//! reconciler fans re-extraction out along these edges when an upstream
//! changes.
//!
//! ## Invariants
//!
//! - All upstreams must share a single logical store identity; a violation
//!   is a terminal error until the operator edits the record.
//! - A Knowledge whose any upstream is not ready never has its extractor
//!   invoked in that reconciliation pass.

use crate::entities::meta::ResourceMeta;
use crate::value_objects::ResourceRef;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Operator-provided half of a knowledge record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSpec {
    /// Key into the extractor registry.
    pub extractor: String,
    /// Re-extraction is due when the last extraction is older than this.
    pub recency_secs: u64,
    /// Upstream datasources this extraction reads from.
    #[serde(default)]
    pub datasources: Vec<ResourceRef>,
    /// Upstream knowledges this extraction reads from (DAG edges).
    #[serde(default)]
    pub knowledges: Vec<ResourceRef>,
    /// Extractor-specific options, parsed by the extractor at init.
    #[serde(default)]
    pub options: serde_json::Value,
    /// Logical store identity; must match every upstream's store.
    pub store: String,
}

/// Reconciler-owned half of a knowledge record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeStatus {
    pub last_extracted: Option<DateTime<Utc>>,
    /// Opaque feature payload: the newest snapshot produced by the
    /// extractor, serialized as a JSON array.
    pub features: Option<serde_json::Value>,
    pub feature_count: u64,
    /// Empty when healthy.
    #[serde(default)]
    pub error: String,
}

/// A named, cacheable derived feature set produced by an extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Knowledge {
    pub meta: ResourceMeta,
    pub spec: KnowledgeSpec,
    #[serde(default)]
    pub status: KnowledgeStatus,
}

impl Knowledge {
    /// Ready iff the last extraction succeeded and no error is recorded.
    pub fn is_ready(&self) -> bool {
        self.status.error.is_empty() && self.status.last_extracted.is_some()
    }

    /// Due for re-extraction at `now`: never extracted, or the recency
    /// window has elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.status.last_extracted {
            None => true,
            Some(last) => now - last >= Duration::seconds(self.spec.recency_secs as i64),
        }
    }
}
