// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Descheduling Record
//!
//! A migration recommendation emitted by a descheduler pipeline: vacate one
//! workload from one host, with an explanation. The engine does not execute
//! migrations; a companion executor hands the recommendation to an external
//! actuator.
//!
//! Once `in_progress` is set the migration is never re-issued. Once the
//! workload no longer sits on the expected host (or has disappeared
//! entirely) the record is deleted.

use crate::entities::meta::ResourceMeta;
use serde::{Deserialize, Serialize};

/// Operator-visible half of a descheduling record; written by the
/// descheduler reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeschedulingSpec {
    /// Workload to migrate away.
    pub workload: String,
    /// Host to vacate.
    pub host: String,
    /// Human-readable explanation from the recommending stage.
    pub reason: String,
}

/// Executor-owned half of a descheduling record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeschedulingStatus {
    pub ready: bool,
    pub in_progress: bool,
    /// Empty when healthy.
    #[serde(default)]
    pub error: String,
}

/// A single migration recommendation, keyed by workload + host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descheduling {
    pub meta: ResourceMeta,
    pub spec: DeschedulingSpec,
    #[serde(default)]
    pub status: DeschedulingStatus,
}

impl Descheduling {
    /// The deterministic record name for a (workload, host) pair, which is
    /// what makes repeated recommendations upsert instead of duplicate.
    pub fn record_name(workload: &str, host: &str) -> String {
        format!("{workload}-{host}")
    }

    /// True once the executor has picked this record up; it must never be
    /// issued a second time.
    pub fn is_issued(&self) -> bool {
        self.status.in_progress || self.status.ready
    }
}
