// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Decision Record
//!
//! A `Decision` records one incoming placement request and, once
//! reconciled, its ranked result. The spec carries the raw request payload
//! exactly as the caller sent it; the status carries the ordered host list,
//! the per-stage activation table, and a convenience target-host field.
//!
//! ## Terminal States
//!
//! A Decision with either a non-empty error OR a present result is terminal
//! and must not be reprocessed. Error and result are mutually exclusive:
//! the decision controller writes outcomes only through
//! [`DecisionStatus::record_result`] and [`DecisionStatus::record_error`],
//! and each clears the other side.

use crate::entities::meta::ResourceMeta;
use crate::value_objects::{ResourceRef, Subject};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind tag dispatching a decision to its controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionKind {
    Compute,
    BlockStorage,
    FileShare,
    BareMachine,
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DecisionKind::Compute => "compute",
            DecisionKind::BlockStorage => "block-storage",
            DecisionKind::FileShare => "file-share",
            DecisionKind::BareMachine => "bare-machine",
        };
        f.write_str(s)
    }
}

/// Per-step activation snapshot kept for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepActivationRecord {
    pub step: String,
    pub activations: HashMap<Subject, f64>,
}

/// The ranked outcome written back into a decision's status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResult {
    /// Hosts ordered by descending composite weight, ties by ascending id.
    pub hosts: Vec<Subject>,
    /// Final composite weight per surviving host.
    pub weights: HashMap<Subject, f64>,
    /// One activation snapshot per executed stage, in declared order.
    pub step_activations: Vec<StepActivationRecord>,
}

/// Operator/caller-provided half of a decision record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionSpec {
    pub kind: DecisionKind,
    /// The pipeline to run this request through.
    pub pipeline: ResourceRef,
    /// Identifier of the workload being placed (instance UUID, volume id,
    /// share id, or machine name).
    pub resource_id: String,
    /// Host the workload currently occupies, for migration-shaped requests.
    #[serde(default)]
    pub source_host: Option<String>,
    /// Names of earlier decisions for the same resource, newest last.
    #[serde(default)]
    pub prior_decisions: Vec<String>,
    /// The kind-specific raw request payload.
    pub payload: serde_json::Value,
}

/// Controller-owned half of a decision record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionStatus {
    pub result: Option<DecisionResult>,
    /// Convenience field: the first entry of the ranked list.
    pub target_host: Option<Subject>,
    pub duration_ms: u64,
    /// Empty when healthy. Mutually exclusive with `result`.
    #[serde(default)]
    pub error: String,
}

impl DecisionStatus {
    /// Records a successful ranking, clearing any stale error.
    pub fn record_result(&mut self, result: DecisionResult, duration_ms: u64) {
        self.target_host = result.hosts.first().cloned();
        self.result = Some(result);
        self.duration_ms = duration_ms;
        self.error = String::new();
    }

    /// Records a failed run, clearing any stale result.
    pub fn record_error(&mut self, error: impl Into<String>, duration_ms: u64) {
        self.result = None;
        self.target_host = None;
        self.duration_ms = duration_ms;
        self.error = error.into();
    }
}

/// One placement request and its ranked answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub meta: ResourceMeta,
    pub spec: DecisionSpec,
    #[serde(default)]
    pub status: DecisionStatus,
}

impl Decision {
    /// Terminal decisions must not be reprocessed.
    pub fn is_terminal(&self) -> bool {
        !self.status.error.is_empty() || self.status.result.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision() -> Decision {
        Decision {
            meta: ResourceMeta::new("place-vm-1", "monsoon", "cortex"),
            spec: DecisionSpec {
                kind: DecisionKind::Compute,
                pipeline: ResourceRef::new("vm-scheduler", "monsoon"),
                resource_id: "5ab9f7e0-5b0f-4a1f-9e52-0c9b53b7fbe7".to_string(),
                source_host: None,
                prior_decisions: vec![],
                payload: serde_json::Value::Null,
            },
            status: DecisionStatus::default(),
        }
    }

    #[test]
    fn test_fresh_decision_is_not_terminal() {
        assert!(!decision().is_terminal());
    }

    #[test]
    fn test_result_and_error_are_mutually_exclusive() {
        let mut d = decision();
        d.status.record_error("pipeline aborted", 12);
        assert!(d.is_terminal());
        assert!(d.status.result.is_none());

        d.status.record_result(
            DecisionResult {
                hosts: vec![Subject::new("host-a")],
                weights: HashMap::from([(Subject::new("host-a"), 1.5)]),
                step_activations: vec![],
            },
            20,
        );
        assert!(d.is_terminal());
        assert!(d.status.error.is_empty());
        assert_eq!(d.status.target_host, Some(Subject::new("host-a")));
    }
}
