// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Request Shapes
//!
//! The four wire-level request schemas, one per pipeline kind. Each carries
//! an ordered candidate subject list and a baseline weight map; the compute
//! request additionally carries the flavor, the affinity descriptor, and the
//! scheduler hints that encode the operation intent.
//!
//! All four implement [`PipelineRequest`](crate::services::request::PipelineRequest),
//! which is the only view the pipeline engine has of them.

use crate::services::request::PipelineRequest;
use crate::value_objects::Subject;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Operation intent of a compute request, decoded from the first element of
/// the `_nova_check_type` scheduler hint. Anything absent or unrecognized is
/// an initial placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestIntent {
    Initial,
    Evacuate,
    LiveMigrate,
    Rebuild,
}

impl RequestIntent {
    fn from_hint(hint: &str) -> Self {
        match hint {
            "evacuate" => RequestIntent::Evacuate,
            "live-migrate" | "live_migrate" => RequestIntent::LiveMigrate,
            "rebuild" => RequestIntent::Rebuild,
            _ => RequestIntent::Initial,
        }
    }
}

/// Soft placement policy for an affinity group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AffinityPolicy {
    SoftAffinity,
    SoftAntiAffinity,
}

/// The affinity group a new instance belongs to: its sibling workloads and
/// the policy that says whether they attract or repel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffinityGroup {
    pub members: Vec<String>,
    pub policy: AffinityPolicy,
}

/// Flavor of the instance being placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flavor {
    pub name: String,
    pub vcpus: u64,
    pub memory_mb: u64,
    #[serde(default)]
    pub extra_specs: HashMap<String, String>,
    #[serde(default)]
    pub is_vmware: bool,
    #[serde(default)]
    pub affinity: Option<AffinityGroup>,
    /// Free-form scheduler hints; `_nova_check_type` encodes the intent.
    #[serde(default)]
    pub scheduler_hints: HashMap<String, serde_json::Value>,
}

/// Placement request for one or more compute instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeRequest {
    pub project_id: String,
    pub instance_uuid: Uuid,
    pub num_instances: u32,
    pub flavor: Flavor,
    /// Candidate compute hosts, in the caller's order.
    pub hosts: Vec<Subject>,
    /// Baseline weight per host; hosts missing from the map start at 0.
    #[serde(default)]
    pub weights: HashMap<Subject, f64>,
}

impl ComputeRequest {
    /// Decodes the operation intent from the scheduler hints.
    pub fn intent(&self) -> RequestIntent {
        self.flavor
            .scheduler_hints
            .get("_nova_check_type")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .and_then(|v| v.as_str())
            .map(RequestIntent::from_hint)
            .unwrap_or(RequestIntent::Initial)
    }
}

impl PipelineRequest for ComputeRequest {
    fn subjects(&self) -> Vec<Subject> {
        self.hosts.clone()
    }

    fn baseline_weights(&self) -> HashMap<Subject, f64> {
        baseline(&self.hosts, &self.weights)
    }

    fn trace_fields(&self) -> Vec<(String, String)> {
        vec![
            ("project_id".to_string(), self.project_id.clone()),
            ("instance_uuid".to_string(), self.instance_uuid.to_string()),
            ("flavor".to_string(), self.flavor.name.clone()),
        ]
    }
}

/// Placement request for a block-storage volume; subjects are storage pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockStorageRequest {
    pub project_id: String,
    pub volume_uuid: Uuid,
    pub size_gb: u64,
    pub pools: Vec<Subject>,
    #[serde(default)]
    pub weights: HashMap<Subject, f64>,
}

impl PipelineRequest for BlockStorageRequest {
    fn subjects(&self) -> Vec<Subject> {
        self.pools.clone()
    }

    fn baseline_weights(&self) -> HashMap<Subject, f64> {
        baseline(&self.pools, &self.weights)
    }

    fn trace_fields(&self) -> Vec<(String, String)> {
        vec![
            ("project_id".to_string(), self.project_id.clone()),
            ("volume_uuid".to_string(), self.volume_uuid.to_string()),
        ]
    }
}

/// Placement request for a file share; subjects are share hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileShareRequest {
    pub project_id: String,
    pub share_id: String,
    pub size_gb: u64,
    pub share_hosts: Vec<Subject>,
    #[serde(default)]
    pub weights: HashMap<Subject, f64>,
}

impl PipelineRequest for FileShareRequest {
    fn subjects(&self) -> Vec<Subject> {
        self.share_hosts.clone()
    }

    fn baseline_weights(&self) -> HashMap<Subject, f64> {
        baseline(&self.share_hosts, &self.weights)
    }

    fn trace_fields(&self) -> Vec<(String, String)> {
        vec![("share_id".to_string(), self.share_id.clone())]
    }
}

/// Placement request for a bare machine; subjects are machine pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BareMachineRequest {
    pub machine: String,
    pub size: String,
    pub pools: Vec<Subject>,
    #[serde(default)]
    pub weights: HashMap<Subject, f64>,
}

impl PipelineRequest for BareMachineRequest {
    fn subjects(&self) -> Vec<Subject> {
        self.pools.clone()
    }

    fn baseline_weights(&self) -> HashMap<Subject, f64> {
        baseline(&self.pools, &self.weights)
    }

    fn trace_fields(&self) -> Vec<(String, String)> {
        vec![("machine".to_string(), self.machine.clone())]
    }
}

/// Every declared subject gets a baseline entry, defaulting to 0.
fn baseline(subjects: &[Subject], weights: &HashMap<Subject, f64>) -> HashMap<Subject, f64> {
    subjects
        .iter()
        .map(|s| (s.clone(), weights.get(s).copied().unwrap_or(0.0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute_request(hints: serde_json::Value) -> ComputeRequest {
        ComputeRequest {
            project_id: "p1".to_string(),
            instance_uuid: Uuid::new_v4(),
            num_instances: 1,
            flavor: Flavor {
                name: "m1.small".to_string(),
                vcpus: 2,
                memory_mb: 2048,
                extra_specs: HashMap::new(),
                is_vmware: false,
                affinity: None,
                scheduler_hints: serde_json::from_value(hints).unwrap(),
            },
            hosts: vec![Subject::new("h1"), Subject::new("h2")],
            weights: HashMap::from([(Subject::new("h1"), 0.5)]),
        }
    }

    #[test]
    fn test_intent_from_check_type_hint() {
        let req = compute_request(serde_json::json!({"_nova_check_type": ["evacuate"]}));
        assert_eq!(req.intent(), RequestIntent::Evacuate);
    }

    #[test]
    fn test_missing_hint_means_initial_placement() {
        let req = compute_request(serde_json::json!({}));
        assert_eq!(req.intent(), RequestIntent::Initial);
    }

    #[test]
    fn test_baseline_fills_unlisted_hosts_with_zero() {
        let req = compute_request(serde_json::json!({}));
        let weights = req.baseline_weights();
        assert_eq!(weights[&Subject::new("h1")], 0.5);
        assert_eq!(weights[&Subject::new("h2")], 0.0);
    }
}
