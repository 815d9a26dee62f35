// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Record
//!
//! A `Pipeline` is an ordered list of Step references, each flagged
//! mandatory or optional, plus a kind (filter-weigher or descheduler).
//!
//! ## Readiness
//!
//! Ready iff every mandatory referenced Step is ready. Not-ready pipelines
//! are absent from the live pipeline cache; not-ready optional steps are
//! silently dropped from the instantiated pipeline.

use crate::entities::decision::DecisionKind;
use crate::entities::meta::ResourceMeta;
use crate::value_objects::ResourceRef;
use serde::{Deserialize, Serialize};

/// Kind of a pipeline record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineKind {
    FilterWeigher,
    Descheduler,
}

/// One ordered step reference inside a pipeline spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRef {
    pub step: ResourceRef,
    /// Mandatory steps gate pipeline readiness; optional steps are dropped
    /// from the assembly while not ready.
    #[serde(default = "default_mandatory")]
    pub mandatory: bool,
}

fn default_mandatory() -> bool {
    true
}

/// Operator-provided half of a pipeline record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub kind: PipelineKind,
    /// Which scheduling domain a filter-weigher pipeline serves; selects
    /// the stage catalogue it is assembled from. Ignored for descheduler
    /// pipelines.
    #[serde(default = "default_target")]
    pub target: DecisionKind,
    pub steps: Vec<StepRef>,
}

fn default_target() -> DecisionKind {
    DecisionKind::Compute
}

/// Controller-owned half of a pipeline record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub steps_total: u32,
    pub steps_ready: u32,
    pub ready: bool,
    /// Empty when healthy; carries assembly errors otherwise.
    #[serde(default)]
    pub error: String,
}

/// An ordered list of step references forming one runnable pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub meta: ResourceMeta,
    pub spec: PipelineSpec,
    #[serde(default)]
    pub status: PipelineStatus,
}

impl Pipeline {
    pub fn is_ready(&self) -> bool {
        self.status.ready
    }

    /// Step refs in declared order.
    pub fn step_refs(&self) -> &[StepRef] {
        &self.spec.steps
    }

    /// True when this pipeline references the given step.
    pub fn references_step(&self, key: &(String, String)) -> bool {
        self.spec.steps.iter().any(|s| &s.step.key() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_refs_default_to_mandatory() {
        let json = r#"{"step": {"name": "binpack", "namespace": "monsoon"}}"#;
        let r: StepRef = serde_json::from_str(json).unwrap();
        assert!(r.mandatory);
    }

    #[test]
    fn test_references_step() {
        let p = Pipeline {
            meta: ResourceMeta::new("vm-scheduler", "monsoon", "cortex"),
            spec: PipelineSpec {
                kind: PipelineKind::FilterWeigher,
                target: DecisionKind::Compute,
                steps: vec![StepRef {
                    step: ResourceRef::new("binpack", "monsoon"),
                    mandatory: true,
                }],
            },
            status: PipelineStatus::default(),
        };
        assert!(p.references_step(&("monsoon".to_string(), "binpack".to_string())));
        assert!(!p.references_step(&("monsoon".to_string(), "affinity".to_string())));
    }
}
