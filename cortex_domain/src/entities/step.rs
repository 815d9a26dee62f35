// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Step Record
//!
//! A `Step` binds a concrete stage implementation (a key into the stage
//! registry) to its options, its declared Knowledge dependencies, and its
//! validation toggles. Pipelines reference Steps by name; the same Step can
//! appear in several pipelines.
//!
//! A Step is ready iff every declared Knowledge is ready; the pipeline
//! controller recounts this on every Knowledge transition.

use crate::entities::meta::ResourceMeta;
use crate::value_objects::ResourceRef;
use serde::{Deserialize, Serialize};

/// What a step contributes to a pipeline.
///
/// Filters and weighers use identical machinery; the distinction is whether
/// a stage ever returns an activation map smaller than its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    Filter,
    Weigher,
    Descheduler,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::Filter => write!(f, "filter"),
            StepKind::Weigher => write!(f, "weigher"),
            StepKind::Descheduler => write!(f, "descheduler"),
        }
    }
}

/// Per-step validation switches applied by the validation wrapper.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ValidationToggles {
    /// Skips the validation wrapper entirely for this step.
    #[serde(default)]
    pub disable_validations: bool,
    /// Requires the stage output to keep exactly the input subject count.
    #[serde(default)]
    pub same_subject_count: bool,
    /// Requires the stage output to be non-empty when its input was.
    #[serde(default)]
    pub some_subjects_remain: bool,
}

/// Operator-provided half of a step record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Key into the stage registry of the owning pipeline's kind.
    pub implementation: String,
    pub kind: StepKind,
    /// Implementation-specific options, parsed at stage init.
    #[serde(default)]
    pub options: serde_json::Value,
    /// Knowledges this stage reads; all must be ready before the step is.
    #[serde(default)]
    pub knowledges: Vec<ResourceRef>,
    #[serde(default)]
    pub validations: ValidationToggles,
}

/// Controller-owned half of a step record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepStatus {
    pub knowledges_ready: u32,
    pub knowledges_total: u32,
    pub ready: bool,
}

/// A declarative record naming one stage of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub meta: ResourceMeta,
    pub spec: StepSpec,
    #[serde(default)]
    pub status: StepStatus,
}

impl Step {
    pub fn is_ready(&self) -> bool {
        self.status.ready
    }
}
