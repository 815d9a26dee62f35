// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Declarative records and request shapes of the scheduling domain.
//!
//! Every record follows the `{meta, spec, status}` convention: the spec
//! drives execution, the status carries results, and the meta carries the
//! identity plus the operator tag that partitions resources between engine
//! instances.

pub mod datasource;
pub mod decision;
pub mod descheduling;
pub mod knowledge;
pub mod machine;
pub mod meta;
pub mod pipeline;
pub mod request;
pub mod step;

pub use datasource::{Datasource, DatasourceKind, DatasourceSpec, DatasourceStatus};
pub use decision::{Decision, DecisionKind, DecisionResult, DecisionSpec, DecisionStatus, StepActivationRecord};
pub use descheduling::{Descheduling, DeschedulingSpec, DeschedulingStatus};
pub use knowledge::{Knowledge, KnowledgeSpec, KnowledgeStatus};
pub use machine::{Machine, MachineSpec};
pub use meta::ResourceMeta;
pub use pipeline::{Pipeline, PipelineKind, PipelineSpec, PipelineStatus, StepRef};
pub use request::{
    AffinityGroup, AffinityPolicy, BareMachineRequest, BlockStorageRequest, ComputeRequest, FileShareRequest, Flavor,
    RequestIntent,
};
pub use step::{Step, StepKind, StepSpec, StepStatus, ValidationToggles};
