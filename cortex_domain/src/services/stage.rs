// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Contract
//!
//! The unified trait every pipeline stage implements, whether it filters or
//! weighs. Filter and weigher stages use identical machinery; the
//! distinction is only whether a stage ever returns an activation map
//! smaller than its input.
//!
//! ## Activation Semantics
//!
//! A [`StepResult`] carries an activation map (subject → f64) and a named
//! statistics bag used for observability only. The contract for the
//! activation map:
//!
//! - A subject **absent** from the map is rejected by the stage and removed
//!   from the run (filter semantics). Absence always means "filtered";
//!   a stage that merely has no data for a subject must echo that subject
//!   with an activation of 0.0, leaving its weight unchanged.
//! - A subject **present** with value `v` contributes `v` additively to the
//!   subject's composite weight (weigher semantics).
//!
//! ## Failure Semantics
//!
//! Stages must distinguish unavailable data (log, echo the subject at 0.0)
//! from corruption (return an error). Missing host-specific data for a
//! subset of subjects is routine and must not fail the pipeline. Stage
//! errors abort the run and surface verbatim in the decision status.
//!
//! ## Concurrency
//!
//! A stage is immutable after construction; concurrent `run` calls against
//! the same stage must be safe.

use crate::error::SchedulerError;
use crate::services::request::PipelineRequest;
use crate::value_objects::Subject;
use async_trait::async_trait;
use std::collections::HashMap;

/// Trace attributes shared by every log line of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunTrace {
    /// Name of the pipeline being run.
    pub pipeline: String,
    /// Request-specific attributes (project, workload id, flavor, ...).
    pub fields: Vec<(String, String)>,
}

impl RunTrace {
    pub fn new(pipeline: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            pipeline: pipeline.into(),
            fields,
        }
    }

    /// Renders the attribute bag for embedding into a log line.
    pub fn render(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output of one stage run: activations plus observability statistics.
#[derive(Debug, Clone, Default)]
pub struct StepResult {
    /// Subject → additive weight contribution. Absence = filtered out.
    pub activations: HashMap<Subject, f64>,
    /// Named per-subject statistics, surfaced through monitoring only.
    pub statistics: HashMap<String, HashMap<Subject, f64>>,
}

impl StepResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// A result that keeps every given subject at activation 0.0, the
    /// "no opinion" result a weigher returns when it has nothing to add.
    pub fn echo<I>(subjects: I) -> Self
    where
        I: IntoIterator<Item = Subject>,
    {
        Self {
            activations: subjects.into_iter().map(|s| (s, 0.0)).collect(),
            statistics: HashMap::new(),
        }
    }

    /// Sets the activation for one subject.
    pub fn activate(&mut self, subject: Subject, value: f64) {
        self.activations.insert(subject, value);
    }

    /// Records one named statistic for one subject.
    pub fn record_statistic(&mut self, name: &str, subject: Subject, value: f64) {
        self.statistics.entry(name.to_string()).or_default().insert(subject, value);
    }
}

/// Unified trait all filter and weigher stages implement.
#[async_trait]
pub trait SchedulerStage<R: PipelineRequest>: Send + Sync + std::fmt::Debug {
    /// The registry key this stage was instantiated under.
    fn name(&self) -> &str;

    /// Runs the stage over the currently eligible subjects.
    ///
    /// `weights` is the accumulated weight map produced by all prior
    /// stages; its key set is the stage's input subject set. Stages should
    /// read all feature data they need up front and avoid further I/O
    /// mid-run.
    async fn run(
        &self,
        trace: &RunTrace,
        request: &R,
        weights: &HashMap<Subject, f64>,
    ) -> Result<StepResult, SchedulerError>;
}

/// One migration recommendation emitted by a descheduler stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecommendation {
    pub workload: String,
    pub host: String,
    pub reason: String,
}

/// Trait for descheduler stages, which recommend migrations instead of
/// weighing placement candidates.
#[async_trait]
pub trait DeschedulerStage: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the current set of recommendations, possibly empty.
    async fn run(&self, trace: &RunTrace) -> Result<Vec<MigrationRecommendation>, SchedulerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_keeps_all_subjects_at_zero() {
        let result = StepResult::echo(vec![Subject::new("a"), Subject::new("b")]);
        assert_eq!(result.activations.len(), 2);
        assert_eq!(result.activations[&Subject::new("a")], 0.0);
    }

    #[test]
    fn test_statistics_grouped_by_name() {
        let mut result = StepResult::new();
        result.record_statistic("utilization", Subject::new("a"), 0.4);
        result.record_statistic("utilization", Subject::new("b"), 0.9);
        assert_eq!(result.statistics["utilization"].len(), 2);
    }

    #[test]
    fn test_trace_render() {
        let trace = RunTrace::new("vm-scheduler", vec![("project_id".to_string(), "p1".to_string())]);
        assert_eq!(trace.render(), "project_id=p1");
    }
}
