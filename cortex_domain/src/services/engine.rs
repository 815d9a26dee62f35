// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Engine
//!
//! The generic mechanism composing ordered stages into a pipeline, running
//! them over a candidate set, and producing the final ranked decision.
//!
//! ## Execution
//!
//! The engine seeds the running activation map with the request's baseline
//! weights, then iterates the stages in declared order. After each stage:
//!
//! 1. Subjects absent from the stage's output are removed from the running
//!    map (filter effect).
//! 2. For each remaining subject, the stage's activation value is **added**
//!    to the accumulated weight (weigher effect).
//! 3. The stage's activation snapshot and statistics are appended to the
//!    per-stage record of the outcome.
//!
//! ## Ranking
//!
//! After the final stage, remaining subjects sort by descending composite
//! weight; ties break by ascending subject identifier so two runs over the
//! same request always rank identically.
//!
//! ## Concurrency and Failure
//!
//! A pipeline is immutable after construction; concurrent `run` calls are
//! safe. Stage errors abort the run and surface verbatim. An empty
//! candidate list is a valid run producing an empty ranking.

use crate::error::SchedulerError;
use crate::services::request::PipelineRequest;
use crate::services::stage::{RunTrace, SchedulerStage, StepResult};
use crate::value_objects::Subject;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-stage snapshot kept in the outcome for observability.
#[derive(Debug, Clone)]
pub struct StepSnapshot {
    pub step: String,
    pub activations: HashMap<Subject, f64>,
    pub statistics: HashMap<String, HashMap<Subject, f64>>,
}

/// The ranked result of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Surviving subjects, best first.
    pub ranked: Vec<Subject>,
    /// Final composite weight per surviving subject.
    pub weights: HashMap<Subject, f64>,
    /// One snapshot per executed stage, in declared order.
    pub steps: Vec<StepSnapshot>,
}

/// An assembled, runnable pipeline over one request type.
pub struct SchedulerPipeline<R: PipelineRequest> {
    name: String,
    stages: Vec<Arc<dyn SchedulerStage<R>>>,
}

impl<R: PipelineRequest> SchedulerPipeline<R> {
    pub fn new(name: impl Into<String>, stages: Vec<Arc<dyn SchedulerStage<R>>>) -> Self {
        Self {
            name: name.into(),
            stages,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs every stage in declared order and ranks the survivors.
    pub async fn run(&self, request: &R) -> Result<PipelineOutcome, SchedulerError> {
        let trace = RunTrace::new(self.name.clone(), request.trace_fields());
        let mut weights = request.baseline_weights();
        let mut steps = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let result: StepResult = stage.run(&trace, request, &weights).await?;

            // Filter effect: drop subjects the stage did not return.
            weights.retain(|subject, _| result.activations.contains_key(subject));

            // Weigher effect: add the stage's activations to the survivors.
            for (subject, weight) in weights.iter_mut() {
                if let Some(activation) = result.activations.get(subject) {
                    *weight += activation;
                }
            }

            steps.push(StepSnapshot {
                step: stage.name().to_string(),
                activations: result.activations,
                statistics: result.statistics,
            });
        }

        Ok(PipelineOutcome {
            ranked: rank(&weights),
            weights,
            steps,
        })
    }
}

/// Sorts subjects by descending weight, ties by ascending identifier.
fn rank(weights: &HashMap<Subject, f64>) -> Vec<Subject> {
    let mut ranked: Vec<Subject> = weights.keys().cloned().collect();
    ranked.sort_by(|a, b| {
        weights[b]
            .partial_cmp(&weights[a])
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(b))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::request::{ComputeRequest, Flavor};
    use async_trait::async_trait;
    use uuid::Uuid;

    /// Adds a fixed activation per configured subject; filters the rest.
    #[derive(Debug)]
    struct TableStage {
        name: &'static str,
        table: HashMap<Subject, f64>,
    }

    impl TableStage {
        fn new(name: &'static str, entries: &[(&str, f64)]) -> Arc<Self> {
            Arc::new(Self {
                name,
                table: entries.iter().map(|(s, v)| (Subject::new(*s), *v)).collect(),
            })
        }
    }

    #[async_trait]
    impl SchedulerStage<ComputeRequest> for TableStage {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(
            &self,
            _trace: &RunTrace,
            _request: &ComputeRequest,
            weights: &HashMap<Subject, f64>,
        ) -> Result<StepResult, SchedulerError> {
            let mut result = StepResult::new();
            for (subject, value) in &self.table {
                if weights.contains_key(subject) {
                    result.activate(subject.clone(), *value);
                }
            }
            Ok(result)
        }
    }

    fn request(hosts: &[&str], weights: &[(&str, f64)]) -> ComputeRequest {
        ComputeRequest {
            project_id: "p1".to_string(),
            instance_uuid: Uuid::new_v4(),
            num_instances: 1,
            flavor: Flavor {
                name: "m1.small".to_string(),
                vcpus: 1,
                memory_mb: 512,
                extra_specs: HashMap::new(),
                is_vmware: false,
                affinity: None,
                scheduler_hints: HashMap::new(),
            },
            hosts: hosts.iter().map(|h| Subject::new(*h)).collect(),
            weights: weights.iter().map(|(h, w)| (Subject::new(*h), *w)).collect(),
        }
    }

    #[tokio::test]
    async fn test_weights_accumulate_across_stages() {
        let pipeline = SchedulerPipeline::new(
            "test",
            vec![
                TableStage::new("s1", &[("h1", 1.0), ("h2", 0.5)]) as Arc<dyn SchedulerStage<ComputeRequest>>,
                TableStage::new("s2", &[("h1", 0.25), ("h2", 1.0)]),
            ],
        );
        let outcome = pipeline.run(&request(&["h1", "h2"], &[])).await.unwrap();
        assert_eq!(outcome.weights[&Subject::new("h1")], 1.25);
        assert_eq!(outcome.weights[&Subject::new("h2")], 1.5);
        assert_eq!(outcome.ranked, vec![Subject::new("h2"), Subject::new("h1")]);
        assert_eq!(outcome.steps.len(), 2);
    }

    #[tokio::test]
    async fn test_absent_subject_is_filtered() {
        let pipeline = SchedulerPipeline::new(
            "test",
            vec![TableStage::new("only-h1", &[("h1", 0.0)]) as Arc<dyn SchedulerStage<ComputeRequest>>],
        );
        let outcome = pipeline.run(&request(&["h1", "h2"], &[])).await.unwrap();
        assert_eq!(outcome.ranked, vec![Subject::new("h1")]);
        assert!(!outcome.weights.contains_key(&Subject::new("h2")));
    }

    #[tokio::test]
    async fn test_ties_break_by_ascending_identifier() {
        let pipeline = SchedulerPipeline::new(
            "test",
            vec![TableStage::new("flat", &[("hb", 0.0), ("ha", 0.0), ("hc", 0.0)])
                as Arc<dyn SchedulerStage<ComputeRequest>>],
        );
        let outcome = pipeline.run(&request(&["hb", "ha", "hc"], &[])).await.unwrap();
        assert_eq!(
            outcome.ranked,
            vec![Subject::new("ha"), Subject::new("hb"), Subject::new("hc")]
        );
    }

    #[tokio::test]
    async fn test_empty_host_list_is_a_valid_run() {
        let pipeline = SchedulerPipeline::new(
            "test",
            vec![TableStage::new("s1", &[("h1", 1.0)]) as Arc<dyn SchedulerStage<ComputeRequest>>],
        );
        let outcome = pipeline.run(&request(&[], &[])).await.unwrap();
        assert!(outcome.ranked.is_empty());
    }

    #[tokio::test]
    async fn test_single_host_keeps_baseline_plus_contributions() {
        let pipeline = SchedulerPipeline::new(
            "test",
            vec![
                TableStage::new("s1", &[("h1", 0.3)]) as Arc<dyn SchedulerStage<ComputeRequest>>,
                TableStage::new("s2", &[("h1", 0.2)]),
            ],
        );
        let outcome = pipeline.run(&request(&["h1"], &[("h1", 1.0)])).await.unwrap();
        assert_eq!(outcome.ranked, vec![Subject::new("h1")]);
        assert!((outcome.weights[&Subject::new("h1")] - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rerun_is_deterministic() {
        let pipeline = SchedulerPipeline::new(
            "test",
            vec![TableStage::new("s1", &[("h1", 0.7), ("h2", 0.7), ("h3", 0.1)])
                as Arc<dyn SchedulerStage<ComputeRequest>>],
        );
        let req = request(&["h1", "h2", "h3"], &[]);
        let first = pipeline.run(&req).await.unwrap();
        let second = pipeline.run(&req).await.unwrap();
        assert_eq!(first.ranked, second.ranked);
    }
}
