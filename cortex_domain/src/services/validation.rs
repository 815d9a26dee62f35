// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Validation Wrapper
//!
//! A stage-to-stage decorator enforcing the stage contract after every run:
//!
//! 1. No subject may appear in the output that was not in the input.
//! 2. With `same_subject_count`, the output size must equal the input size.
//! 3. With `some_subjects_remain`, a non-empty input must yield a non-empty
//!    output.
//!
//! A violation aborts the pipeline run with a
//! [`SchedulerError::StageContractViolation`]. The wrapper is applied at
//! pipeline assembly unless the step explicitly disables validation.

use crate::entities::step::ValidationToggles;
use crate::error::SchedulerError;
use crate::services::request::PipelineRequest;
use crate::services::stage::{RunTrace, SchedulerStage, StepResult};
use crate::value_objects::Subject;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Decorator checking a stage's output against the stage contract.
pub struct ValidatedStage<R: PipelineRequest> {
    inner: Arc<dyn SchedulerStage<R>>,
    toggles: ValidationToggles,
}

impl<R: PipelineRequest> std::fmt::Debug for ValidatedStage<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedStage")
            .field("inner", &self.inner.name())
            .field("toggles", &self.toggles)
            .finish()
    }
}

impl<R: PipelineRequest> ValidatedStage<R> {
    pub fn new(inner: Arc<dyn SchedulerStage<R>>, toggles: ValidationToggles) -> Self {
        Self { inner, toggles }
    }
}

#[async_trait]
impl<R: PipelineRequest> SchedulerStage<R> for ValidatedStage<R> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(
        &self,
        trace: &RunTrace,
        request: &R,
        weights: &HashMap<Subject, f64>,
    ) -> Result<StepResult, SchedulerError> {
        let result = self.inner.run(trace, request, weights).await?;

        for subject in result.activations.keys() {
            if !weights.contains_key(subject) {
                return Err(SchedulerError::contract_violation(format!(
                    "stage {} returned subject {} that was not in its input",
                    self.inner.name(),
                    subject
                )));
            }
        }

        if self.toggles.same_subject_count && result.activations.len() != weights.len() {
            return Err(SchedulerError::contract_violation(format!(
                "stage {} returned {} subjects for {} inputs but must keep the count",
                self.inner.name(),
                result.activations.len(),
                weights.len()
            )));
        }

        if self.toggles.some_subjects_remain && result.activations.is_empty() && !weights.is_empty() {
            return Err(SchedulerError::contract_violation(format!(
                "stage {} filtered out every remaining subject",
                self.inner.name()
            )));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::request::ComputeRequest;
    use crate::entities::request::Flavor;
    use uuid::Uuid;

    #[derive(Debug)]
    struct FixedStage {
        output: Vec<&'static str>,
    }

    #[async_trait]
    impl SchedulerStage<ComputeRequest> for FixedStage {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn run(
            &self,
            _trace: &RunTrace,
            _request: &ComputeRequest,
            _weights: &HashMap<Subject, f64>,
        ) -> Result<StepResult, SchedulerError> {
            Ok(StepResult::echo(self.output.iter().map(|s| Subject::new(*s))))
        }
    }

    fn request(hosts: &[&str]) -> ComputeRequest {
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
            weights: HashMap::new(),
        }
    }

    fn weights(hosts: &[&str]) -> HashMap<Subject, f64> {
        hosts.iter().map(|h| (Subject::new(*h), 0.0)).collect()
    }

    #[tokio::test]
    async fn test_new_subject_in_output_is_a_violation() {
        let stage = ValidatedStage::new(
            Arc::new(FixedStage {
                output: vec!["h1", "h3"],
            }),
            ValidationToggles::default(),
        );
        let trace = RunTrace::new("t", vec![]);
        let err = stage
            .run(&trace, &request(&["h1", "h2"]), &weights(&["h1", "h2"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::StageContractViolation(_)));
    }

    #[tokio::test]
    async fn test_subject_count_enforced_when_toggled() {
        let toggles = ValidationToggles {
            same_subject_count: true,
            ..Default::default()
        };
        let stage = ValidatedStage::new(Arc::new(FixedStage { output: vec!["h1"] }), toggles);
        let trace = RunTrace::new("t", vec![]);
        let err = stage
            .run(&trace, &request(&["h1", "h2"]), &weights(&["h1", "h2"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::StageContractViolation(_)));
    }

    #[tokio::test]
    async fn test_empty_output_enforced_when_toggled() {
        let toggles = ValidationToggles {
            some_subjects_remain: true,
            ..Default::default()
        };
        let stage = ValidatedStage::new(Arc::new(FixedStage { output: vec![] }), toggles);
        let trace = RunTrace::new("t", vec![]);
        let err = stage
            .run(&trace, &request(&["h1"]), &weights(&["h1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::StageContractViolation(_)));
    }

    #[tokio::test]
    async fn test_empty_input_allows_empty_output() {
        let toggles = ValidationToggles {
            some_subjects_remain: true,
            ..Default::default()
        };
        let stage = ValidatedStage::new(Arc::new(FixedStage { output: vec![] }), toggles);
        let trace = RunTrace::new("t", vec![]);
        let result = stage.run(&trace, &request(&[]), &weights(&[])).await.unwrap();
        assert!(result.activations.is_empty());
    }
}
