// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Monitoring Wrapper
//!
//! The outermost decorator of every assembled stage: times the run and
//! records the surviving subject count. Failures pass through untouched;
//! observability never changes semantics.

use crate::infrastructure::metrics::MetricsService;
use cortex_domain::services::{PipelineRequest, RunTrace, SchedulerStage, StepResult};
use cortex_domain::{SchedulerError, Subject};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Decorator feeding stage timings and subject counts into Prometheus.
pub struct MonitoredStage<R: PipelineRequest> {
    inner: Arc<dyn SchedulerStage<R>>,
    metrics: Arc<MetricsService>,
}

impl<R: PipelineRequest> std::fmt::Debug for MonitoredStage<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoredStage").field("inner", &self.inner.name()).finish()
    }
}

impl<R: PipelineRequest> MonitoredStage<R> {
    pub fn new(inner: Arc<dyn SchedulerStage<R>>, metrics: Arc<MetricsService>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl<R: PipelineRequest> SchedulerStage<R> for MonitoredStage<R> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(
        &self,
        trace: &RunTrace,
        request: &R,
        weights: &HashMap<Subject, f64>,
    ) -> Result<StepResult, SchedulerError> {
        let start = Instant::now();
        let result = self.inner.run(trace, request, weights).await;
        if let Ok(step) = &result {
            self.metrics.observe_stage_run(
                &trace.pipeline,
                self.inner.name(),
                start.elapsed().as_secs_f64(),
                step.activations.len(),
            );
            tracing::debug!(
                pipeline = %trace.pipeline,
                step = %self.inner.name(),
                subjects = step.activations.len(),
                "stage run complete"
            );
        }
        result
    }
}
