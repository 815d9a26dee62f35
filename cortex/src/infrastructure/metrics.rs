// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Service
//!
//! Prometheus instruments for the engine: stage timings and subject counts
//! from the monitoring wrapper, decision counters from the controllers, and
//! per-datasource gauges from the syncers. The service owns its registry;
//! exposition is left to the deployment.

use cortex_domain::SchedulerError;
use prometheus::{GaugeVec, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Prometheus registry plus every instrument the engine records into.
#[derive(Clone)]
pub struct MetricsService {
    registry: Arc<Registry>,

    stage_run_duration: HistogramVec,
    stage_subjects: GaugeVec,
    decisions_total: IntCounterVec,
    decision_duration: Histogram,
    datasource_objects: GaugeVec,
    datasource_sync_duration: GaugeVec,
    knowledge_features: GaugeVec,
    deschedulings_total: IntCounter,
}

impl MetricsService {
    pub fn new() -> Result<Self, SchedulerError> {
        let registry = Registry::new();

        let stage_run_duration = HistogramVec::new(
            HistogramOpts::new("stage_run_duration_seconds", "Time spent in one pipeline stage run")
                .namespace("cortex")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["pipeline", "step"],
        )
        .map_err(|e| SchedulerError::metrics_error(format!("Failed to create stage_run_duration metric: {e}")))?;

        let stage_subjects = GaugeVec::new(
            Opts::new("stage_subjects", "Subjects remaining after one stage run").namespace("cortex"),
            &["pipeline", "step"],
        )
        .map_err(|e| SchedulerError::metrics_error(format!("Failed to create stage_subjects metric: {e}")))?;

        let decisions_total = IntCounterVec::new(
            Opts::new("decisions_total", "Processed placement decisions").namespace("cortex"),
            &["kind", "outcome"],
        )
        .map_err(|e| SchedulerError::metrics_error(format!("Failed to create decisions_total metric: {e}")))?;

        let decision_duration = Histogram::with_opts(
            HistogramOpts::new("decision_duration_seconds", "Wall-clock time of one decision reconcile")
                .namespace("cortex")
                .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )
        .map_err(|e| SchedulerError::metrics_error(format!("Failed to create decision_duration metric: {e}")))?;

        let datasource_objects = GaugeVec::new(
            Opts::new("datasource_objects", "Objects mirrored by the last sync").namespace("cortex"),
            &["datasource"],
        )
        .map_err(|e| SchedulerError::metrics_error(format!("Failed to create datasource_objects metric: {e}")))?;

        let datasource_sync_duration = GaugeVec::new(
            Opts::new("datasource_sync_duration_seconds", "Duration of the last sync").namespace("cortex"),
            &["datasource"],
        )
        .map_err(|e| {
            SchedulerError::metrics_error(format!("Failed to create datasource_sync_duration metric: {e}"))
        })?;

        let knowledge_features = GaugeVec::new(
            Opts::new("knowledge_features", "Features produced by the last extraction").namespace("cortex"),
            &["knowledge"],
        )
        .map_err(|e| SchedulerError::metrics_error(format!("Failed to create knowledge_features metric: {e}")))?;

        let deschedulings_total = IntCounter::with_opts(
            Opts::new("deschedulings_total", "Migration recommendations emitted").namespace("cortex"),
        )
        .map_err(|e| SchedulerError::metrics_error(format!("Failed to create deschedulings_total metric: {e}")))?;

        for collector in [
            Box::new(stage_run_duration.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(stage_subjects.clone()),
            Box::new(decisions_total.clone()),
            Box::new(decision_duration.clone()),
            Box::new(datasource_objects.clone()),
            Box::new(datasource_sync_duration.clone()),
            Box::new(knowledge_features.clone()),
            Box::new(deschedulings_total.clone()),
        ] {
            registry
                .register(collector)
                .map_err(|e| SchedulerError::metrics_error(format!("Failed to register metric: {e}")))?;
        }

        Ok(Self {
            registry: Arc::new(registry),
            stage_run_duration,
            stage_subjects,
            decisions_total,
            decision_duration,
            datasource_objects,
            datasource_sync_duration,
            knowledge_features,
            deschedulings_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Observes one stage run: wall-clock seconds and surviving subjects.
    pub fn observe_stage_run(&self, pipeline: &str, step: &str, seconds: f64, subjects: usize) {
        self.stage_run_duration
            .with_label_values(&[pipeline, step])
            .observe(seconds);
        self.stage_subjects
            .with_label_values(&[pipeline, step])
            .set(subjects as f64);
    }

    /// Counts one finished decision reconcile.
    pub fn observe_decision(&self, kind: &str, outcome: &str, seconds: f64) {
        self.decisions_total.with_label_values(&[kind, outcome]).inc();
        self.decision_duration.observe(seconds);
    }

    /// Records the result of one datasource sync.
    pub fn observe_sync(&self, datasource: &str, objects: usize, seconds: f64) {
        self.datasource_objects
            .with_label_values(&[datasource])
            .set(objects as f64);
        self.datasource_sync_duration
            .with_label_values(&[datasource])
            .set(seconds);
    }

    /// Records the size of one knowledge extraction.
    pub fn observe_extraction(&self, knowledge: &str, features: usize) {
        self.knowledge_features
            .with_label_values(&[knowledge])
            .set(features as f64);
    }

    /// Counts one emitted migration recommendation.
    pub fn observe_descheduling(&self) {
        self.deschedulings_total.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruments_register_once() {
        let metrics = MetricsService::new().unwrap();
        metrics.observe_stage_run("vm-scheduler", "binpack", 0.002, 5);
        metrics.observe_decision("compute", "success", 0.01);
        metrics.observe_sync("hypervisors", 42, 0.8);

        let text = prometheus::TextEncoder::new()
            .encode_to_string(&metrics.registry().gather())
            .unwrap();
        assert!(text.contains("cortex_stage_run_duration_seconds"));
        assert!(text.contains("cortex_decisions_total"));
    }
}
