// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared fixtures for the integration suites: an in-memory world plus
//! record builders in the test operator's namespace.

#![allow(dead_code)]

use cortex::infrastructure::metrics::MetricsService;
use cortex::infrastructure::resources::ResourcePlane;
use cortex::infrastructure::store::FeatureStore;
use cortex_domain::entities::{
    Decision, DecisionKind, DecisionSpec, Knowledge, KnowledgeSpec, Pipeline, PipelineKind, PipelineSpec,
    ResourceMeta, Step, StepKind, StepRef, StepSpec, ValidationToggles,
};
use cortex_domain::ResourceRef;
use std::collections::HashMap;
use std::sync::Arc;

pub const OPERATOR: &str = "cortex-test";
pub const NS: &str = "testing";

pub struct World {
    pub resources: Arc<ResourcePlane>,
    pub store: Arc<FeatureStore>,
    pub metrics: Arc<MetricsService>,
}

pub async fn world() -> World {
    let store = FeatureStore::in_memory().await.unwrap();
    store.ensure_schema().await.unwrap();
    World {
        resources: ResourcePlane::new(),
        store: Arc::new(store),
        metrics: Arc::new(MetricsService::new().unwrap()),
    }
}

pub fn key(name: &str) -> (String, String) {
    (NS.to_string(), name.to_string())
}

pub fn step(name: &str, implementation: &str, kind: StepKind, options: serde_json::Value) -> Step {
    step_with(name, implementation, kind, options, vec![], ValidationToggles::default())
}

pub fn step_with(
    name: &str,
    implementation: &str,
    kind: StepKind,
    options: serde_json::Value,
    knowledges: Vec<ResourceRef>,
    validations: ValidationToggles,
) -> Step {
    Step {
        meta: ResourceMeta::new(name, NS, OPERATOR),
        spec: StepSpec {
            implementation: implementation.to_string(),
            kind,
            options,
            knowledges,
            validations,
        },
        status: Default::default(),
    }
}

pub fn pipeline(name: &str, kind: PipelineKind, target: DecisionKind, steps: &[(&str, bool)]) -> Pipeline {
    Pipeline {
        meta: ResourceMeta::new(name, NS, OPERATOR),
        spec: PipelineSpec {
            kind,
            target,
            steps: steps
                .iter()
                .map(|(step_name, mandatory)| StepRef {
                    step: ResourceRef::new(*step_name, NS),
                    mandatory: *mandatory,
                })
                .collect(),
        },
        status: Default::default(),
    }
}

pub fn decision(name: &str, kind: DecisionKind, pipeline_name: &str, payload: serde_json::Value) -> Decision {
    Decision {
        meta: ResourceMeta::new(name, NS, OPERATOR),
        spec: DecisionSpec {
            kind,
            pipeline: ResourceRef::new(pipeline_name, NS),
            resource_id: name.to_string(),
            source_host: None,
            prior_decisions: vec![],
            payload,
        },
        status: Default::default(),
    }
}

pub fn knowledge(name: &str, extractor: &str, datasources: Vec<ResourceRef>) -> Knowledge {
    Knowledge {
        meta: ResourceMeta::new(name, NS, OPERATOR),
        spec: KnowledgeSpec {
            extractor: extractor.to_string(),
            recency_secs: 600,
            datasources,
            knowledges: vec![],
            options: serde_json::Value::Null,
            store: "cortex-db".to_string(),
        },
        status: Default::default(),
    }
}

/// Compute request payload over the given hosts.
pub fn compute_payload(hosts: &[&str], vcpus: u64, hints: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "project_id": "p1",
        "instance_uuid": "5ab9f7e0-5b0f-4a1f-9e52-0c9b53b7fbe7",
        "num_instances": 1,
        "flavor": {
            "name": "m1.small",
            "vcpus": vcpus,
            "memory_mb": 2048,
            "scheduler_hints": hints,
        },
        "hosts": hosts,
        "weights": HashMap::<String, f64>::new(),
    })
}

pub async fn seed_cpu_utilization(store: &FeatureStore, rows: &[(&str, f64, f64)]) {
    for (host, used, capacity) in rows {
        sqlx::query("INSERT INTO feature_host_utilization (host, resource, used, capacity) VALUES (?, 'cpu', ?, ?)")
            .bind(host)
            .bind(used)
            .bind(capacity)
            .execute(store.pool())
            .await
            .unwrap();
    }
}
