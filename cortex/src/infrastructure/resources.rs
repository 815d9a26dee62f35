// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Resource Plane
//!
//! In-process stand-in for the external declarative resource store and its
//! watch machinery. Records live in typed maps keyed by
//! `(namespace, name)`; every mutation emits a [`ResourceEvent`] on a
//! broadcast channel the controllers subscribe to.
//!
//! Spec writes bump the record's generation; status writes do not, and
//! they emit a distinct change kind. That distinction is what keeps a
//! controller's own status write from retriggering the same reconcile.
//!
//! The broadcast channel may lag a slow subscriber; every controller also
//! runs a periodic tick over the full record list, so a dropped event only
//! delays a reconcile, never loses it.

use cortex_domain::entities::{
    Datasource, DatasourceStatus, Decision, DecisionStatus, Descheduling, DeschedulingStatus, Knowledge,
    KnowledgeStatus, Machine, Pipeline, PipelineStatus, Step, StepStatus,
};
use cortex_domain::SchedulerError;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// `(namespace, name)` key of a record.
pub type ResourceKey = (String, String);

/// The record type an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Datasource,
    Knowledge,
    Step,
    Pipeline,
    Decision,
    Descheduling,
    Machine,
}

/// What changed about the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Spec,
    Status,
    Deleted,
}

/// One create/update/delete notification.
#[derive(Debug, Clone)]
pub struct ResourceEvent {
    pub kind: ResourceKind,
    pub key: ResourceKey,
    pub change: ChangeKind,
}

/// Typed record collections plus the shared event stream.
pub struct ResourcePlane {
    datasources: RwLock<HashMap<ResourceKey, Datasource>>,
    knowledges: RwLock<HashMap<ResourceKey, Knowledge>>,
    steps: RwLock<HashMap<ResourceKey, Step>>,
    pipelines: RwLock<HashMap<ResourceKey, Pipeline>>,
    decisions: RwLock<HashMap<ResourceKey, Decision>>,
    deschedulings: RwLock<HashMap<ResourceKey, Descheduling>>,
    machines: RwLock<HashMap<ResourceKey, Machine>>,
    events: broadcast::Sender<ResourceEvent>,
}

macro_rules! record_accessors {
    ($field:ident, $ty:ty, $kind:expr, $get:ident, $list:ident, $apply:ident, $delete:ident) => {
        pub fn $get(&self, key: &ResourceKey) -> Option<$ty> {
            self.$field.read().get(key).cloned()
        }

        pub fn $list(&self) -> Vec<$ty> {
            self.$field.read().values().cloned().collect()
        }

        /// Inserts or replaces the record's spec half, bumping the
        /// generation when the record already exists.
        pub fn $apply(&self, mut record: $ty) {
            let key = record.meta.key();
            {
                let mut map = self.$field.write();
                if let Some(existing) = map.get(&key) {
                    record.meta.generation = existing.meta.generation + 1;
                }
                map.insert(key.clone(), record);
            }
            self.emit($kind, key, ChangeKind::Spec);
        }

        pub fn $delete(&self, key: &ResourceKey) -> bool {
            let removed = self.$field.write().remove(key).is_some();
            if removed {
                self.emit($kind, key.clone(), ChangeKind::Deleted);
            }
            removed
        }
    };
}

macro_rules! status_updater {
    ($field:ident, $status_ty:ty, $kind:expr, $update:ident) => {
        /// Mutates the record's status in place. Does not bump the
        /// generation. Returns false when the record is gone.
        pub fn $update<F>(&self, key: &ResourceKey, mutate: F) -> bool
        where
            F: FnOnce(&mut $status_ty),
        {
            let updated = {
                let mut map = self.$field.write();
                match map.get_mut(key) {
                    Some(record) => {
                        mutate(&mut record.status);
                        true
                    }
                    None => false,
                }
            };
            if updated {
                self.emit($kind, key.clone(), ChangeKind::Status);
            }
            updated
        }
    };
}

impl ResourcePlane {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            datasources: RwLock::new(HashMap::new()),
            knowledges: RwLock::new(HashMap::new()),
            steps: RwLock::new(HashMap::new()),
            pipelines: RwLock::new(HashMap::new()),
            decisions: RwLock::new(HashMap::new()),
            deschedulings: RwLock::new(HashMap::new()),
            machines: RwLock::new(HashMap::new()),
            events,
        })
    }

    /// A fresh subscription to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.events.subscribe()
    }

    fn emit(&self, kind: ResourceKind, key: ResourceKey, change: ChangeKind) {
        // Send fails only when nobody subscribed yet, which is fine.
        let _ = self.events.send(ResourceEvent { kind, key, change });
    }

    record_accessors!(
        datasources,
        Datasource,
        ResourceKind::Datasource,
        get_datasource,
        list_datasources,
        apply_datasource,
        delete_datasource
    );
    status_updater!(datasources, DatasourceStatus, ResourceKind::Datasource, update_datasource_status);

    record_accessors!(
        knowledges,
        Knowledge,
        ResourceKind::Knowledge,
        get_knowledge,
        list_knowledges,
        apply_knowledge,
        delete_knowledge
    );
    status_updater!(knowledges, KnowledgeStatus, ResourceKind::Knowledge, update_knowledge_status);

    record_accessors!(steps, Step, ResourceKind::Step, get_step, list_steps, apply_step, delete_step);
    status_updater!(steps, StepStatus, ResourceKind::Step, update_step_status);

    record_accessors!(
        pipelines,
        Pipeline,
        ResourceKind::Pipeline,
        get_pipeline,
        list_pipelines,
        apply_pipeline,
        delete_pipeline
    );
    status_updater!(pipelines, PipelineStatus, ResourceKind::Pipeline, update_pipeline_status);

    record_accessors!(
        decisions,
        Decision,
        ResourceKind::Decision,
        get_decision,
        list_decisions,
        apply_decision,
        delete_decision
    );
    status_updater!(decisions, DecisionStatus, ResourceKind::Decision, update_decision_status);

    record_accessors!(
        deschedulings,
        Descheduling,
        ResourceKind::Descheduling,
        get_descheduling,
        list_deschedulings,
        apply_descheduling,
        delete_descheduling
    );
    status_updater!(
        deschedulings,
        DeschedulingStatus,
        ResourceKind::Descheduling,
        update_descheduling_status
    );

    record_accessors!(
        machines,
        Machine,
        ResourceKind::Machine,
        get_machine,
        list_machines,
        apply_machine,
        delete_machine
    );

    /// Seeds the plane from a YAML bundle, returning how many records were
    /// applied.
    pub fn seed_from_yaml(&self, text: &str) -> Result<usize, SchedulerError> {
        let bundle: ResourceBundle =
            serde_yaml::from_str(text).map_err(|e| SchedulerError::invalid_config(format!("bad resource file: {e}")))?;
        let mut applied = 0;
        for r in bundle.datasources {
            self.apply_datasource(r);
            applied += 1;
        }
        for r in bundle.knowledges {
            self.apply_knowledge(r);
            applied += 1;
        }
        for r in bundle.steps {
            self.apply_step(r);
            applied += 1;
        }
        for r in bundle.pipelines {
            self.apply_pipeline(r);
            applied += 1;
        }
        for r in bundle.decisions {
            self.apply_decision(r);
            applied += 1;
        }
        for r in bundle.machines {
            self.apply_machine(r);
            applied += 1;
        }
        Ok(applied)
    }
}

/// YAML shape of a startup resource bundle.
#[derive(Debug, Default, Deserialize)]
pub struct ResourceBundle {
    #[serde(default)]
    pub datasources: Vec<Datasource>,
    #[serde(default)]
    pub knowledges: Vec<Knowledge>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub pipelines: Vec<Pipeline>,
    #[serde(default)]
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub machines: Vec<Machine>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_domain::entities::{MachineSpec, ResourceMeta};

    fn machine(name: &str) -> Machine {
        Machine {
            meta: ResourceMeta::new(name, "ns", "cortex"),
            spec: MachineSpec {
                size: "l2.small".to_string(),
                pool_ref: None,
            },
        }
    }

    #[test]
    fn test_apply_bumps_generation_on_replace() {
        let plane = ResourcePlane::new();
        plane.apply_machine(machine("m1"));
        plane.apply_machine(machine("m1"));
        let key = ("ns".to_string(), "m1".to_string());
        assert_eq!(plane.get_machine(&key).unwrap().meta.generation, 2);
    }

    #[tokio::test]
    async fn test_status_write_emits_status_event() {
        let plane = ResourcePlane::new();
        let mut rx = plane.subscribe();

        plane.apply_decision(Decision {
            meta: ResourceMeta::new("d1", "ns", "cortex"),
            spec: cortex_domain::entities::DecisionSpec {
                kind: cortex_domain::entities::DecisionKind::Compute,
                pipeline: cortex_domain::ResourceRef::new("p", "ns"),
                resource_id: "r".to_string(),
                source_host: None,
                prior_decisions: vec![],
                payload: serde_json::Value::Null,
            },
            status: DecisionStatus::default(),
        });
        let key = ("ns".to_string(), "d1".to_string());
        plane.update_decision_status(&key, |s| s.error = "boom".to_string());

        let first = rx.recv().await.unwrap();
        assert_eq!(first.change, ChangeKind::Spec);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.change, ChangeKind::Status);
        assert_eq!(second.kind, ResourceKind::Decision);
    }

    #[test]
    fn test_seed_from_yaml() {
        let plane = ResourcePlane::new();
        let yaml = r#"
machines:
  - meta: {name: m1, namespace: ns, operator: cortex}
    spec: {size: l2.small}
"#;
        let applied = plane.seed_from_yaml(yaml).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(plane.list_machines().len(), 1);
    }
}
