// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Trigger Controller
//!
//! Walks the knowledge DAG edges backwards: whenever a Datasource or
//! Knowledge status transitions, every Knowledge declaring it as an
//! upstream is requeued onto the knowledge controller's channel. Deeper
//! dependents follow naturally; their upstream's re-extraction is itself
//! a status transition that lands back here.

use crate::infrastructure::resources::{ChangeKind, ResourceEvent, ResourceKey, ResourceKind, ResourcePlane};
use cortex_bootstrap::CancellationToken;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

/// Fans upstream transitions out to dependent Knowledges.
pub struct TriggerController {
    resources: Arc<ResourcePlane>,
    requeue: mpsc::Sender<ResourceKey>,
    operator: String,
}

impl TriggerController {
    pub fn new(resources: Arc<ResourcePlane>, requeue: mpsc::Sender<ResourceKey>, operator: impl Into<String>) -> Self {
        Self {
            resources,
            requeue,
            operator: operator.into(),
        }
    }

    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        let mut events = self.resources.subscribe();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                },
            }
        }
        tracing::info!("trigger controller stopped");
    }

    async fn handle_event(&self, event: ResourceEvent) {
        let upstream_kind = match (event.kind, event.change) {
            (ResourceKind::Datasource, ChangeKind::Status) | (ResourceKind::Datasource, ChangeKind::Deleted) => {
                ResourceKind::Datasource
            }
            (ResourceKind::Knowledge, ChangeKind::Status) | (ResourceKind::Knowledge, ChangeKind::Deleted) => {
                ResourceKind::Knowledge
            }
            _ => return,
        };

        let dependents: Vec<ResourceKey> = self
            .resources
            .list_knowledges()
            .into_iter()
            .filter(|k| k.meta.owned_by(&self.operator))
            // A record declaring itself as an upstream would requeue
            // forever; the gate rejects it anyway.
            .filter(|k| upstream_kind != ResourceKind::Knowledge || k.meta.key() != event.key)
            .filter(|k| {
                let refs = match upstream_kind {
                    ResourceKind::Datasource => &k.spec.datasources,
                    _ => &k.spec.knowledges,
                };
                refs.iter().any(|r| r.key() == event.key)
            })
            .map(|k| k.meta.key())
            .collect();

        for key in dependents {
            tracing::debug!(knowledge = %key.1, upstream = %event.key.1, "requeueing dependent knowledge");
            if self.requeue.send(key).await.is_err() {
                return;
            }
        }
    }
}
