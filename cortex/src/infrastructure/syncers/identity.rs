// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Identity-service syncers: projects, and the commitments that hang off
//! them. Commitments require projects to be mirrored first; with no
//! projects in the store the syncer returns the distinguished waiting
//! error and writes nothing.

use crate::infrastructure::store::FeatureStore;
use crate::infrastructure::syncers::apis::IdentityApi;
use crate::infrastructure::syncers::base::Syncer;
use cortex_bootstrap::CancellationToken;
use cortex_domain::SchedulerError;
use async_trait::async_trait;
use std::sync::Arc;

/// Mirrors the project list.
pub struct ProjectSyncer {
    api: Arc<dyn IdentityApi>,
    store: Arc<FeatureStore>,
}

impl ProjectSyncer {
    pub fn new(api: Arc<dyn IdentityApi>, store: Arc<FeatureStore>) -> Self {
        Self { api, store }
    }
}

#[async_trait]
impl Syncer for ProjectSyncer {
    fn name(&self) -> &str {
        "identity-projects"
    }

    async fn init(&self) -> Result<(), SchedulerError> {
        self.store.ensure_schema().await
    }

    async fn sync(&self, _token: &CancellationToken) -> Result<usize, SchedulerError> {
        let projects = self.api.list_projects().await?;
        self.store.replace_all(&projects).await
    }
}

/// Mirrors project commitments. Depends on the project mirror.
pub struct CommitmentSyncer {
    api: Arc<dyn IdentityApi>,
    store: Arc<FeatureStore>,
}

impl CommitmentSyncer {
    pub fn new(api: Arc<dyn IdentityApi>, store: Arc<FeatureStore>) -> Self {
        Self { api, store }
    }
}

#[async_trait]
impl Syncer for CommitmentSyncer {
    fn name(&self) -> &str {
        "identity-commitments"
    }

    async fn init(&self) -> Result<(), SchedulerError> {
        self.store.ensure_schema().await
    }

    async fn sync(&self, _token: &CancellationToken) -> Result<usize, SchedulerError> {
        if self.store.count("projects").await? == 0 {
            return Err(SchedulerError::waiting_for(
                "projects not yet synced, requeueing commitments",
            ));
        }
        let commitments = self.api.list_commitments().await?;
        self.store.replace_all(&commitments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::syncers::apis::{Commitment, Project, StaticUpstream, UpstreamSnapshot};

    fn snapshot(with_projects: bool) -> UpstreamSnapshot {
        UpstreamSnapshot {
            projects: if with_projects {
                vec![Project {
                    id: "p1".to_string(),
                    name: "alpha".to_string(),
                    domain_id: "d1".to_string(),
                }]
            } else {
                vec![]
            },
            commitments: vec![Commitment {
                id: "c1".to_string(),
                project_id: "p1".to_string(),
                resource: "cpu".to_string(),
                amount: 128,
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_commitments_wait_for_projects() {
        let store = Arc::new(FeatureStore::in_memory().await.unwrap());
        store.ensure_schema().await.unwrap();
        let upstream = Arc::new(StaticUpstream::new(snapshot(true)));
        let syncer = CommitmentSyncer::new(upstream, store.clone());

        let err = syncer.sync(&CancellationToken::default()).await.unwrap_err();
        assert!(err.is_waiting());
        assert_eq!(store.count("commitments").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commitments_sync_once_projects_exist() {
        let store = Arc::new(FeatureStore::in_memory().await.unwrap());
        store.ensure_schema().await.unwrap();
        let upstream = Arc::new(StaticUpstream::new(snapshot(true)));
        let token = CancellationToken::default();

        ProjectSyncer::new(upstream.clone(), store.clone())
            .sync(&token)
            .await
            .unwrap();
        let count = CommitmentSyncer::new(upstream, store.clone()).sync(&token).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.count("commitments").await.unwrap(), 1);
    }
}
