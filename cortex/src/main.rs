// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cortex Daemon
//!
//! Entry point of the scheduling engine: parses the CLI, loads the layered
//! configuration, opens the feature store, wires the controllers, and runs
//! them until a termination signal drains them through the shutdown
//! coordinator.
//!
//! A bad configuration or an unreachable store is a startup failure; the
//! process exits non-zero before any controller runs.

use anyhow::Context;
use cortex::application::controllers::datasource::DatasourceController;
use cortex::application::controllers::decision::DecisionController;
use cortex::application::controllers::descheduler::{
    DeschedulerController, DeschedulingExecutor, LoggingActuator,
};
use cortex::application::controllers::knowledge::KnowledgeController;
use cortex::application::controllers::machine::MachineController;
use cortex::application::controllers::pipeline::{PipelineController, RegistryPipelineFactory};
use cortex::application::controllers::trigger::TriggerController;
use cortex::infrastructure::config::CortexConfig;
use cortex::infrastructure::extractors::extractor_registry;
use cortex::infrastructure::metrics::MetricsService;
use cortex::infrastructure::registry::{
    bare_machine_registry, block_storage_registry, compute_registry, descheduler_registry, file_share_registry,
};
use cortex::infrastructure::resources::ResourcePlane;
use cortex::infrastructure::store::FeatureStore;
use cortex::infrastructure::syncers::apis::StaticUpstream;
use cortex::infrastructure::syncers::SyncerDeps;
use cortex_bootstrap::{init_logging, spawn_signal_listener, Cli, ShutdownCoordinator};
use cortex_domain::entities::{
    BareMachineRequest, BlockStorageRequest, ComputeRequest, DecisionKind, FileShareRequest,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose).map_err(|e| anyhow::anyhow!(e))?;

    let mut config = CortexConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(operator) = cli.operator {
        config.operator = operator;
    }
    tracing::info!(operator = %config.operator, database = %config.database.url, "starting cortex");

    let store = Arc::new(
        FeatureStore::connect(&config.database.url)
            .await
            .context("connecting to the feature store")?,
    );
    store.ensure_schema().await.context("creating store schema")?;

    let metrics = Arc::new(MetricsService::new().context("registering metrics")?);
    let resources = ResourcePlane::new();
    if let Some(path) = &cli.resources {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading resource bundle {}", path.display()))?;
        let applied = resources.seed_from_yaml(&text).context("seeding resource plane")?;
        tracing::info!(records = applied, "seeded resource plane");
    }

    let upstream = match &config.upstream.snapshot_file {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading upstream snapshot {path}"))?;
            Arc::new(StaticUpstream::from_yaml(&text).context("parsing upstream snapshot")?)
        }
        None => Arc::new(StaticUpstream::default()),
    };
    let syncer_deps = SyncerDeps {
        store: store.clone(),
        compute: upstream.clone(),
        identity: upstream.clone(),
        placement: upstream.clone(),
        storage: upstream.clone(),
        bare_metal: upstream,
    };

    let coordinator = ShutdownCoordinator::default();
    let _signals = spawn_signal_listener(coordinator.clone());
    let mut tasks = JoinSet::new();

    // Knowledge extraction graph.
    let (trigger_tx, trigger_rx) = mpsc::channel(256);
    tasks.spawn(
        Arc::new(DatasourceController::new(
            resources.clone(),
            syncer_deps,
            metrics.clone(),
            config.operator.clone(),
            config.intervals.sync_tick(),
            config.intervals.sync_backoff(),
        ))
        .run(coordinator.token()),
    );
    tasks.spawn(
        Arc::new(KnowledgeController::new(
            resources.clone(),
            store.clone(),
            Arc::new(extractor_registry()),
            metrics.clone(),
            config.operator.clone(),
            config.intervals.knowledge_tick(),
        ))
        .run(coordinator.token(), trigger_rx),
    );
    tasks.spawn(
        Arc::new(TriggerController::new(
            resources.clone(),
            trigger_tx,
            config.operator.clone(),
        ))
        .run(coordinator.token()),
    );

    // Pipeline controllers and the per-kind decision controllers.
    macro_rules! spawn_kind {
        ($registry:expr, $request:ty, $kind:expr) => {{
            let factory = Arc::new(RegistryPipelineFactory::<$request>::new(
                Arc::new($registry),
                store.clone(),
                metrics.clone(),
            ));
            let controller = Arc::new(PipelineController::<$request>::new(
                resources.clone(),
                factory,
                $kind,
                config.operator.clone(),
            ));
            let cache = controller.cache();
            tasks.spawn(controller.run(coordinator.token()));
            tasks.spawn(
                Arc::new(DecisionController::<$request>::new(
                    resources.clone(),
                    cache,
                    $kind,
                    config.operator.clone(),
                    metrics.clone(),
                    config.intervals.decision_retry(),
                ))
                .run(coordinator.token()),
            );
        }};
    }
    spawn_kind!(compute_registry(), ComputeRequest, DecisionKind::Compute);
    spawn_kind!(block_storage_registry(), BlockStorageRequest, DecisionKind::BlockStorage);
    spawn_kind!(file_share_registry(), FileShareRequest, DecisionKind::FileShare);
    spawn_kind!(bare_machine_registry(), BareMachineRequest, DecisionKind::BareMachine);

    // Machine auto-scheduling.
    tasks.spawn(
        Arc::new(MachineController::new(
            resources.clone(),
            store.clone(),
            config.operator.clone(),
            config.machines.default_pipeline.clone(),
            config.machines.namespace.clone(),
            config.intervals.decision_retry(),
        ))
        .run(coordinator.token()),
    );

    // Descheduling.
    tasks.spawn(
        Arc::new(DeschedulerController::new(
            resources.clone(),
            Arc::new(descheduler_registry()),
            store.clone(),
            metrics.clone(),
            config.operator.clone(),
            config.descheduler.interval(),
        ))
        .run(coordinator.token()),
    );
    tasks.spawn(
        Arc::new(DeschedulingExecutor::new(
            resources.clone(),
            store.clone(),
            Arc::new(LoggingActuator),
            config.operator.clone(),
            config.descheduler.dry_run,
            config.descheduler.interval(),
        ))
        .run(coordinator.token()),
    );

    // Wait for shutdown, then drain the controller loops.
    coordinator.token().cancelled().await;
    let drained = tokio::spawn(async move { while tasks.join_next().await.is_some() {} });
    let coordinator_for_drain = coordinator.clone();
    tokio::spawn(async move {
        let _ = drained.await;
        coordinator_for_drain.complete_shutdown();
    });
    if !coordinator.wait_for_shutdown().await {
        tracing::warn!("controllers did not drain in time");
    }
    tracing::info!("cortex stopped");
    Ok(())
}
