// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the hierarchical error system for the Cortex
//! scheduling domain. Failures are categorized so that reconcilers can decide
//! systematically whether to retry, requeue, or park a record until an
//! operator edits it.
//!
//! ## Error Categories
//!
//! - **Configuration**: `InvalidConfiguration`, `UnknownStage`: terminal at
//!   resource scope; recorded in status and not retried until the record
//!   changes.
//! - **Upstream**: `UpstreamUnavailable`: retried with backoff; the latest
//!   failure is reflected in status.
//! - **Dependency**: `DependencyNotReady`: the distinguished "waiting"
//!   error; non-terminal, requeued when the dependency becomes ready.
//! - **Data**: `DataIntegrity`, `SerializationError`: terminal; surfaced
//!   verbatim for operator intervention.
//! - **Pipeline**: `StageContractViolation`, `PipelineNotFound`: a contract
//!   violation aborts the pipeline run and lands in the Decision status.
//! - **Infrastructure**: `StoreError` (transient, retried), `MetricsError`,
//!   `Cancelled`, `InternalError`.
//!
//! ## Propagation
//!
//! Stage errors bubble up to the pipeline; pipeline errors bubble to the
//! decision controller, which records them in status and never raises them to
//! the outer loop. Only unrecoverable programming errors propagate out.

use thiserror::Error;

/// Domain-specific errors for the scheduling system.
///
/// Each variant carries a descriptive message. The categorization methods
/// (`is_retryable`, `is_waiting`, `is_terminal`) drive the reconcilers'
/// requeue decisions.
#[derive(Error, Debug, Clone)]
pub enum SchedulerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Dependency not ready: {0}")]
    DependencyNotReady(String),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Stage contract violation: {0}")]
    StageContractViolation(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl SchedulerError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new upstream-unavailable error
    pub fn upstream_unavailable(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    /// Creates the distinguished "waiting for a dependency" error
    pub fn waiting_for(msg: impl Into<String>) -> Self {
        Self::DependencyNotReady(msg.into())
    }

    /// Creates a new data-integrity error
    pub fn data_integrity(msg: impl Into<String>) -> Self {
        Self::DataIntegrity(msg.into())
    }

    /// Creates a new stage contract violation
    pub fn contract_violation(msg: impl Into<String>) -> Self {
        Self::StageContractViolation(msg.into())
    }

    /// Creates a new store error
    pub fn store_error(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    /// Creates a new metrics error
    pub fn metrics_error(msg: impl Into<String>) -> Self {
        Self::MetricsError(msg.into())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// True for failures that a reconciler should retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SchedulerError::UpstreamUnavailable(_) | SchedulerError::StoreError(_)
        )
    }

    /// True for the distinguished dependency-waiting condition.
    ///
    /// Waiting errors are non-terminal: the record is requeued when the
    /// dependency's status transitions to ready.
    pub fn is_waiting(&self) -> bool {
        matches!(self, SchedulerError::DependencyNotReady(_))
    }

    /// True for errors that are terminal at resource scope.
    ///
    /// Terminal errors are recorded in status and not retried until the
    /// record itself changes.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SchedulerError::InvalidConfiguration(_)
                | SchedulerError::UnknownStage(_)
                | SchedulerError::DataIntegrity(_)
                | SchedulerError::SerializationError(_)
        )
    }

    /// Gets the error category
    pub fn category(&self) -> &'static str {
        match self {
            SchedulerError::InvalidConfiguration(_) => "configuration",
            SchedulerError::UnknownStage(_) => "configuration",
            SchedulerError::UpstreamUnavailable(_) => "upstream",
            SchedulerError::DependencyNotReady(_) => "dependency",
            SchedulerError::DataIntegrity(_) => "data",
            SchedulerError::StageContractViolation(_) => "pipeline",
            SchedulerError::StoreError(_) => "store",
            SchedulerError::SerializationError(_) => "serialization",
            SchedulerError::PipelineNotFound(_) => "pipeline",
            SchedulerError::Cancelled(_) => "cancellation",
            SchedulerError::MetricsError(_) => "metrics",
            SchedulerError::InternalError(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::SerializationError(err.to_string())
    }
}
