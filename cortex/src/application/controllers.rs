// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Controllers
//!
//! One long-lived loop per concern, all sharing the resource plane's event
//! stream and the shutdown token:
//!
//! - [`datasource::DatasourceController`] drives the syncers
//! - [`knowledge::KnowledgeController`] gates and runs the extractors
//! - [`trigger::TriggerController`] fans upstream changes out to dependents
//! - [`pipeline::PipelineController`] keeps the live pipeline cache
//! - [`decision::DecisionController`] answers placement requests
//! - [`machine::MachineController`] synthesises bare-machine decisions
//! - [`descheduler::DeschedulerController`] and
//!   [`descheduler::DeschedulingExecutor`] recommend and hand off
//!   migrations
//!
//! Within one controller, reconciles run sequentially off its event
//! subscription; across controllers everything is concurrent. Status
//! writes are the only cross-controller signal.

pub mod datasource;
pub mod decision;
pub mod descheduler;
pub mod knowledge;
pub mod machine;
pub mod pipeline;
pub mod trigger;
