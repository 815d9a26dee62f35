// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Stage plugins and the monitoring wrapper.
//!
//! Every plugin is a deterministic function from (request, feature store,
//! options) to a step result. Plugins read the feature data they need at
//! the start of `run` and never write to the store. The validation wrapper
//! lives in the domain crate; the monitoring wrapper lives here because it
//! feeds Prometheus.

pub mod binpack;
pub mod capacity_balance;
pub mod evacuation;
pub mod hot_host;
pub mod monitoring;
pub mod pool_packing;
pub mod smallest_host;
pub mod soft_affinity;
