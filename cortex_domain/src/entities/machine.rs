// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Machine Record
//!
//! The workload object of bare-machine scheduling. Unlike the other three
//! pipeline kinds, machine placement is not request-driven: the machine
//! controller watches for Machines lacking a pool reference, synthesises a
//! Decision on their behalf, and writes the top-ranked pool back onto
//! `pool_ref` after the run.

use crate::entities::meta::ResourceMeta;
use serde::{Deserialize, Serialize};

/// Operator-provided half of a machine record. `pool_ref` is the one field
/// the scheduler mutates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSpec {
    /// Size class of the machine, matched against pool capacity.
    pub size: String,
    /// The pool this machine is scheduled into; `None` until placed.
    #[serde(default)]
    pub pool_ref: Option<String>,
}

/// A bare machine awaiting (or holding) a pool placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub meta: ResourceMeta,
    pub spec: MachineSpec,
}

impl Machine {
    /// True while the machine still needs a placement decision.
    pub fn needs_placement(&self) -> bool {
        self.spec.pool_ref.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_placement_until_pool_ref_set() {
        let mut m = Machine {
            meta: ResourceMeta::new("node-17", "monsoon", "cortex"),
            spec: MachineSpec {
                size: "l2.xlarge".to_string(),
                pool_ref: None,
            },
        };
        assert!(m.needs_placement());
        m.spec.pool_ref = Some("pool-a".to_string());
        assert!(!m.needs_placement());
    }
}
