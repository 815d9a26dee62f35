// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cross-Resource Reference
//!
//! Declarative records reference each other across namespaces using
//! `{name, namespace}` pairs: a Knowledge names its upstream Datasources, a
//! Step names its Knowledges, a Pipeline names its Steps, and a Decision
//! names its Pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `{name, namespace}` reference to another declarative record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub name: String,
    pub namespace: String,
}

impl ResourceRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// The `(namespace, name)` key used by stores and event streams.
    pub fn key(&self) -> (String, String) {
        (self.namespace.clone(), self.name.clone())
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_namespace_slash_name() {
        let r = ResourceRef::new("host-utilization", "monsoon");
        assert_eq!(r.to_string(), "monsoon/host-utilization");
    }
}
