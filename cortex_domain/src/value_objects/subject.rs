// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Subject Identifier
//!
//! A `Subject` is a scheduling target: a compute host, a storage pool, a
//! share host, or a machine pool depending on the pipeline kind. Subjects
//! are opaque identifiers; the pipeline engine never interprets them, it
//! only accumulates weights against them and ranks them.
//!
//! The ordering on `Subject` is lexicographic; the engine uses it to break
//! weight ties deterministically (equal weights rank by ascending subject
//! identifier).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a scheduling target.
///
/// Wraps the upstream identifier string (compute-host name, storage-pool id,
/// share-host name, or machine-pool name). Cheap to clone, hashable, and
/// totally ordered for deterministic tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    /// Creates a subject from an upstream identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Subject(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Subject {
    fn from(s: &str) -> Self {
        Subject(s.to_string())
    }
}

impl From<String> for Subject {
    fn from(s: String) -> Self {
        Subject(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_ordering_is_lexicographic() {
        let a = Subject::new("host-a");
        let b = Subject::new("host-b");
        assert!(a < b);
    }

    #[test]
    fn test_subject_roundtrips_as_plain_string() {
        let s: Subject = serde_json::from_str("\"pool-7\"").unwrap();
        assert_eq!(s.as_str(), "pool-7");
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"pool-7\"");
    }
}
