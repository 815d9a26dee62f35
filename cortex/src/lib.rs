// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cortex
//!
//! External scheduling and descheduling engine for a cloud infrastructure
//! platform. For each incoming placement request from the compute, storage,
//! or share services, Cortex runs a configurable pipeline of filter and
//! weigher stages over the candidate host set and returns a ranked host
//! list. A parallel descheduling subsystem emits migration recommendations
//! for workloads whose hosts have become undesirable.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Application Layer                                           │
//! │  (controllers: datasource sync, knowledge, trigger fan-out,  │
//! │   pipeline assembly, decisions, machines, descheduler)       │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Domain Layer (cortex-domain)                                │
//! │  (records, request shapes, stage contract, pipeline engine)  │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Infrastructure Layer                                        │
//! │  (sqlite feature store, stage registries and plugins,        │
//! │   extractors, upstream syncers, metrics, configuration)      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Concepts
//!
//! ### Knowledge Extraction Graph
//! Datasource syncers mirror upstream inventories into the shared SQLite
//! feature store; extractors derive feature rows from them. Knowledge
//! records gate on upstream readiness and re-extract when stale or when an
//! upstream changes.
//!
//! ### Pipelines
//! Pipeline records reference Step records; steps bind a stage
//! implementation to options and Knowledge dependencies. Ready pipelines
//! are assembled through the per-kind stage registries, wrapped with
//! monitoring and validation, and cached for decision processing.
//!
//! ### Decisions
//! A Decision record carries one raw placement request. The matching
//! controller resolves the pipeline, runs it, and writes the ranked result
//! (or the error) back into the record's status, the commit point of a
//! scheduling round.

pub mod application;
pub mod infrastructure;
