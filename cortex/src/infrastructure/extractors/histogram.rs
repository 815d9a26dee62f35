// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Histogram Bucketing Helper
//!
//! Reduces raw per-workload timings into cumulative histogram rows keyed by
//! (label, bucket). The bucket sequence is a fixed 30-step exponential
//! range; downstream weighers assume this exact shape, so it is
//! deliberately not configurable.

use serde::Serialize;
use std::collections::BTreeMap;

/// Number of exponential buckets. Fixed; consumers assume it.
pub const BUCKET_COUNT: usize = 30;

const BUCKET_START: f64 = 60.0;
const BUCKET_FACTOR: f64 = 1.5;

/// One cumulative histogram row: samples of `label` with value ≤ `bucket`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramRow {
    pub label: String,
    /// Upper bound of the bucket, in the sample's unit.
    pub bucket: f64,
    /// Cumulative sample count up to this bucket.
    pub count: u64,
    /// Cumulative sample sum up to this bucket.
    pub total: f64,
}

/// The fixed exponential bucket upper bounds.
pub fn bucket_bounds() -> Vec<f64> {
    let mut bounds = Vec::with_capacity(BUCKET_COUNT);
    let mut bound = BUCKET_START;
    for _ in 0..BUCKET_COUNT {
        bounds.push(bound);
        bound *= BUCKET_FACTOR;
    }
    bounds
}

/// Buckets `(label, value)` samples into cumulative count and sum per
/// (label, bucket). Every label gets the full bucket sequence so sparse
/// labels stay comparable.
pub fn bucketize(samples: &[(String, f64)]) -> Vec<HistogramRow> {
    let bounds = bucket_bounds();
    let mut by_label: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (label, value) in samples {
        by_label.entry(label.as_str()).or_default().push(*value);
    }

    let mut rows = Vec::with_capacity(by_label.len() * BUCKET_COUNT);
    for (label, values) in by_label {
        for bound in &bounds {
            let mut count = 0u64;
            let mut total = 0.0;
            for value in &values {
                if value <= bound {
                    count += 1;
                    total += value;
                }
            }
            rows.push(HistogramRow {
                label: label.to_string(),
                bucket: *bound,
                count,
                total,
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_exponential_and_fixed() {
        let bounds = bucket_bounds();
        assert_eq!(bounds.len(), BUCKET_COUNT);
        assert_eq!(bounds[0], 60.0);
        assert!((bounds[1] / bounds[0] - 1.5).abs() < 1e-9);
        assert!(bounds.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_counts_are_cumulative() {
        let samples = vec![
            ("m1".to_string(), 50.0),
            ("m1".to_string(), 100.0),
            ("m1".to_string(), 1_000_000.0),
        ];
        let rows = bucketize(&samples);
        let m1: Vec<&HistogramRow> = rows.iter().filter(|r| r.label == "m1").collect();
        assert_eq!(m1.len(), BUCKET_COUNT);
        // First bucket (≤ 60) holds one sample, second (≤ 90) still one,
        // the last holds everything under its bound.
        assert_eq!(m1[0].count, 1);
        assert_eq!(m1[1].count, 1);
        assert_eq!(m1.last().unwrap().count, 3);
        assert!(m1.last().unwrap().total > 1_000_000.0 - 1.0);
    }

    #[test]
    fn test_labels_are_independent() {
        let samples = vec![("a".to_string(), 70.0), ("b".to_string(), 70.0)];
        let rows = bucketize(&samples);
        assert_eq!(rows.len(), 2 * BUCKET_COUNT);
        assert!(rows.iter().filter(|r| r.label == "a").all(|r| r.count <= 1));
    }

    #[test]
    fn test_empty_samples_yield_no_rows() {
        assert!(bucketize(&[]).is_empty());
    }
}
