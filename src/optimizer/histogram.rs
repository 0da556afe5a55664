use std::collections::HashMap;

use crate::{predicate::Op, utils::ceil_div};

/// Fixed-width histogram over one integer column, built once by a
/// scan and queried read-only by the planner.
///
/// Both `add_value` and `estimate_selectivity` are constant time for a
/// fixed bucket count. The bucket counts are kept sparse; columns with
/// narrow live ranges stay cheap.
pub struct IntHistogram {
    min: i32,
    max: i32,
    bucket_count: usize,
    bucket_width: i32,

    // bucket index -> number of values seen in that bucket
    counts: HashMap<usize, usize>,
    total: usize,
}

impl IntHistogram {
    pub fn new(bucket_count: usize, min: i32, max: i32) -> Self {
        let spread = (max - min) as usize;
        let bucket_width = ceil_div(spread.max(1), bucket_count).max(1) as i32;

        Self {
            min,
            max,
            bucket_count,
            bucket_width,
            counts: HashMap::new(),
            total: 0,
        }
    }

    /// Bucket index for `v`, clamped so out-of-range values land in
    /// the edge buckets.
    fn bucket_of(&self, v: i32) -> usize {
        let v = v.max(self.min).min(self.max);
        let index = ((v - self.min) / self.bucket_width) as usize;
        index.min(self.bucket_count - 1)
    }

    pub fn add_value(&mut self, v: i32) {
        let bucket = self.bucket_of(v);
        *self.counts.entry(bucket).or_insert(0) += 1;
        self.total += 1;
    }

    fn bucket_count_at(&self, bucket: usize) -> usize {
        self.counts.get(&bucket).copied().unwrap_or(0)
    }

    /// Estimated fraction of recorded values satisfying `value op v`.
    pub fn estimate_selectivity(&self, op: Op, v: i32) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        let total = self.total as f64;
        match op {
            Op::Equals => {
                if v < self.min || v > self.max {
                    return 0.0;
                }
                let bucket = self.bucket_of(v);
                // one bucket covers `bucket_width` distinct values
                self.bucket_count_at(bucket) as f64 / self.bucket_width as f64 / total
            }
            Op::NotEquals => 1.0 - self.estimate_selectivity(Op::Equals, v),
            Op::GreaterThan => {
                if v < self.min {
                    return 1.0;
                }
                if v > self.max {
                    return 0.0;
                }
                let bucket = self.bucket_of(v);
                self.sum_buckets(bucket + 1, self.bucket_count) / total
            }
            Op::GreaterThanOrEq => {
                if v < self.min {
                    return 1.0;
                }
                if v > self.max {
                    return 0.0;
                }
                let bucket = self.bucket_of(v);
                self.sum_buckets(bucket, self.bucket_count) / total
            }
            Op::LessThan => {
                if v < self.min {
                    return 0.0;
                }
                if v > self.max {
                    return 1.0;
                }
                let bucket = self.bucket_of(v);
                self.sum_buckets(0, bucket) / total
            }
            Op::LessThanOrEq => {
                if v < self.min {
                    return 0.0;
                }
                if v > self.max {
                    return 1.0;
                }
                let bucket = self.bucket_of(v);
                self.sum_buckets(0, bucket + 1) / total
            }
            Op::Like => 1.0,
        }
    }

    /// Average selectivity over all values. Coarse stub.
    pub fn avg_selectivity(&self) -> f64 {
        1.0
    }

    fn sum_buckets(&self, from: usize, to: usize) -> f64 {
        // the sparse map usually holds far fewer entries than the
        // bucket range
        self.counts
            .iter()
            .filter(|(bucket, _)| **bucket >= from && **bucket < to)
            .map(|(_, count)| *count)
            .sum::<usize>() as f64
    }
}
