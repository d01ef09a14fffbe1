//! Bucket construction and counting
//!
//! Bucket 0 is closed on both ends; every later bucket is open below and
//! closed above, so contiguous buckets never count a row twice.

use serde::{Deserialize, Serialize};

use super::errors::{ClassifyError, ClassifyResult};

/// Range of one bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketBounds {
    pub min: f64,
    pub max: f64,
    /// `[min, max]` when set, `(min, max]` otherwise
    pub lower_inclusive: bool,
}

impl BucketBounds {
    pub fn closed(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            lower_inclusive: true,
        }
    }

    pub fn half_open(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            lower_inclusive: false,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        let above = if self.lower_inclusive {
            value >= self.min
        } else {
            value > self.min
        };
        above && value <= self.max
    }
}

/// A counted bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationBreak {
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

/// Hard ceiling on buckets per classification; every bucket costs one count
pub const MAX_BUCKETS: usize = 1000;

/// Check a requested bucket count against `1..=max`
pub fn check_bucket_count(requested: usize, max: usize) -> ClassifyResult<()> {
    if requested == 0 {
        return Err(ClassifyError::InvalidBinCount);
    }
    if requested > max {
        return Err(ClassifyError::TooManyBuckets { requested, max });
    }
    Ok(())
}

/// `n` equal-width buckets spanning `[min, max]`
pub fn equal_interval(min: f64, max: f64, n: u32) -> ClassifyResult<Vec<BucketBounds>> {
    check_bucket_count(n as usize, MAX_BUCKETS)?;
    if !min.is_finite() || !max.is_finite() {
        return Err(ClassifyError::InvalidBounds(
            "bounds must be finite".to_string(),
        ));
    }
    if min > max {
        return Err(ClassifyError::InvalidBounds(format!(
            "min {} exceeds max {}",
            min, max
        )));
    }

    let width = (max - min) / f64::from(n);
    let mut buckets = Vec::with_capacity(n as usize);
    let mut lower = min;

    for i in 0..n {
        let upper = if i + 1 == n {
            max
        } else {
            min + width * f64::from(i + 1)
        };
        buckets.push(BucketBounds {
            min: lower,
            max: upper,
            lower_inclusive: i == 0,
        });
        lower = upper;
    }

    Ok(buckets)
}

/// Buckets from externally computed breakpoints.
///
/// Each breakpoint closes one bucket. The first bucket starts at `true_min`
/// and the last one is stretched to `true_max`.
pub fn stitch_external_breaks(breakpoints: &[f64], true_min: f64, true_max: f64) -> Vec<BucketBounds> {
    let mut buckets = Vec::with_capacity(breakpoints.len());

    for (i, &bp) in breakpoints.iter().enumerate() {
        let bucket = if i == 0 {
            BucketBounds::closed(true_min, bp)
        } else {
            BucketBounds::half_open(breakpoints[i - 1], bp)
        };
        buckets.push(bucket);
    }

    if let Some(last) = buckets.last_mut() {
        last.max = true_max;
    }

    buckets
}

/// Caller-supplied `(min, max]` ranges, kept verbatim
pub fn custom_breaks(ranges: &[(f64, f64)]) -> Vec<BucketBounds> {
    ranges
        .iter()
        .map(|&(min, max)| BucketBounds::half_open(min, max))
        .collect()
}

/// Pair each bucket with the count returned by `count`
pub fn classify<E>(
    buckets: &[BucketBounds],
    mut count: impl FnMut(&BucketBounds) -> Result<u64, E>,
) -> Result<Vec<ClassificationBreak>, E> {
    buckets
        .iter()
        .map(|bucket| {
            Ok(ClassificationBreak {
                min: bucket.min,
                max: bucket.max,
                count: count(bucket)?,
            })
        })
        .collect()
}
