//! # Classification Breaks
//!
//! Turns boundary sequences into ordered, counted buckets. Equal-interval
//! bounds are computed here; quantile, Jenks and head/tail breakpoints come
//! from storage and are only stitched into buckets. Counting is delegated to
//! a closure so this module never touches storage itself.

mod breaks;
mod errors;
mod method;

pub use breaks::{
    check_bucket_count, classify, custom_breaks, equal_interval, stitch_external_breaks,
    BucketBounds, ClassificationBreak, MAX_BUCKETS,
};
pub use errors::{ClassifyError, ClassifyResult};
pub use method::BreakMethod;
