//! t-digest sketches as a datafusion column type and aggregate functions.
//!
//! A digest is stored as a four-field struct column, built from row values
//! with the `tdigest` aggregate, combined across partitions in any merge
//! order, and read back with scalar accessor functions.

// crate-specific lint exceptions:
#![allow(clippy::missing_errors_doc)]

/// Per-group accumulation of values and partial digests
pub mod accumulator;
/// Conversion of numeric input columns into the digest's f64 domain
pub mod adapter;
/// Arrow wire format of digests and the logical type registry
pub mod codec;
/// Failure taxonomy of the digest column type
pub mod error;
/// Scalar accessor functions over encoded digests
pub mod functions;
/// The t-digest sketch itself
pub mod tdigest;
/// Aggregate function definitions and session registration
pub mod udaf;
