//! Bucket-locked, chunked-chain concurrent hash tables: the back end for every address→region,
//! handle→metadata, and file-path→id cache in the measurement core.
//!
//! Two variants, chosen at instantiation by which struct you reach for:
//! * [`MonotonicTable`] — `get` and `get_and_insert` only, no remove.
//! * [`NonMonotonicTable`] — adds `remove`, `get_and_remove`, `remove_if`, backed by a
//!   table-wide free list of emptied chunks.
//!
//! Both share the same per-bucket chunk-chain storage (see [`bucket`], private) and take their
//! key/value/construction policy from a [`TableShape`] implementation instead of the macro
//! parameter list (`bucket_idx`, `equals`, `value_ctor`, `allocate_chunk`, …) the C template
//! takes at preprocessor time.

mod bucket;
pub mod jenkins;
mod monotonic;
mod non_monotonic;
mod shape;

pub use monotonic::MonotonicTable;
pub use non_monotonic::NonMonotonicTable;
pub use shape::TableShape;
