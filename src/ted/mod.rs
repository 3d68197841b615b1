//! Tree edit distance engine.
//!
//! Three layers, bottom up:
//! - [band]: the diagonal-strip matrix both passes write into
//! - [touzet]: threshold-bounded single-pair distance
//! - [dynamic]: the incremental driver that caches and splices bands
//!   across successive queries

pub mod band;
pub mod dynamic;
pub mod touzet;

pub use band::BandMatrix;
pub use dynamic::{DynamicTed, PreservedSubtrees};
pub use touzet::Touzet;
