//! Analysis modules.
//!
//! Counting, cross-tabulation and odds-ratio computation over the article table.

pub mod aggregator;
pub mod fisher;
pub mod tables;

pub use aggregator::*;
pub use tables::*;
