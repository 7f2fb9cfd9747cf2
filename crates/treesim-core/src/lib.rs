//! treesim-core library.
//!
//! Normalized document trees, the recursive similarity engine, and the
//! parallel batch comparator that scores many document pairs at once.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for application-facing loaders and
//!   [`error::Result`] for typed library failures.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

#![forbid(unsafe_code)]

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod ratio;
pub mod scores;
pub mod timing;
pub mod tree;

pub use batch::{BatchComparator, BatchRun, BatchSummary, CancelToken, ProgressObserver, TreeSet};
pub use engine::{SimilarityEngine, Weights};
pub use error::{Error, ErrorCode};
pub use scores::{PairOutcome, PairwiseScores};
pub use tree::{Node, Text};
