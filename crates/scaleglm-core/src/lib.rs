// =============================================================================
// ScaleGLM Core Library
// =============================================================================
//
// Pure-Rust math for training generalized linear models over a partitioned
// dataset, with feature normalization folded transparently into the
// objective so no transformed copy of the data is ever materialized.
//
// STRUCTURE:
// ----------
//   - dataset:       feature vectors, labeled examples, and the
//                    map + tree-reduce collection contract
//   - stats:         one-pass distributed per-feature summary aggregation
//   - normalization: scale/shift context and coefficient-space transform
//   - loss:          per-example logistic / squared / Poisson oracles
//   - objective:     normalization-transparent distributed objective
//                    and regularization penalties
//   - optimizer:     LBFGS and TRON convex minimizers
//   - error:         error types used throughout the library
//
// FOR MAINTAINERS:
// ----------------
// When adding new functionality:
//   1. Add it to the appropriate module (or create a new one)
//   2. Write tests in that module (see existing tests for examples)
//   3. Re-export public items here so users can access them easily
//
// =============================================================================

pub mod dataset;
pub mod error;
pub mod loss;
pub mod normalization;
pub mod objective;
pub mod optimizer;
pub mod stats;

// Re-export commonly used items at the top level for convenience
pub use dataset::{DistributedCollection, FeatureVector, LabeledExample, PartitionedDataSet};
pub use error::{Result, ScaleGlmError};
pub use loss::{GlmLoss, LogisticLoss, PoissonLoss, SquaredLoss};
pub use normalization::{NormalizationContext, NormalizationType};
pub use objective::{GlmObjective, Objective, Regularization};
pub use optimizer::{
    ConvergenceReason, FailureCause, Lbfgs, Optimizer, OptimizerConfig, OptimizerState, Tron,
};
pub use stats::StatisticalSummary;
