// =============================================================================
// ScaleGLM
// =============================================================================
//
// User-facing surface for training generalized linear models with feature
// normalization folded transparently into the optimization. The math lives
// in `scaleglm-core`; this crate wires it into a configure-and-fit driver:
//
//     let trainer = GlmTrainer {
//         loss: LossKind::Logistic,
//         normalization: NormalizationType::Standardization,
//         intercept_index: Some(0),
//         ..Default::default()
//     };
//     let model = trainer.fit_local(examples, dim, num_partitions)?;
//     let p = model.predict(&features)?;
//
// =============================================================================

pub mod model;
pub mod trainer;

pub use model::{GlmModel, LossKind};
pub use trainer::{GlmTrainer, OptimizerKind};

// Re-export the core types callers need to build datasets and configure runs
pub use scaleglm_core::{
    FeatureVector, LabeledExample, NormalizationType, OptimizerConfig, PartitionedDataSet,
    Regularization, Result, ScaleGlmError,
};
