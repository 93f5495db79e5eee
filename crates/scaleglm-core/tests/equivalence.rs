// =============================================================================
// Equivalence of Folded vs. Explicit Normalization
// =============================================================================
//
// The central correctness property: training with normalization folded into
// the objective (raw data, no copy) must match training a plain objective
// on an explicitly pre-transformed dataset — same optimizer, same start,
// same loss. Final objective values to 1e-6 and coefficient vectors
// element-wise to 1e-6, across LBFGS and TRON and across the logistic /
// squared / Poisson losses, on a fixed 11-feature benchmark with wildly
// mixed feature scales.
//
// =============================================================================

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use scaleglm_core::objective::GlmObjective;
use scaleglm_core::optimizer::Optimizer;
use scaleglm_core::{
    FeatureVector, GlmLoss, LabeledExample, Lbfgs, LogisticLoss, NormalizationContext,
    NormalizationType, OptimizerConfig, PartitionedDataSet, PoissonLoss, Regularization,
    SquaredLoss, StatisticalSummary, Tron,
};

const DIM: usize = 11;
const N: usize = 60;

/// Fixed benchmark: intercept column plus ten features spanning four orders
/// of magnitude, labels generated from a known coefficient vector.
fn benchmark(loss_name: &str) -> Vec<LabeledExample> {
    let mut rng = StdRng::seed_from_u64(1711);
    let scales: [f64; DIM] = [1.0, 0.01, 0.1, 1.0, 10.0, 100.0, 0.5, 5.0, 50.0, 2.0, 0.2];
    let truth: [f64; DIM] = [0.3, 20.0, -4.0, 0.8, -0.05, 0.004, 1.0, -0.1, 0.01, -0.4, 3.0];

    (0..N)
        .map(|_| {
            let mut x = vec![1.0; DIM];
            for j in 1..DIM {
                x[j] = rng.gen_range(-1.0..1.0) * scales[j];
            }
            let margin: f64 = x.iter().zip(truth.iter()).map(|(a, b)| a * b).sum();
            let label = match loss_name {
                "logistic" => {
                    if margin > 0.0 {
                        1.0
                    } else {
                        0.0
                    }
                }
                "squared" => margin + 0.1 * rng.gen_range(-1.0..1.0),
                // Keep Poisson rates in a sane range.
                "poisson" => (0.5 * margin).clamp(-2.0, 2.0).exp().round(),
                other => panic!("unknown loss {other}"),
            };
            LabeledExample::new(label, FeatureVector::dense(&x))
        })
        .collect()
}

fn pretransform(
    examples: &[LabeledExample],
    context: &NormalizationContext,
) -> Vec<LabeledExample> {
    examples
        .iter()
        .map(|e| {
            let mut out = e.clone();
            out.features = context.transform_vector(&e.features).unwrap();
            out
        })
        .collect()
}

fn run(
    optimizer: &dyn Optimizer,
    objective: &GlmObjective<'_, PartitionedDataSet>,
) -> (f64, Array1<f64>) {
    let state = optimizer
        .minimize(objective, &Array1::zeros(DIM))
        .expect("optimization should not error");
    assert!(
        !matches!(
            state.convergence_reason,
            scaleglm_core::ConvergenceReason::Failed(_)
        ),
        "optimizer failed: {:?}",
        state.convergence_reason
    );
    (state.objective_value, state.coefficients)
}

#[test]
fn folded_normalization_matches_pretransformed_training() {
    let config = OptimizerConfig { max_iterations: 500, tolerance: 1e-12, verbose: false };
    let lbfgs = Lbfgs::new(config.clone());
    let tron = Tron::new(config);
    let optimizers: [(&str, &dyn Optimizer); 2] = [("lbfgs", &lbfgs), ("tron", &tron)];
    let losses: [&dyn GlmLoss; 3] = [&LogisticLoss, &SquaredLoss, &PoissonLoss];

    for loss in losses {
        let examples = benchmark(loss.name());
        let raw = PartitionedDataSet::partition(examples.clone(), 4).unwrap();
        let summary = StatisticalSummary::aggregate(&raw, DIM, 2).unwrap();

        for norm in [NormalizationType::Scale, NormalizationType::Standardization] {
            let context = NormalizationContext::build(&summary, norm, Some(0)).unwrap();
            let transformed =
                PartitionedDataSet::partition(pretransform(&examples, &context), 4).unwrap();
            let identity = NormalizationContext::identity(DIM, Some(0)).unwrap();

            // Ridge keeps the optimum unique and bounded for every loss.
            let reg = Regularization::L2 { lambda: 0.1 };
            let folded = GlmObjective::new(&raw, loss, &context, reg, 2).unwrap();
            let plain = GlmObjective::new(&transformed, loss, &identity, reg, 2).unwrap();

            for (opt_name, optimizer) in optimizers {
                let (f_folded, theta_folded) = run(optimizer, &folded);
                let (f_plain, theta_plain) = run(optimizer, &plain);

                assert!(
                    (f_folded - f_plain).abs() < 1e-6 * f_plain.abs().max(1.0),
                    "{} {} {:?}: objective {f_folded} vs {f_plain}",
                    loss.name(),
                    opt_name,
                    norm
                );
                for j in 0..DIM {
                    assert!(
                        (theta_folded[j] - theta_plain[j]).abs() < 1e-6,
                        "{} {} {:?}: coefficient {j}: {} vs {}",
                        loss.name(),
                        opt_name,
                        norm,
                        theta_folded[j],
                        theta_plain[j]
                    );
                }
            }
        }
    }
}

#[test]
fn identity_normalization_matches_disabled_normalization() {
    let examples = benchmark("logistic");
    let data = PartitionedDataSet::partition(examples, 3).unwrap();
    let summary = StatisticalSummary::aggregate(&data, DIM, 2).unwrap();

    let none_context =
        NormalizationContext::build(&summary, NormalizationType::None, Some(0)).unwrap();
    let disabled = NormalizationContext::identity(DIM, Some(0)).unwrap();

    let reg = Regularization::L2 { lambda: 0.01 };
    let a = GlmObjective::new(&data, &LogisticLoss, &none_context, reg, 2).unwrap();
    let b = GlmObjective::new(&data, &LogisticLoss, &disabled, reg, 2).unwrap();

    let config = OptimizerConfig { max_iterations: 200, tolerance: 1e-10, verbose: false };
    let lbfgs = Lbfgs::new(config);
    let (fa, ta) = run(&lbfgs, &a);
    let (fb, tb) = run(&lbfgs, &b);

    // Identical contexts drive identical arithmetic: bit-for-bit equal.
    assert_eq!(fa, fb);
    for j in 0..DIM {
        assert_eq!(ta[j], tb[j]);
    }
}

#[test]
fn lbfgs_and_tron_agree_on_the_optimum() {
    let examples = benchmark("squared");
    let data = PartitionedDataSet::partition(examples, 4).unwrap();
    let summary = StatisticalSummary::aggregate(&data, DIM, 2).unwrap();
    let context =
        NormalizationContext::build(&summary, NormalizationType::Standardization, Some(0))
            .unwrap();
    let objective = GlmObjective::new(
        &data,
        &SquaredLoss,
        &context,
        Regularization::L2 { lambda: 0.5 },
        2,
    )
    .unwrap();

    let config = OptimizerConfig { max_iterations: 500, tolerance: 1e-12, verbose: false };
    let (f_l, t_l) = run(&Lbfgs::new(config.clone()), &objective);
    let (f_t, t_t) = run(&Tron::new(config), &objective);

    assert!((f_l - f_t).abs() < 1e-8 * f_l.abs().max(1.0));
    for j in 0..DIM {
        assert!((t_l[j] - t_t[j]).abs() < 1e-5, "coefficient {j}: {} vs {}", t_l[j], t_t[j]);
    }
}
