// =============================================================================
// Aggregation and Normalization Integration Tests
// =============================================================================
//
// Summary statistics must be independent of how the data is partitioned and
// how deep the reduction tree is, and a standardization context built from
// them must actually standardize: re-aggregating explicitly transformed data
// yields mean ~0 and variance ~1 for every varying feature, with the
// intercept column untouched and constant columns passed through unscaled.
//
// =============================================================================

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use scaleglm_core::{
    FeatureVector, LabeledExample, NormalizationContext, NormalizationType, PartitionedDataSet,
    StatisticalSummary,
};

const DIM: usize = 8;

/// Mixed dense/sparse dataset with an intercept column (0), a constant
/// column (7), and features at very different scales.
fn dataset(n: usize) -> Vec<LabeledExample> {
    let mut rng = StdRng::seed_from_u64(99);
    (0..n)
        .map(|i| {
            let features = if i % 3 == 0 {
                // Sparse rows leave columns 2..5 implicitly zero.
                FeatureVector::sparse(
                    DIM,
                    vec![0, 1, 5, 6, 7],
                    vec![
                        1.0,
                        rng.gen_range(-0.001..0.001),
                        rng.gen_range(-500.0..500.0),
                        rng.gen_range(0.0..3.0),
                        4.25,
                    ],
                )
                .unwrap()
            } else {
                let mut x = vec![1.0; DIM];
                x[1] = rng.gen_range(-0.001..0.001);
                x[2] = rng.gen_range(-2.0..2.0);
                x[3] = rng.gen_range(10.0..30.0);
                x[4] = rng.gen_range(-1.0..0.0);
                x[5] = rng.gen_range(-500.0..500.0);
                x[6] = rng.gen_range(0.0..3.0);
                x[7] = 4.25;
                FeatureVector::dense(&x)
            };
            LabeledExample::new((i % 2) as f64, features)
        })
        .collect()
}

#[test]
fn summary_is_partitioning_and_depth_invariant() {
    let examples = dataset(400);
    let reference = StatisticalSummary::aggregate(
        &PartitionedDataSet::partition(examples.clone(), 1).unwrap(),
        DIM,
        1,
    )
    .unwrap();

    for parts in [2, 7, 16, 73] {
        for depth in [1, 2, 3, 5] {
            let data = PartitionedDataSet::partition(examples.clone(), parts).unwrap();
            let summary = StatisticalSummary::aggregate(&data, DIM, depth).unwrap();

            assert_eq!(summary.count, reference.count);
            for j in 0..DIM {
                assert!(
                    (summary.mean[j] - reference.mean[j]).abs() < 1e-9,
                    "mean[{j}] differs under {parts} partitions / depth {depth}"
                );
                assert!(
                    (summary.variance[j] - reference.variance[j]).abs()
                        < 1e-9 * reference.variance[j].max(1.0),
                    "variance[{j}] differs under {parts} partitions / depth {depth}"
                );
                // Min/max are order-insensitive selections, so exact.
                assert_eq!(summary.min[j], reference.min[j]);
                assert_eq!(summary.max[j], reference.max[j]);
            }
        }
    }
}

#[test]
fn shuffled_data_produces_identical_moments() {
    let mut examples = dataset(200);
    let forward = StatisticalSummary::aggregate(
        &PartitionedDataSet::partition(examples.clone(), 5).unwrap(),
        DIM,
        2,
    )
    .unwrap();

    examples.reverse();
    let backward = StatisticalSummary::aggregate(
        &PartitionedDataSet::partition(examples, 5).unwrap(),
        DIM,
        2,
    )
    .unwrap();

    for j in 0..DIM {
        assert!((forward.mean[j] - backward.mean[j]).abs() < 1e-9);
        assert!(
            (forward.variance[j] - backward.variance[j]).abs()
                < 1e-9 * forward.variance[j].max(1.0)
        );
    }
}

#[test]
fn standardization_standardizes() {
    let examples = dataset(300);
    let data = PartitionedDataSet::partition(examples.clone(), 6).unwrap();
    let summary = StatisticalSummary::aggregate(&data, DIM, 2).unwrap();
    let context =
        NormalizationContext::build(&summary, NormalizationType::Standardization, Some(0))
            .unwrap();

    let transformed: Vec<LabeledExample> = examples
        .iter()
        .map(|e| {
            let mut out = e.clone();
            out.features = context.transform_vector(&e.features).unwrap();
            out
        })
        .collect();
    let after = StatisticalSummary::aggregate(
        &PartitionedDataSet::partition(transformed, 6).unwrap(),
        DIM,
        2,
    )
    .unwrap();

    // Intercept column passes through untouched.
    assert_eq!(after.mean[0], 1.0);
    assert_eq!(after.variance[0], 0.0);

    // Constant column: zero variance clamps the factor to 1.0, and the
    // shift still centers it at zero.
    assert_eq!(context.factor(7), 1.0);
    assert!(after.mean[7].abs() < 1e-9);
    assert!(after.variance[7] < 1e-9);

    for j in 1..7 {
        assert!(after.mean[j].abs() < 1e-9, "mean[{j}] = {}", after.mean[j]);
        assert!(
            (after.variance[j] - 1.0).abs() < 1e-9,
            "variance[{j}] = {}",
            after.variance[j]
        );
    }
}

#[test]
fn scale_only_normalizes_magnitude_without_centering() {
    let examples = dataset(300);
    let data = PartitionedDataSet::partition(examples.clone(), 4).unwrap();
    let summary = StatisticalSummary::aggregate(&data, DIM, 2).unwrap();
    let context =
        NormalizationContext::build(&summary, NormalizationType::Scale, Some(0)).unwrap();

    let transformed: Vec<LabeledExample> = examples
        .iter()
        .map(|e| {
            let mut out = e.clone();
            out.features = context.transform_vector(&e.features).unwrap();
            out
        })
        .collect();
    let after = StatisticalSummary::aggregate(
        &PartitionedDataSet::partition(transformed, 4).unwrap(),
        DIM,
        2,
    )
    .unwrap();

    for j in 1..7 {
        assert!(
            (after.variance[j] - 1.0).abs() < 1e-9,
            "variance[{j}] = {}",
            after.variance[j]
        );
        // Means are scaled, not removed.
        assert!(
            (after.mean[j] - summary.mean[j] * context.factor(j)).abs() < 1e-9
        );
    }
    assert_eq!(after.mean[0], 1.0);
}
