use seg_ensemble::generator::{LatinHypercubeGenerator, ParameterGenerator};
use seg_ensemble::{ParameterRange, ParameterSet, Registry};

use crate::common;

#[test]
fn test_every_log_stratum_is_hit_once() {
    let range = common::range();
    let n = 10;
    let sets = LatinHypercubeGenerator::with_seed(21).generate(&range, n).unwrap();
    assert_eq!(sets.len(), n);

    let (lo, hi) = (range.beta.min.ln(), range.beta.max.ln());
    let mut hits = vec![0; n];
    for set in &sets {
        let position = (set.beta.ln() - lo) / (hi - lo) * n as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let stratum = (position.floor() as usize).min(n - 1);
        hits[stratum] += 1;
    }
    assert!(hits.iter().all(|&h| h == 1), "strata hits {hits:?}");
}

#[test]
fn test_log_scaled_values_stay_strictly_inside() {
    let range = common::range();
    let sets = LatinHypercubeGenerator::with_seed(5).generate(&range, 200).unwrap();
    for set in &sets {
        assert!(set.beta > range.beta.min && set.beta < range.beta.max);
        assert!(set.gamma > range.gamma.min && set.gamma < range.gamma.max);
        assert!(set.svm_c > range.svm_c.min && set.svm_c < range.svm_c.max);
    }
}

#[test]
fn test_iteration_counts_cover_the_range() {
    let text = common::RANGE_TEXT.replace("MaxIterations\t50:200", "MaxIterations\t10:14");
    let range = ParameterRange::parse(&text, &Registry::standard()).unwrap();
    let sets = LatinHypercubeGenerator::with_seed(2).generate(&range, 5).unwrap();

    let mut seen: Vec<u32> = sets.iter().map(|s| s.max_iterations).collect();
    seen.sort_unstable();
    assert_eq!(seen, vec![10, 11, 12, 13, 14]);
}

#[test]
fn test_weights_sum_to_one_and_ids_are_consecutive() {
    let text = common::RANGE_TEXT.replace(
        "Weight\t1:1\nReducedDim\t1:1\nDist\tl2\n",
        "Weight\t0.2:0.7\nReducedDim\t1:1\nDist\tl2\n\
         Weight\t0.3:0.8\nReducedDim\t1:1\nDist\tl1,sq\n",
    );
    let range = ParameterRange::parse(&text, &Registry::standard()).unwrap();
    let sets = LatinHypercubeGenerator::with_seed(9).generate(&range, 40).unwrap();

    for (i, set) in sets.iter().enumerate() {
        assert_eq!(set.id, i as u64);
        assert!((set.weight_sum() - 1.0).abs() < 1e-9);
        assert!(set.channels[0].weight >= 0.2 && set.channels[0].weight <= 0.7);
        let line = set.to_descriptor(&range).unwrap();
        assert_eq!(&ParameterSet::from_descriptor(&line, &range).unwrap(), set);
    }
}
