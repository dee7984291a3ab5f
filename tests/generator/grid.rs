use seg_ensemble::generator::{CartesianGridGenerator, ParameterGenerator};
use seg_ensemble::{ParameterRange, ParameterSet, Registry};

use crate::common;

fn range_with_free(beta: &str, gamma: &str, svm_c: &str) -> ParameterRange {
    let text = format!(
        "Beta\t{beta}\nGamma\t{gamma}\nMaxIterations\t100:100\nSvmC\t{svm_c}\n\
         SvmGamma\t0.5:0.5\nSvmChannels\t1:1\nWeight\t1:1\nReducedDim\t1:1\nDist\tl2\n"
    );
    ParameterRange::parse(&text, &Registry::standard()).unwrap()
}

#[test]
fn test_three_free_axes_give_a_full_factorial() {
    let range = range_with_free("0.1:10:log", "0.01:1:log", "1:100");
    let sets = CartesianGridGenerator::new().generate(&range, 1000).unwrap();
    assert_eq!(sets.len(), 1000);
}

#[test]
fn test_one_free_axis_gets_every_requested_point() {
    let range = range_with_free("0.1:10:log", "0.5:0.5", "1:1");
    let sets = CartesianGridGenerator::new().generate(&range, 1000).unwrap();
    assert_eq!(sets.len(), 1000);
    // cell midpoints in log space: half a cell in from either bound
    let half_cell = 2.0 / 1000.0 / 2.0;
    assert!((sets[0].beta.log10() - (-1.0 + half_cell)).abs() < 1e-9);
    assert!((sets[999].beta.log10() - (1.0 - half_cell)).abs() < 1e-9);
}

#[test]
fn test_log_axes_stay_strictly_inside() {
    let range = range_with_free("0.1:10:log", "0.01:1:log", "1:100:log");
    let sets = CartesianGridGenerator::new().generate(&range, 27).unwrap();
    assert_eq!(sets.len(), 27);
    for set in &sets {
        assert!(set.beta > range.beta.min && set.beta < range.beta.max);
        assert!(set.gamma > range.gamma.min && set.gamma < range.gamma.max);
        assert!(set.svm_c > range.svm_c.min && set.svm_c < range.svm_c.max);
    }
}

#[test]
fn test_grid_sets_round_trip_and_keep_unit_weight() {
    let range = common::range();
    let sets = CartesianGridGenerator::new().generate(&range, 64).unwrap();
    assert!(!sets.is_empty());
    for set in &sets {
        assert!((set.weight_sum() - 1.0).abs() < 1e-12);
        let line = set.to_descriptor(&range).unwrap();
        assert_eq!(&ParameterSet::from_descriptor(&line, &range).unwrap(), set);
    }
}
