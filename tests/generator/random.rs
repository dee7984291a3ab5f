use seg_ensemble::generator::{ParameterGenerator, RandomGenerator};
use seg_ensemble::{Error, ParameterRange, ParameterSet, Registry, Scale};

use crate::common;

const THREE_CHANNELS: &str = "Beta\t0.1:10:log\n\
Gamma\t0.01:1:log\n\
MaxIterations\t50:200\n\
SvmC\t0.1:100:log\n\
SvmGamma\t0.01:1:log\n\
SvmChannels\t1:3\n\
Weight\t0.2:0.5\n\
ReducedDim\t1:4\n\
Dist\tl1,l2,cos\n\
Weight\t0.1:0.4\n\
ReducedDim\t1:1\n\
Dist\tjs\n\
Weight\t0.1:0.6\n\
ReducedDim\t2:3\n\
Dist\tl2,linf\n";

#[test]
fn test_end_to_end_range_gives_unit_weight_and_bounded_scalars() {
    let range = common::range();
    let sets = RandomGenerator::with_seed(5).generate(&range, 5).unwrap();

    assert_eq!(sets.len(), 5);
    for (i, set) in sets.iter().enumerate() {
        assert_eq!(set.id, i as u64);
        assert_eq!(set.channels.len(), 1);
        assert!((set.channels[0].weight - 1.0).abs() < 1e-12);
        assert!(range.beta.contains(set.beta));
        assert!(range.gamma.contains(set.gamma));
        assert!(range.max_iterations.contains(set.max_iterations));
        assert!(range.svm_c.contains(set.svm_c));
        assert!(range.svm_gamma.contains(set.svm_gamma));
        assert_eq!(set.svm_channels, 1);
    }
}

#[test]
fn test_weights_respect_bounds_and_sum_to_one() {
    let range = ParameterRange::parse(THREE_CHANNELS, &Registry::standard()).unwrap();
    let sets = RandomGenerator::with_seed(11).generate(&range, 300).unwrap();

    for set in &sets {
        assert!((set.weight_sum() - 1.0).abs() < 1e-9, "sum {}", set.weight_sum());
        for (channel, bounds) in set.channels.iter().zip(&range.channels) {
            assert!(
                channel.weight >= bounds.weight.min - 1e-9
                    && channel.weight <= bounds.weight.max + 1e-9,
                "weight {} outside [{}, {}]",
                channel.weight,
                bounds.weight.min,
                bounds.weight.max
            );
            assert!(channel.distance_index < bounds.distance_functions.len());
            assert!(bounds.reduced_dim.contains(channel.reduced_dim));
        }
    }
}

#[test]
fn test_log_scaled_values_stay_strictly_inside() {
    let range = common::range();
    assert_eq!(range.beta.scale, Scale::Log);
    let sets = RandomGenerator::with_seed(3).generate(&range, 500).unwrap();

    for set in &sets {
        assert!(set.beta > range.beta.min && set.beta < range.beta.max);
        assert!(set.gamma > range.gamma.min && set.gamma < range.gamma.max);
        assert!(set.svm_c > range.svm_c.min && set.svm_c < range.svm_c.max);
    }

    // log-uniform: about half the draws fall below the geometric mean
    let below = sets.iter().filter(|s| s.beta < 1.0).count();
    assert!((150..350).contains(&below), "{below} of 500 below 1.0");
}

#[test]
fn test_unsatisfiable_weights_are_a_configuration_error() {
    let text = THREE_CHANNELS
        .replace("Weight\t0.2:0.5", "Weight\t0.8:0.9")
        .replace("Weight\t0.1:0.4", "Weight\t0.5:0.6");
    let range = ParameterRange::parse(&text, &Registry::standard()).unwrap();

    let err = RandomGenerator::with_seed(1).generate(&range, 3).unwrap_err();
    assert!(matches!(err, Error::UnsatisfiableWeights { .. }));
    assert!(err.is_configuration());
}

#[test]
fn test_descriptors_round_trip() {
    let range = ParameterRange::parse(THREE_CHANNELS, &Registry::standard()).unwrap();
    for set in RandomGenerator::with_seed(8).generate(&range, 20).unwrap() {
        let line = set.to_descriptor(&range).unwrap();
        assert_eq!(ParameterSet::from_descriptor(&line, &range).unwrap(), set);
    }
}
