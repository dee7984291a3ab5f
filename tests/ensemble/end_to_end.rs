use seg_ensemble::prelude::*;

use crate::common::{self, Recorder};

#[tokio::test]
async fn test_five_random_samples_on_the_fixture() {
    let recorder = Recorder::default();
    let sampler = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .generator(RandomGenerator::with_seed(17))
        .sample_count(5)
        .progress(recorder.clone())
        .build()
        .unwrap();
    assert_eq!(sampler.state(), SamplerState::Idle);

    let report = sampler.run().await.unwrap();

    assert_eq!(report.state, SamplerState::Completed);
    assert!(report.failure.is_none());
    assert_eq!(report.results.len(), 5);
    assert_eq!(report.results.generator_name(), "Random");
    for result in report.results.results() {
        assert!((result.parameters.channels[0].weight - 1.0).abs() < 1e-12);
        assert!(result.object_count().unwrap() >= 1);
        assert!(result.duration().unwrap() > 0.0);
        assert!(!result.has_details());
    }

    let observed = &report.results.range().observed;
    let (lo, hi) = observed.duration.unwrap();
    assert!(lo > 0.0 && lo <= hi);
    assert!(observed.object_count.unwrap().0 >= 1);

    assert_eq!(*recorder.percents.lock(), vec![20.0, 40.0, 60.0, 80.0, 100.0]);
    assert!(recorder.saw("Generating parameter sets..."));
    assert!(recorder.saw("Classifier run 0"));
    assert!(recorder.saw("starting solver run 4"));
    assert_eq!(sampler.state(), SamplerState::Completed);
    assert!(sampler.elapsed() > core::time::Duration::ZERO);
    assert_eq!(sampler.estimated_time_remaining(), Some(core::time::Duration::ZERO));
}

#[tokio::test]
async fn test_ground_truth_adds_overlap_columns() {
    let store = MemoryStore::new();
    let sampler = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .generator(LatinHypercubeGenerator::with_seed(4))
        .sample_count(3)
        .ground_truth(common::ground_truth())
        .store(store.clone())
        .build()
        .unwrap();

    let report = sampler.run().await.unwrap();

    assert_eq!(report.state, SamplerState::Completed);
    assert_eq!(store.columns(), DerivedOutput::ALL.to_vec());
    assert_eq!(store.sample_ids(), vec![0, 1, 2]);
    for result in report.results.results() {
        let dice = result.derived(DerivedOutput::Dice).unwrap();
        assert!((0.0..=1.0).contains(&dice));
        assert!(store.labels(result.id).is_some());
    }
}

#[tokio::test]
async fn test_config_selects_generator_and_limits() {
    let config = SamplingConfig {
        sample_count: 2,
        generator: "Cartesian Grid".into(),
        ..SamplingConfig::default()
    };
    let sampler = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .config(&config, &Registry::standard())
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(sampler.generator_name(), "Cartesian Grid");
    assert_eq!(sampler.concurrency(), 1);

    let unknown = SamplingConfig {
        generator: "Sobol".into(),
        ..SamplingConfig::default()
    };
    let err = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .config(&unknown, &Registry::standard())
        .err()
        .unwrap();
    assert!(matches!(err, Error::UnknownGenerator(_)));
}
