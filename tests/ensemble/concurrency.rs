use seg_ensemble::prelude::*;

use crate::common;

#[tokio::test]
async fn test_single_slot_accepts_in_parameter_set_order() {
    let store = MemoryStore::new();
    let sampler = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .generator(RandomGenerator::with_seed(2))
        .sample_count(6)
        .store(store.clone())
        .build()
        .unwrap();

    let report = sampler.run().await.unwrap();

    assert_eq!(report.state, SamplerState::Completed);
    let ids: Vec<u64> = report.results.ids().collect();
    assert_eq!(ids, (0..6).collect::<Vec<_>>());
    assert_eq!(store.appended(), ids);
    assert_eq!(sampler.peak_in_flight(), 1);
    assert_eq!(sampler.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_pipelines_never_exceed_the_limit() {
    let sampler = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .generator(LatinHypercubeGenerator::with_seed(8))
        .sample_count(9)
        .concurrency(2)
        .build()
        .unwrap();

    let report = sampler.run().await.unwrap();

    assert_eq!(report.state, SamplerState::Completed);
    assert!(sampler.peak_in_flight() <= 2);
    assert!(sampler.peak_in_flight() >= 1);
    assert_eq!(sampler.in_flight(), 0);

    let mut ids: Vec<u64> = report.results.ids().collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..9).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_zero_concurrency_is_rejected() {
    let err = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .concurrency(0)
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, Error::InvalidConfig(_)));
}
