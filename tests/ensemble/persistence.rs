use ndarray::Array3;
use ndarray_npy::read_npy;
use seg_ensemble::prelude::*;
use seg_ensemble::storage::LABEL_FILE;

use crate::common::{self, Recorder};

#[tokio::test]
async fn test_folder_store_round_trips_through_summary_files() {
    let dir = common::temp_dir("persist");
    let sampler = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .generator(LatinHypercubeGenerator::with_seed(12))
        .sample_count(3)
        .store(FolderStore::new(&dir))
        .store_probabilities(true)
        .build()
        .unwrap();

    let report = sampler.run().await.unwrap();
    assert_eq!(report.state, SamplerState::Completed);
    assert_eq!(report.results.len(), 3);

    for id in 0..3 {
        let folder = dir.join(format!("sample{id}"));
        let labels: Array3<u32> = read_npy(folder.join(LABEL_FILE)).unwrap();
        assert_eq!(labels.dim(), (4, 4, 4));
        for label in 0..2 {
            let probabilities: Array3<f64> =
                read_npy(folder.join(format!("prob{label}.npy"))).unwrap();
            assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    let loaded =
        SamplingResults::load(&dir, &SummaryFiles::default(), &Registry::standard()).unwrap();
    assert_eq!(loaded.generator_name(), "Latin Hypercube");
    assert_eq!(loaded.range(), report.results.range());
    assert_eq!(loaded.len(), 3);
    for original in report.results.results() {
        let restored = loaded.get(original.id).unwrap();
        assert_eq!(restored.parameters, original.parameters);
        assert_eq!(restored.object_count(), original.object_count());
        assert_eq!(restored.duration(), original.duration());
    }
    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_existing_sample_folders_are_never_overwritten() {
    let dir = common::temp_dir("collide");
    let first = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .generator(RandomGenerator::with_seed(1))
        .sample_count(2)
        .store(FolderStore::new(&dir))
        .build()
        .unwrap();
    first.run().await.unwrap();
    let before: Array3<u32> = read_npy(dir.join("sample0").join(LABEL_FILE)).unwrap();

    let recorder = Recorder::default();
    let second = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .generator(RandomGenerator::with_seed(2))
        .sample_count(2)
        .store(FolderStore::new(&dir))
        .progress(recorder.clone())
        .build()
        .unwrap();
    let report = second.run().await.unwrap();

    assert_eq!(report.state, SamplerState::Completed);
    assert!(report.results.is_empty());
    assert!(recorder.saw("already exists"));
    let after: Array3<u32> = read_npy(dir.join("sample0").join(LABEL_FILE)).unwrap();
    assert_eq!(before, after);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[cfg(feature = "serde")]
#[tokio::test]
async fn test_json_snapshot_keeps_derived_outputs() {
    let dir = common::temp_dir("json");
    std::fs::create_dir_all(&dir).unwrap();
    let sampler = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .sample_count(2)
        .build()
        .unwrap();
    let report = sampler.run().await.unwrap();

    let path = dir.join("results.json");
    report.results.save_json(&path).unwrap();
    let loaded = SamplingResults::load_json(&path).unwrap();

    assert_eq!(loaded.len(), 2);
    for (a, b) in loaded.results().iter().zip(report.results.results()) {
        assert_eq!(a.object_count(), b.object_count());
        assert!((a.duration().unwrap() - b.duration().unwrap()).abs() < 1e-12);
        assert!(a.labels.is_none());
    }
    std::fs::remove_dir_all(&dir).unwrap();
}
