use seg_ensemble::prelude::*;

use crate::common;

/// Aborts as soon as the first classifier run is announced.
struct AbortOnFirstLaunch(AbortHandle);

impl ProgressSink for AbortOnFirstLaunch {
    fn progress(&self, _percent: f64) {}

    fn status(&self, message: &str) {
        if message.starts_with("Classifier run ") {
            self.0.abort();
        }
    }
}

#[tokio::test]
async fn test_abort_after_first_launch_drains_it() {
    let dir = common::temp_dir("abort");
    let abort = AbortHandle::new();
    let sampler = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .generator(RandomGenerator::with_seed(6))
        .sample_count(5)
        .store(FolderStore::new(&dir))
        .abort_handle(abort.clone())
        .progress(AbortOnFirstLaunch(abort.clone()))
        .build()
        .unwrap();

    let report = sampler.run().await.unwrap();

    assert_eq!(report.state, SamplerState::Aborted);
    assert!(report.results.len() <= 1);
    assert!(sampler.abort_handle().is_aborted());

    for entry in std::fs::read_dir(&dir).unwrap() {
        let entry = entry.unwrap();
        let name = entry.file_name().to_string_lossy().into_owned();
        assert!(!name.ends_with(".tmp"), "left over staging entry {name}");
        if name.starts_with("sample") {
            assert!(entry.path().join(seg_ensemble::storage::LABEL_FILE).is_file());
        }
    }
    let folders = std::fs::read_dir(&dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .is_ok_and(|e| e.file_name().to_string_lossy().starts_with("sample"))
        })
        .count();
    assert_eq!(folders, report.results.len());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_abort_before_run_launches_nothing() {
    let sampler = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .sample_count(3)
        .build()
        .unwrap();
    sampler.abort();

    let report = sampler.run().await.unwrap();

    assert_eq!(report.state, SamplerState::Aborted);
    assert!(report.results.is_empty());
    assert_eq!(sampler.peak_in_flight(), 0);
}

#[tokio::test]
async fn test_sampler_runs_only_once() {
    let sampler = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .sample_count(1)
        .build()
        .unwrap();
    sampler.run().await.unwrap();
    assert!(matches!(sampler.run().await, Err(Error::AlreadyStarted)));
}
