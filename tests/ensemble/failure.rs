use seg_ensemble::prelude::*;

use crate::common::{self, Recorder};

#[tokio::test]
async fn test_solver_failure_stops_the_run() {
    let recorder = Recorder::default();
    let image = common::image().with_spacing([0.0, 1.0, 1.0]);
    let sampler = EnsembleSampler::builder(image, common::seeds(), common::range())
        .generator(RandomGenerator::with_seed(1))
        .sample_count(4)
        .progress(recorder.clone())
        .build()
        .unwrap();

    let report = sampler.run().await.unwrap();

    assert_eq!(report.state, SamplerState::Failed);
    assert!(report.results.is_empty());
    let reason = report.failure.unwrap();
    assert!(reason.contains("spacing"), "{reason}");
    // the first failure keeps further samples from launching
    assert!(!recorder.saw("Classifier run 1"));
    assert!(recorder.saw("Sampling failed"));
    assert_eq!(sampler.state(), SamplerState::Failed);
}

/// Panics on the first accepted result, inside the finishing task.
struct PanickingSink;

impl ProgressSink for PanickingSink {
    fn progress(&self, _percent: f64) {
        panic!("progress display went away");
    }

    fn status(&self, _message: &str) {}
}

#[tokio::test]
async fn test_lost_finishing_task_marks_the_run_failed() {
    let sampler = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .generator(RandomGenerator::with_seed(1))
        .sample_count(1)
        .progress(PanickingSink)
        .build()
        .unwrap();

    let report = sampler.run().await.unwrap();

    assert_eq!(report.state, SamplerState::Failed);
    let reason = report.failure.unwrap();
    assert!(reason.contains("finishing task failed"), "{reason}");
    assert_eq!(sampler.state(), SamplerState::Failed);
}

#[tokio::test]
async fn test_classifier_failure_skips_the_sample_only() {
    let recorder = Recorder::default();
    let seeds = common::seeds().with(2, VoxelCoord::new(9, 9, 9));
    let sampler = EnsembleSampler::builder(common::image(), seeds, common::range())
        .generator(RandomGenerator::with_seed(1))
        .sample_count(3)
        .progress(recorder.clone())
        .build()
        .unwrap();

    let report = sampler.run().await.unwrap();

    assert_eq!(report.state, SamplerState::Completed);
    assert!(report.results.is_empty());
    assert!(recorder.saw("Classifier run 2 failed"));
    assert!(recorder.percents.lock().is_empty());
}

#[tokio::test]
async fn test_empty_generation_fails_before_running() {
    let sampler = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .sample_count(0)
        .build()
        .unwrap();

    let err = sampler.run().await.unwrap_err();

    assert!(matches!(err, Error::NoParameterSets));
    assert_eq!(sampler.state(), SamplerState::Failed);
}

#[tokio::test]
async fn test_unsatisfiable_weights_fail_generation() {
    let text = common::RANGE_TEXT.replace("Weight\t1:1", "Weight\t0.1:0.2");
    let range = ParameterRange::parse(&text, &Registry::standard()).unwrap();
    let sampler = EnsembleSampler::builder(common::image(), common::seeds(), range)
        .sample_count(2)
        .build()
        .unwrap();

    let err = sampler.run().await.unwrap_err();

    assert!(matches!(err, Error::UnsatisfiableWeights { .. }));
    assert_eq!(sampler.state(), SamplerState::Failed);
}

#[test]
fn test_build_checks_channels_and_ground_truth() {
    let two_channels = common::RANGE_TEXT.to_owned() + "Weight\t0:1\nReducedDim\t1:1\nDist\tl1\n";
    let text = two_channels.replace("Weight\t1:1", "Weight\t0:1");
    let range = ParameterRange::parse(&text, &Registry::standard()).unwrap();
    let err = EnsembleSampler::builder(common::image(), common::seeds(), range)
        .build()
        .err()
        .unwrap();
    assert!(matches!(
        err,
        Error::InsufficientChannels {
            required: 2,
            available: 1
        }
    ));

    let err = EnsembleSampler::builder(common::image(), common::seeds(), common::range())
        .ground_truth(ndarray::Array3::zeros((2, 2, 2)))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, Error::ShapeMismatch(_)));
}
