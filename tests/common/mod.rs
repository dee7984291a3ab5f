#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::Array3;
use parking_lot::Mutex;
use seg_ensemble::prelude::*;

/// One channel, weight fixed at 1, every other scalar free.
pub const RANGE_TEXT: &str = "Beta\t0.1:10:log\n\
Gamma\t0.01:1:log\n\
MaxIterations\t50:200\n\
SvmC\t0.1:100:log\n\
SvmGamma\t0.01:1:log\n\
SvmChannels\t1:1\n\
Weight\t1:1\n\
ReducedDim\t1:1\n\
Dist\tl2\n";

pub fn range() -> ParameterRange {
    ParameterRange::parse(RANGE_TEXT, &Registry::standard()).unwrap()
}

/// 4x4x4 volume: 0 for x < 2, 1 elsewhere.
pub fn two_region_volume() -> Array3<f64> {
    Array3::from_shape_fn((4, 4, 4), |(x, _, _)| if x < 2 { 0.0 } else { 1.0 })
}

pub fn image() -> VolumeImage {
    VolumeImage::from_scalar(two_region_volume())
}

/// Two corner seeds per region.
pub fn seeds() -> Seeds {
    Seeds::new()
        .with(0, VoxelCoord::new(0, 0, 0))
        .with(0, VoxelCoord::new(0, 3, 3))
        .with(1, VoxelCoord::new(3, 0, 0))
        .with(1, VoxelCoord::new(3, 3, 3))
}

/// The segmentation the fixture should produce.
pub fn ground_truth() -> LabelVolume {
    Array3::from_shape_fn((4, 4, 4), |(x, _, _)| u32::from(x >= 2))
}

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// A fresh, not yet existing directory under the system temp dir.
pub fn temp_dir(tag: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!(
        "seg_ensemble_{tag}_{}_{n}",
        std::process::id()
    ))
}

/// Records every update it receives; clones share the record.
#[derive(Clone, Default)]
pub struct Recorder {
    pub percents: Arc<Mutex<Vec<f64>>>,
    pub messages: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn saw(&self, needle: &str) -> bool {
        self.messages.lock().iter().any(|m| m.contains(needle))
    }
}

impl ProgressSink for Recorder {
    fn progress(&self, percent: f64) {
        self.percents.lock().push(percent);
    }

    fn status(&self, message: &str) {
        self.messages.lock().push(message.to_owned());
    }
}
