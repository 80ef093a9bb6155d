use image::RgbImage;
use pupil_bench_core::Ellipse;
use serde::{Deserialize, Serialize};

use crate::DatasetError;

/// Ground truth attached to one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroundTruth {
    /// Numeric label row, usually the pupil center `x y`.
    Point { values: Vec<f64> },
    /// Ellipse derived from a segmentation mask.
    Ellipse(Ellipse),
}

/// How the `angle` of ground-truth and detector ellipses is to be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleConvention {
    /// Ground truth carries no orientation.
    NotApplicable,
    /// Major-axis direction in degrees, measured from +x toward +y (image
    /// rows grow downward), in `[0, 180)`.
    MajorAxisDegrees,
}

/// One frame handed to a benchmark trial.
#[derive(Clone, Debug)]
pub struct FrameRecord {
    /// Subject for labeled datasets, partition number for dual-stream ones.
    pub group: String,
    pub clip: String,
    pub frame_index: usize,
    pub image: RgbImage,
    pub ground_truth: GroundTruth,
}

/// Data problems that are logged and skipped rather than failing a trial.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// Decoded frames and label rows disagree for a clip. When the video is
    /// longer, `decoded` is `labels + 1` because the clip halts at the first
    /// surplus frame.
    CountMismatch {
        group: String,
        clip: String,
        decoded: usize,
        labels: usize,
    },
    /// A mask frame produced no usable ellipse; the frame was skipped.
    UnusableMask {
        partition: u32,
        raw_index: usize,
        reason: String,
    },
}

/// A lazy sequence of frame records that also reports the anomalies it
/// skipped over so far.
pub trait FrameSource: Iterator<Item = Result<FrameRecord, DatasetError>> {
    fn anomalies(&self) -> &[Anomaly];
}

/// A replayable ground-truth dataset.
pub trait Dataset {
    fn name(&self) -> &str;

    fn angle_convention(&self) -> AngleConvention;

    /// Cheap configuration check (roots exist). Runs before any trial.
    fn check(&self) -> Result<(), DatasetError>;

    /// Start a fresh pass over the dataset.
    fn frames(&self) -> Result<Box<dyn FrameSource + '_>, DatasetError>;
}
