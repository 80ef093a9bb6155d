//! Dump labeled clips to numbered PNG frames and read single frames back.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::labeled::LabeledDataset;
use crate::record::{Dataset, FrameRecord};
use crate::video::sequence_frame_name;
use crate::DatasetError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExtractSummary {
    pub clips: usize,
    pub frames: usize,
    pub count_mismatches: usize,
}

/// Path of frame `index` of `subject/clip` below `out_dir`.
pub fn extracted_frame_path(out_dir: &Path, subject: &str, clip: &str, index: usize) -> PathBuf {
    out_dir
        .join(subject)
        .join(clip)
        .join(sequence_frame_name(index))
}

/// Write every frame of the selected clips as `<out>/<subject>/<clip>/NNNN.png`.
///
/// Only frames with a label row are written. Using the dataset root as
/// `out_dir` produces the layout the image-sequence backend reads.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(dataset, out_dir), fields(dataset = dataset.name()))
)]
pub fn extract_frames(
    dataset: &LabeledDataset,
    out_dir: &Path,
) -> Result<ExtractSummary, DatasetError> {
    let mut summary = ExtractSummary::default();
    let mut last_clip: Option<(String, String)> = None;

    let mut frames = dataset.frames()?;
    for record in frames.by_ref() {
        let record = record?;
        let key = (record.group.clone(), record.clip.clone());
        if last_clip.as_ref() != Some(&key) {
            let dir = out_dir.join(&record.group).join(&record.clip);
            fs::create_dir_all(&dir).map_err(|e| DatasetError::io(&dir, e))?;
            summary.clips += 1;
            last_clip = Some(key);
        }
        write_frame(out_dir, &record)?;
        summary.frames += 1;
        if record.frame_index % 100 == 0 {
            log::info!("extracting {}/{} frame {}", record.group, record.clip, record.frame_index);
        }
    }
    summary.count_mismatches = frames.anomalies().len();
    log::info!(
        "extracted {} frame(s) from {} clip(s) into {}",
        summary.frames,
        summary.clips,
        out_dir.display()
    );
    Ok(summary)
}

fn write_frame(out_dir: &Path, record: &FrameRecord) -> Result<(), DatasetError> {
    let path = extracted_frame_path(out_dir, &record.group, &record.clip, record.frame_index);
    record
        .image
        .save(&path)
        .map_err(|source| DatasetError::WriteFrame { path, source })
}

/// Fetch one labeled frame for inspection.
pub fn load_labeled_frame(
    dataset: &LabeledDataset,
    subject: &str,
    clip: &str,
    index: usize,
) -> Result<FrameRecord, DatasetError> {
    dataset.check()?;
    dataset.load_frame(subject, clip, index)
}
