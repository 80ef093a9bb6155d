//! Paired raw/mask video datasets.
//!
//! Layout: `<root>/p<N>_image.<ext>` (eye camera) and `<root>/p<N>_pupil.<ext>`
//! (segmentation mask) for every partition `N`. Both streams are decoded in
//! lockstep and the mask frame is turned into an ellipse on the fly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::mask::ellipse_from_mask;
use crate::record::{AngleConvention, Anomaly, Dataset, FrameRecord, FrameSource, GroundTruth};
use crate::video::{FrameStream, VideoBackend};
use crate::DatasetError;

pub const DEFAULT_PARTITIONS: [u32; 2] = [1, 2];
pub const DEFAULT_DUAL_EXTENSION: &str = "mp4";

pub struct DualStreamDataset {
    name: String,
    root: PathBuf,
    partitions: Vec<u32>,
    extension: String,
    backend: Arc<dyn VideoBackend>,
}

impl DualStreamDataset {
    pub fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        backend: Arc<dyn VideoBackend>,
    ) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            partitions: DEFAULT_PARTITIONS.to_vec(),
            extension: DEFAULT_DUAL_EXTENSION.to_string(),
            backend,
        }
    }

    pub fn with_partitions(mut self, partitions: impl Into<Vec<u32>>) -> Self {
        self.partitions = partitions.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_video(&self, partition: u32) -> PathBuf {
        self.root
            .join(format!("p{partition}_image.{}", self.extension))
    }

    pub fn mask_video(&self, partition: u32) -> PathBuf {
        self.root
            .join(format!("p{partition}_pupil.{}", self.extension))
    }
}

impl Dataset for DualStreamDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn angle_convention(&self) -> AngleConvention {
        AngleConvention::MajorAxisDegrees
    }

    fn check(&self) -> Result<(), DatasetError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(DatasetError::MissingRoot(self.root.clone()))
        }
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self), fields(dataset = %self.name))
    )]
    fn frames(&self) -> Result<Box<dyn FrameSource + '_>, DatasetError> {
        self.check()?;
        Ok(Box::new(DualStreamFrames {
            dataset: self,
            partitions: self.partitions.clone().into_iter(),
            current: None,
            anomalies: Vec::new(),
            done: false,
        }))
    }
}

/// Both decoders of one partition; opened, read and dropped together.
struct OpenPair {
    partition: u32,
    raw: Box<dyn FrameStream>,
    mask: Box<dyn FrameStream>,
    raw_index: usize,
    yielded: usize,
}

struct DualStreamFrames<'a> {
    dataset: &'a DualStreamDataset,
    partitions: std::vec::IntoIter<u32>,
    current: Option<OpenPair>,
    anomalies: Vec<Anomaly>,
    done: bool,
}

impl DualStreamFrames<'_> {
    fn open_pair(&self, partition: u32) -> Result<OpenPair, DatasetError> {
        let raw = self.dataset.backend.open(&self.dataset.raw_video(partition))?;
        let mask = self.dataset.backend.open(&self.dataset.mask_video(partition))?;
        log::debug!("{}: opened partition {partition}", self.dataset.name);
        Ok(OpenPair {
            partition,
            raw,
            mask,
            raw_index: 0,
            yielded: 0,
        })
    }

    fn step(&mut self) -> Result<Option<FrameRecord>, DatasetError> {
        loop {
            if self.current.is_none() {
                let Some(partition) = self.partitions.next() else {
                    return Ok(None);
                };
                self.current = Some(self.open_pair(partition)?);
            }
            let Some(pair) = self.current.as_mut() else {
                return Ok(None);
            };

            let raw = pair.raw.next_frame()?;
            let mask = pair.mask.next_frame()?;
            let (raw, mask) = match (raw, mask) {
                (Some(raw), Some(mask)) => (raw, mask),
                (None, None) => {
                    log::info!(
                        "{}: partition {} ended after {} frame(s)",
                        self.dataset.name,
                        pair.partition,
                        pair.raw_index
                    );
                    self.current = None;
                    continue;
                }
                _ => {
                    return Err(DatasetError::SyncFault {
                        partition: pair.partition,
                        frame: pair.raw_index,
                    })
                }
            };
            let raw_index = pair.raw_index;
            pair.raw_index += 1;

            match ellipse_from_mask(&mask) {
                Ok(ellipse) => {
                    let frame_index = pair.yielded;
                    pair.yielded += 1;
                    return Ok(Some(FrameRecord {
                        group: pair.partition.to_string(),
                        clip: format!("p{}", pair.partition),
                        frame_index,
                        image: raw,
                        ground_truth: GroundTruth::Ellipse(ellipse),
                    }));
                }
                Err(err) => {
                    log::debug!(
                        "partition {} frame {raw_index}: skipping mask ({err})",
                        pair.partition
                    );
                    self.anomalies.push(Anomaly::UnusableMask {
                        partition: pair.partition,
                        raw_index,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
}

impl Iterator for DualStreamFrames<'_> {
    type Item = Result<FrameRecord, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                self.current = None;
                Some(Err(err))
            }
        }
    }
}

impl FrameSource for DualStreamFrames<'_> {
    fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }
}
