//! Video + per-frame label file datasets.
//!
//! Layout: `<root>/<subject>/<clip>.<ext>` next to `<root>/<subject>/<clip>.txt`,
//! where the label file has one whitespace-delimited numeric row per frame.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::record::{AngleConvention, Anomaly, Dataset, FrameRecord, FrameSource, GroundTruth};
use crate::video::{FrameStream, VideoBackend};
use crate::DatasetError;

pub const DEFAULT_VIDEO_EXTENSION: &str = "avi";
pub const LABEL_EXTENSION: &str = "txt";

/// Restricts a pass to one subject and/or one clip name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipFilter {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub clip: Option<String>,
}

impl ClipFilter {
    pub fn accepts(&self, subject: &str, clip: &str) -> bool {
        self.subject.as_deref().is_none_or(|s| s == subject)
            && self.clip.as_deref().is_none_or(|c| c == clip)
    }
}

/// One discovered clip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClipEntry {
    pub subject: String,
    pub clip: String,
    pub video: PathBuf,
    pub labels: PathBuf,
}

pub struct LabeledDataset {
    name: String,
    root: PathBuf,
    video_extension: String,
    filter: ClipFilter,
    backend: Arc<dyn VideoBackend>,
}

impl LabeledDataset {
    pub fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        backend: Arc<dyn VideoBackend>,
    ) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            video_extension: DEFAULT_VIDEO_EXTENSION.to_string(),
            filter: ClipFilter::default(),
            backend,
        }
    }

    pub fn with_filter(mut self, filter: ClipFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_video_extension(mut self, extension: impl Into<String>) -> Self {
        self.video_extension = extension.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn filter(&self) -> &ClipFilter {
        &self.filter
    }

    /// Clips accepted by the filter, sorted by subject then clip name.
    pub fn clips(&self) -> Result<Vec<ClipEntry>, DatasetError> {
        self.check()?;
        let mut subjects = Vec::new();
        let entries = fs::read_dir(&self.root).map_err(|e| DatasetError::io(&self.root, e))?;
        for entry in entries {
            let path = entry.map_err(|e| DatasetError::io(&self.root, e))?.path();
            if path.is_dir() {
                subjects.push(path);
            }
        }
        subjects.sort();

        let mut clips = Vec::new();
        for subject_dir in subjects {
            let Some(subject) = file_name(&subject_dir) else {
                continue;
            };
            if self.filter.subject.as_deref().is_some_and(|s| s != subject) {
                continue;
            }
            for video in self.backend.list_videos(&subject_dir, &self.video_extension)? {
                let Some(clip) = file_stem(&video) else {
                    continue;
                };
                if !self.filter.accepts(&subject, &clip) {
                    continue;
                }
                let labels = video.with_extension(LABEL_EXTENSION);
                clips.push(ClipEntry {
                    subject: subject.clone(),
                    clip,
                    video,
                    labels,
                });
            }
        }
        Ok(clips)
    }

    /// Read one frame and its label row by position.
    pub fn load_frame(
        &self,
        subject: &str,
        clip: &str,
        index: usize,
    ) -> Result<FrameRecord, DatasetError> {
        let subject_dir = self.root.join(subject);
        let video = subject_dir.join(format!("{clip}.{}", self.video_extension));
        let labels_path = video.with_extension(LABEL_EXTENSION);
        if !labels_path.is_file() {
            return Err(DatasetError::MissingLabels(labels_path));
        }
        let mut labels = parse_labels(&labels_path)?;
        let out_of_range = |available| DatasetError::FrameOutOfRange {
            subject: subject.to_string(),
            clip: clip.to_string(),
            index,
            available,
        };
        if index >= labels.len() {
            return Err(out_of_range(labels.len()));
        }

        let mut stream = self.backend.open(&video)?;
        let skipped = stream.skip_frames(index)?;
        let image = match stream.next_frame()? {
            Some(image) if skipped == index => image,
            _ => return Err(out_of_range(skipped)),
        };
        Ok(FrameRecord {
            group: subject.to_string(),
            clip: clip.to_string(),
            frame_index: index,
            image,
            ground_truth: GroundTruth::Point {
                values: labels.swap_remove(index),
            },
        })
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|n| n.to_str()).map(str::to_string)
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().and_then(|n| n.to_str()).map(str::to_string)
}

/// Parse a label file: one whitespace-delimited numeric row per frame.
/// Blank lines are ignored.
pub fn parse_labels(path: &Path) -> Result<Vec<Vec<f64>>, DatasetError> {
    let raw = fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
    parse_label_rows(&raw).map_err(|(line, text)| DatasetError::LabelParse {
        path: path.to_path_buf(),
        line,
        text,
    })
}

fn parse_label_rows(raw: &str) -> Result<Vec<Vec<f64>>, (usize, String)> {
    let mut rows = Vec::new();
    for (i, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let row = trimmed
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| (i + 1, trimmed.to_string()))?;
        rows.push(row);
    }
    Ok(rows)
}

impl Dataset for LabeledDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn angle_convention(&self) -> AngleConvention {
        AngleConvention::NotApplicable
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
        let clips = self.clips()?;
        if let Some(missing) = clips.iter().find(|c| !c.labels.is_file()) {
            return Err(DatasetError::MissingLabels(missing.labels.clone()));
        }
        log::debug!("{}: {} clip(s) selected", self.name, clips.len());
        Ok(Box::new(LabeledFrames {
            backend: self.backend.as_ref(),
            clips: clips.into_iter(),
            current: None,
            anomalies: Vec::new(),
            done: false,
        }))
    }
}

struct OpenClip {
    entry: ClipEntry,
    labels: Vec<Vec<f64>>,
    stream: Box<dyn FrameStream>,
    next_index: usize,
}

enum ClipStep {
    Frame(FrameRecord),
    Finished(Option<Anomaly>),
}

impl OpenClip {
    fn advance(&mut self) -> Result<ClipStep, DatasetError> {
        let n = self.next_index;
        let frame = self.stream.next_frame()?;
        let mismatch = |decoded| {
            Some(Anomaly::CountMismatch {
                group: self.entry.subject.clone(),
                clip: self.entry.clip.clone(),
                decoded,
                labels: self.labels.len(),
            })
        };
        Ok(match frame {
            Some(image) if n < self.labels.len() => {
                self.next_index += 1;
                ClipStep::Frame(FrameRecord {
                    group: self.entry.subject.clone(),
                    clip: self.entry.clip.clone(),
                    frame_index: n,
                    image,
                    ground_truth: GroundTruth::Point {
                        values: self.labels[n].clone(),
                    },
                })
            }
            Some(_) => ClipStep::Finished(mismatch(n + 1)),
            None if n < self.labels.len() => ClipStep::Finished(mismatch(n)),
            None => ClipStep::Finished(None),
        })
    }
}

struct LabeledFrames<'a> {
    backend: &'a dyn VideoBackend,
    clips: std::vec::IntoIter<ClipEntry>,
    current: Option<OpenClip>,
    anomalies: Vec<Anomaly>,
    done: bool,
}

impl LabeledFrames<'_> {
    fn open_clip(&self, entry: ClipEntry) -> Result<OpenClip, DatasetError> {
        let labels = parse_labels(&entry.labels)?;
        let stream = self.backend.open(&entry.video)?;
        log::debug!(
            "opened {}/{} ({} label rows)",
            entry.subject,
            entry.clip,
            labels.len()
        );
        Ok(OpenClip {
            entry,
            labels,
            stream,
            next_index: 0,
        })
    }

    fn step(&mut self) -> Result<Option<FrameRecord>, DatasetError> {
        loop {
            if self.current.is_none() {
                let Some(entry) = self.clips.next() else {
                    return Ok(None);
                };
                self.current = Some(self.open_clip(entry)?);
            }
            let Some(clip) = self.current.as_mut() else {
                return Ok(None);
            };
            match clip.advance()? {
                ClipStep::Frame(record) => return Ok(Some(record)),
                ClipStep::Finished(anomaly) => {
                    if let Some(anomaly) = anomaly {
                        if let Anomaly::CountMismatch {
                            group,
                            clip,
                            decoded,
                            labels,
                        } = &anomaly
                        {
                            log::warn!(
                                "{group}/{clip}: {decoded} frame(s) but {labels} label row(s)"
                            );
                        }
                        self.anomalies.push(anomaly);
                    }
                    self.current = None;
                }
            }
        }
    }
}

impl Iterator for LabeledFrames<'_> {
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

impl FrameSource for LabeledFrames<'_> {
    fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }
}
