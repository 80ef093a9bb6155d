//! JSON benchmark configuration.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pupil_bench_core::ScalePolicy;
use pupil_bench_datasets::{
    ClipFilter, Dataset, DualStreamDataset, ImageSequenceBackend, LabeledDataset, VideoBackend,
    DEFAULT_DUAL_EXTENSION, DEFAULT_PARTITIONS, DEFAULT_VIDEO_EXTENSION,
};
use pupil_bench_detectors::{DarkPupilParams, DetectorKind, DetectorRegistry, DetectorSpec};
use serde::{Deserialize, Serialize};

use crate::method::sanitize_host;
use crate::ConfigError;

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_progress_every() -> usize {
    100
}

fn default_video_extension() -> String {
    DEFAULT_VIDEO_EXTENSION.to_string()
}

fn default_dual_extension() -> String {
    DEFAULT_DUAL_EXTENSION.to_string()
}

fn default_partitions() -> Vec<u32> {
    DEFAULT_PARTITIONS.to_vec()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoBackendKind {
    #[default]
    ImageSequence,
    Opencv,
}

impl VideoBackendKind {
    pub fn build(self) -> Result<Arc<dyn VideoBackend>, ConfigError> {
        match self {
            VideoBackendKind::ImageSequence => Ok(Arc::new(ImageSequenceBackend)),
            #[cfg(feature = "opencv")]
            VideoBackendKind::Opencv => Ok(Arc::new(pupil_bench_datasets::OpenCvBackend)),
            #[cfg(not(feature = "opencv"))]
            VideoBackendKind::Opencv => Err(ConfigError::BackendUnavailable("opencv")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetKind {
    Labeled {
        #[serde(default)]
        filter: ClipFilter,
        #[serde(default = "default_video_extension")]
        video_extension: String,
    },
    DualStream {
        #[serde(default = "default_partitions")]
        partitions: Vec<u32>,
        #[serde(default = "default_dual_extension")]
        extension: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub name: String,
    pub root: PathBuf,
    #[serde(flatten)]
    pub kind: DatasetKind,
}

impl DatasetSpec {
    pub fn build(&self, backend: Arc<dyn VideoBackend>) -> Box<dyn Dataset> {
        match &self.kind {
            DatasetKind::Labeled {
                filter,
                video_extension,
            } => Box::new(
                LabeledDataset::new(&self.name, &self.root, backend)
                    .with_filter(filter.clone())
                    .with_video_extension(video_extension),
            ),
            DatasetKind::DualStream {
                partitions,
                extension,
            } => Box::new(
                DualStreamDataset::new(&self.name, &self.root, backend)
                    .with_partitions(partitions.clone())
                    .with_extension(extension),
            ),
        }
    }
}

/// A named scale policy; the name goes into the method tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleSpec {
    pub name: String,
    #[serde(flatten)]
    pub policy: ScalePolicy,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Host identifier in method tags. Falls back to the environment.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub video_backend: VideoBackendKind,
    /// Log a progress line every this many frames; `0` disables it.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
    pub datasets: Vec<DatasetSpec>,
    pub scales: Vec<ScaleSpec>,
    pub detectors: Vec<DetectorSpec>,
    /// Method tags containing any of these substrings are not run.
    #[serde(default)]
    pub skip: Vec<String>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            host: None,
            output_dir: default_output_dir(),
            video_backend: VideoBackendKind::default(),
            progress_every: default_progress_every(),
            datasets: vec![
                DatasetSpec {
                    name: "lpw".into(),
                    root: PathBuf::from("../LPW"),
                    kind: DatasetKind::Labeled {
                        filter: ClipFilter::default(),
                        video_extension: default_video_extension(),
                    },
                },
                DatasetSpec {
                    name: "eyeseg".into(),
                    root: PathBuf::from("../eye_segmentation_500K"),
                    kind: DatasetKind::DualStream {
                        partitions: default_partitions(),
                        extension: default_dual_extension(),
                    },
                },
            ],
            scales: vec![
                ScaleSpec {
                    name: "orig".into(),
                    policy: ScalePolicy::Identity,
                },
                ScaleSpec {
                    name: "small".into(),
                    policy: ScalePolicy::FitToTargetArea {
                        width: 320,
                        height: 240,
                    },
                },
            ],
            detectors: vec![DetectorSpec {
                name: "dark".into(),
                kind: DetectorKind::DarkPupil {
                    params: DarkPupilParams::default(),
                },
            }],
            skip: Vec::new(),
        }
    }
}

impl BenchmarkConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Host component of method tags: the configured host, else the OS
    /// host name.
    pub fn resolved_host(&self) -> String {
        let raw = self
            .host
            .clone()
            .filter(|h| !h.trim().is_empty())
            .or_else(system_host_name)
            .unwrap_or_else(|| "localhost".to_string());
        sanitize_host(&raw)
    }

    /// Point the dataset `name` at a different root.
    pub fn set_root(&mut self, name: &str, root: impl Into<PathBuf>) -> Result<(), ConfigError> {
        let spec = self
            .datasets
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| ConfigError::UnknownDataset(name.to_string()))?;
        spec.root = root.into();
        Ok(())
    }

    /// Apply a `NAME=PATH` override as given on the command line.
    pub fn apply_root_override(&mut self, arg: &str) -> Result<(), ConfigError> {
        let (name, path) = arg
            .split_once('=')
            .filter(|(n, p)| !n.is_empty() && !p.is_empty())
            .ok_or_else(|| ConfigError::InvalidRootOverride(arg.to_string()))?;
        self.set_root(name, path)
    }

    /// Structural checks that need no filesystem access.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unique("dataset", self.datasets.iter().map(|d| d.name.as_str()))?;
        check_unique("scale policy", self.scales.iter().map(|s| s.name.as_str()))?;
        check_unique("detector", self.detectors.iter().map(|d| d.name.as_str()))?;
        for scale in &self.scales {
            scale.policy.validate().map_err(|source| ConfigError::Scale {
                name: scale.name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn build_datasets(&self) -> Result<Vec<Box<dyn Dataset>>, ConfigError> {
        let backend = self.video_backend.build()?;
        Ok(self
            .datasets
            .iter()
            .map(|spec| spec.build(backend.clone()))
            .collect())
    }

    pub fn build_registry(&self) -> DetectorRegistry {
        DetectorRegistry::from_specs(&self.detectors)
    }
}

fn system_host_name() -> Option<String> {
    let name = gethostname::gethostname().to_string_lossy().trim().to_string();
    (!name.is_empty()).then_some(name)
}

fn check_unique<'a>(
    role: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateName {
                role,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}
