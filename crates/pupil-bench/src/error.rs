use std::path::PathBuf;

use pupil_bench_core::ScaleError;
use pupil_bench_datasets::DatasetError;
use pupil_bench_detectors::{AdaptError, DetectorError};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid {role} name {name:?}")]
    InvalidName { role: &'static str, name: String },
    #[error("duplicate {role} name {name:?}")]
    DuplicateName { role: &'static str, name: String },
    #[error("no {0} configured")]
    Empty(&'static str),
    #[error("no dataset named {0:?}")]
    UnknownDataset(String),
    #[error("expected NAME=PATH, got {0:?}")]
    InvalidRootOverride(String),
    #[error("scale policy {name:?}: {source}")]
    Scale {
        name: String,
        #[source]
        source: ScaleError,
    },
    #[error("video backend {0:?} is not compiled in")]
    BackendUnavailable(&'static str),
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to replace {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Anything that aborts a single dataset x detector x scale combination.
#[derive(thiserror::Error, Debug)]
pub enum TrialError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Adapt(#[from] AdaptError),
    #[error(transparent)]
    Scale(#[from] ScaleError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Faults that stop a run before any trial starts.
#[derive(thiserror::Error, Debug)]
pub enum BenchmarkError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("dataset {name:?} is unusable: {source}")]
    Dataset {
        name: String,
        #[source]
        source: DatasetError,
    },
}
