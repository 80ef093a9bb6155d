use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum VideoError {
    #[error("video {0} not found")]
    NotFound(PathBuf),
    #[error("failed to decode frame {index} of {path}")]
    Decode {
        path: PathBuf,
        index: usize,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to list videos in {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("video backend failed on {path}: {message}")]
    Backend { path: PathBuf, message: String },
}

#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    #[error("dataset root {0} does not exist")]
    MissingRoot(PathBuf),
    #[error("label file {0} is missing")]
    MissingLabels(PathBuf),
    #[error("{path}:{line}: cannot parse label row {text:?}")]
    LabelParse {
        path: PathBuf,
        line: usize,
        text: String,
    },
    #[error("partition {partition}: raw and mask streams diverge at frame {frame}")]
    SyncFault { partition: u32, frame: usize },
    #[error("frame {index} of {subject}/{clip} is out of range ({available} available)")]
    FrameOutOfRange {
        subject: String,
        clip: String,
        index: usize,
        available: usize,
    },
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write frame {path}")]
    WriteFrame {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Video(#[from] VideoError),
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
