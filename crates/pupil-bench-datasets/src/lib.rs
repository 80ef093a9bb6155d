//! Ground-truth dataset readers for pupil detector benchmarks.
//!
//! Two dataset shapes are supported:
//!
//! - [`LabeledDataset`]: one video per clip plus a label file with one row
//!   per frame.
//! - [`DualStreamDataset`]: an eye video and a segmentation-mask video read
//!   in lockstep; ground truth is fitted from the mask.
//!
//! Both implement [`Dataset`] and hand out lazy [`FrameSource`] passes.
//! Decoding goes through a [`VideoBackend`].

mod dual_stream;
mod error;
mod extract;
mod labeled;
mod mask;
#[cfg(feature = "opencv")]
mod opencv_backend;
mod record;
mod video;

pub use dual_stream::{DualStreamDataset, DEFAULT_DUAL_EXTENSION, DEFAULT_PARTITIONS};
pub use error::{DatasetError, VideoError};
pub use extract::{extract_frames, extracted_frame_path, load_labeled_frame, ExtractSummary};
pub use labeled::{
    parse_labels, ClipEntry, ClipFilter, LabeledDataset, DEFAULT_VIDEO_EXTENSION, LABEL_EXTENSION,
};
pub use mask::{ellipse_from_mask, MaskError, MASK_THRESHOLD};
#[cfg(feature = "opencv")]
pub use opencv_backend::OpenCvBackend;
pub use record::{AngleConvention, Anomaly, Dataset, FrameRecord, FrameSource, GroundTruth};
pub use video::{
    sequence_dir, sequence_frame_name, FrameStream, ImageSequenceBackend, MemoryBackend,
    VideoBackend,
};
