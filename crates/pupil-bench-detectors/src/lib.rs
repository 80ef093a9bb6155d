//! Pupil detector contract and result adapters.
//!
//! Detectors implement [`PupilDetector`] and answer in one of two native
//! schemas ([`RawDetection`]). Each detector identity is registered with a
//! fixed [`SchemaFamily`]; its [`DetectorAdapter`] maps raw results into
//! source-image coordinates.
//!
//! [`DarkPupilDetector`] is a small built-in baseline.

mod adapter;
mod dark_pupil;
mod detector;
mod raw;
mod registry;

pub use adapter::{AdaptError, CanonicalDetection, DetectorAdapter};
pub use dark_pupil::{DarkPupilDetector, DarkPupilParams};
pub use detector::{DetectorError, PupilDetector};
pub use raw::{EllipseObjectResult, FlatFieldResult, RawDetection, RawEllipse, SchemaFamily};
pub use registry::{DetectorKind, DetectorRegistry, DetectorSpec, RegisteredDetector};
