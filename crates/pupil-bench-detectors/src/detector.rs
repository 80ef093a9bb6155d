use image::GrayImage;

use crate::raw::RawDetection;

#[derive(thiserror::Error, Debug)]
pub enum DetectorError {
    #[error("detector {name} could not be constructed: {reason}")]
    Construction { name: String, reason: String },
    #[error("detection failed: {0}")]
    Failed(String),
    #[error("unknown detector {0}")]
    Unknown(String),
}

/// Uniform contract every benchmarked pupil detector implements.
///
/// Implementations receive an 8-bit grayscale frame in detector space and
/// report their native schema; coordinates are mapped back by the adapter.
pub trait PupilDetector {
    fn detect(&mut self, gray: &GrayImage) -> Result<RawDetection, DetectorError>;

    /// Detection plus an optional visualization for interactive inspection.
    fn detect_debug(
        &mut self,
        gray: &GrayImage,
    ) -> Result<(RawDetection, Option<GrayImage>), DetectorError> {
        Ok((self.detect(gray)?, None))
    }
}

impl<F> PupilDetector for F
where
    F: FnMut(&GrayImage) -> Result<RawDetection, DetectorError>,
{
    fn detect(&mut self, gray: &GrayImage) -> Result<RawDetection, DetectorError> {
        self(gray)
    }
}
