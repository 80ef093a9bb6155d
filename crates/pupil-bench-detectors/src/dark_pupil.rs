//! Baseline detector: the pupil is the largest very dark blob.
//!
//! The frame is thresholded a little above its darkest percentile, the
//! largest outer contour of the dark mask is taken and an ellipse is fitted
//! to it. Confidence is the agreement between the contour's enclosed area and
//! the fitted ellipse area, so ragged or partial blobs score low.

use image::GrayImage;
use pupil_bench_core::{
    binarize_dark, dark_percentile, fit_ellipse, largest_outer_contour, polygon_area,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::detector::{DetectorError, PupilDetector};
use crate::raw::{FlatFieldResult, RawDetection};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DarkPupilParams {
    /// Fraction of pixels assumed to be pupil when picking the threshold.
    pub dark_fraction: f64,
    /// Added to the percentile intensity to get the binarization level.
    pub threshold_offset: u8,
    /// Contours enclosing less area than this (px²) are ignored.
    pub min_area: f64,
    /// Blobs covering more than this fraction of the frame are ignored.
    pub max_area_fraction: f64,
}

impl Default for DarkPupilParams {
    fn default() -> Self {
        Self {
            dark_fraction: 0.02,
            threshold_offset: 8,
            min_area: 16.0,
            max_area_fraction: 0.25,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DarkPupilDetector {
    params: DarkPupilParams,
}

impl DarkPupilDetector {
    pub fn new(params: DarkPupilParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DarkPupilParams {
        &self.params
    }

    fn mask(&self, gray: &GrayImage) -> GrayImage {
        let level = dark_percentile(gray, self.params.dark_fraction)
            .saturating_add(self.params.threshold_offset);
        binarize_dark(gray, level)
    }

    fn locate(&self, mask: &GrayImage) -> FlatFieldResult {
        let Some(contour) = largest_outer_contour(mask) else {
            return FlatFieldResult::default();
        };
        let silhouette = polygon_area(&contour);
        let frame_area = mask.width() as f64 * mask.height() as f64;
        if silhouette < self.params.min_area
            || silhouette > self.params.max_area_fraction * frame_area
        {
            return FlatFieldResult::default();
        }
        let ellipse = match fit_ellipse(&contour) {
            Ok(e) if e.is_finite() => e,
            Ok(_) => return FlatFieldResult::default(),
            Err(err) => {
                log::trace!("dark blob rejected: {err}");
                return FlatFieldResult::default();
            }
        };
        let fitted = ellipse.area();
        let confidence = if fitted > 0.0 {
            silhouette.min(fitted) / silhouette.max(fitted)
        } else {
            0.0
        };
        FlatFieldResult {
            center_x: ellipse.center.x,
            center_y: ellipse.center.y,
            first_ax: ellipse.axes[0],
            second_ax: ellipse.axes[1],
            angle: ellipse.angle,
            confidence,
        }
    }
}

impl PupilDetector for DarkPupilDetector {
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "trace",
            skip(self, gray),
            fields(width = gray.width(), height = gray.height())
        )
    )]
    fn detect(&mut self, gray: &GrayImage) -> Result<RawDetection, DetectorError> {
        if gray.width() == 0 || gray.height() == 0 {
            return Err(DetectorError::Failed("empty frame".to_string()));
        }
        Ok(self.locate(&self.mask(gray)).into())
    }

    fn detect_debug(
        &mut self,
        gray: &GrayImage,
    ) -> Result<(RawDetection, Option<GrayImage>), DetectorError> {
        if gray.width() == 0 || gray.height() == 0 {
            return Err(DetectorError::Failed("empty frame".to_string()));
        }
        let mask = self.mask(gray);
        let result = self.locate(&mask);
        Ok((result.into(), Some(mask)))
    }
}
