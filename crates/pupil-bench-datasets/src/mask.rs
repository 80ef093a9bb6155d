//! Ellipse ground truth from pupil segmentation masks.

use image::RgbImage;
use pupil_bench_core::{
    binarize, fit_ellipse, largest_outer_contour, to_gray, Ellipse, EllipseFitError,
};

/// Mask pixels brighter than this are pupil.
pub const MASK_THRESHOLD: u8 = 127;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MaskError {
    #[error("mask has no foreground contour")]
    Empty,
    #[error(transparent)]
    Fit(#[from] EllipseFitError),
}

/// Fit an ellipse to the outer contour with the most boundary points.
pub fn ellipse_from_mask(mask: &RgbImage) -> Result<Ellipse, MaskError> {
    let binary = binarize(&to_gray(mask), MASK_THRESHOLD);
    let contour = largest_outer_contour(&binary).ok_or(MaskError::Empty)?;
    Ok(fit_ellipse(&contour)?)
}
