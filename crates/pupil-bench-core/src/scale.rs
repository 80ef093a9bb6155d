//! Scale normalization between source frames and detector input.
//!
//! A policy yields one uniform `factor` for both image axes. The inverse
//! `rescaling_factor` is computed once here and travels with the scaled
//! frame; downstream code must use it as-is rather than recomputing `1 /
//! factor` from its own copy of the policy.

use std::borrow::Cow;

use fast_image_resize as fr;
use image::GrayImage;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Sizing rule applied to every frame of a trial.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ScalePolicy {
    /// Feed frames at their native resolution.
    Identity,
    /// Resample so that the frame area matches `width * height` while
    /// keeping the aspect ratio.
    FitToTargetArea { width: u32, height: u32 },
}

#[derive(thiserror::Error, Debug)]
pub enum ScaleError {
    #[error("cannot scale an empty image ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("invalid target area {width}x{height}")]
    InvalidTarget { width: u32, height: u32 },
    #[error("scale factor {0} is not a positive finite number")]
    InvalidFactor(f64),
    #[error(transparent)]
    Buffer(#[from] fr::ImageBufferError),
    #[error(transparent)]
    Resize(#[from] fr::ResizeError),
    #[error("resampled buffer does not match {width}x{height}")]
    BufferSize { width: u32, height: u32 },
}

impl ScalePolicy {
    /// Reject policies that can never produce a positive factor.
    pub fn validate(&self) -> Result<(), ScaleError> {
        match *self {
            ScalePolicy::Identity => Ok(()),
            ScalePolicy::FitToTargetArea { width, height } if width == 0 || height == 0 => {
                Err(ScaleError::InvalidTarget { width, height })
            }
            ScalePolicy::FitToTargetArea { .. } => Ok(()),
        }
    }

    /// Uniform factor for a source image of the given size.
    pub fn factor_for(&self, src_width: u32, src_height: u32) -> Result<f64, ScaleError> {
        if src_width == 0 || src_height == 0 {
            return Err(ScaleError::EmptyImage {
                width: src_width,
                height: src_height,
            });
        }
        let factor = match *self {
            ScalePolicy::Identity => 1.0,
            ScalePolicy::FitToTargetArea { width, height } => {
                self.validate()?;
                let target = width as f64 * height as f64;
                let source = src_width as f64 * src_height as f64;
                (target / source).sqrt()
            }
        };
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ScaleError::InvalidFactor(factor));
        }
        Ok(factor)
    }
}

/// Detector input plus the factors that relate it to the source frame.
#[derive(Clone, Debug)]
pub struct ScaledFrame<'a> {
    pub image: Cow<'a, GrayImage>,
    /// Source-to-detector factor.
    pub factor: f64,
    /// Detector-to-source factor, `1 / factor`.
    pub rescaling_factor: f64,
}

impl ScaledFrame<'_> {
    /// `true` when no resampling happened.
    pub fn is_native(&self) -> bool {
        matches!(self.image, Cow::Borrowed(_))
    }
}

/// Apply `policy` to a grayscale frame.
///
/// A factor of exactly `1.0` borrows the input untouched. Upscaling uses a
/// Catmull-Rom kernel, downscaling a box kernel (area averaging).
#[cfg_attr(
    feature = "tracing",
    instrument(level = "trace", skip(gray), fields(width = gray.width(), height = gray.height()))
)]
pub fn normalize<'a>(
    gray: &'a GrayImage,
    policy: &ScalePolicy,
) -> Result<ScaledFrame<'a>, ScaleError> {
    let (width, height) = gray.dimensions();
    let factor = policy.factor_for(width, height)?;
    let rescaling_factor = 1.0 / factor;

    if factor == 1.0 {
        return Ok(ScaledFrame {
            image: Cow::Borrowed(gray),
            factor,
            rescaling_factor,
        });
    }

    let dst_width = scaled_len(width, factor);
    let dst_height = scaled_len(height, factor);
    let filter = if factor > 1.0 {
        fr::FilterType::CatmullRom
    } else {
        fr::FilterType::Box
    };
    let resized = resample(gray, dst_width, dst_height, filter)?;

    Ok(ScaledFrame {
        image: Cow::Owned(resized),
        factor,
        rescaling_factor,
    })
}

fn scaled_len(len: u32, factor: f64) -> u32 {
    ((len as f64) * factor).round().max(1.0) as u32
}

fn resample(
    gray: &GrayImage,
    width: u32,
    height: u32,
    filter: fr::FilterType,
) -> Result<GrayImage, ScaleError> {
    let src = fr::images::ImageRef::new(
        gray.width(),
        gray.height(),
        gray.as_raw(),
        fr::PixelType::U8,
    )?;
    let mut dst = fr::images::Image::new(width, height, fr::PixelType::U8);
    let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(filter));
    fr::Resizer::new().resize(&src, &mut dst, &options)?;
    GrayImage::from_raw(width, height, dst.into_vec())
        .ok_or(ScaleError::BufferSize { width, height })
}
