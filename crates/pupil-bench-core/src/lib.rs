//! Geometry, image and scaling primitives shared by the pupil benchmark crates.
//!
//! Nothing here knows about datasets or detectors: it fits ellipses to
//! silhouettes, converts frames to grayscale and resamples them to a
//! detector's working resolution.

mod contour;
mod ellipse;
mod image;
mod logger;
mod scale;

pub use contour::{largest_outer_contour, polygon_area};
pub use ellipse::{fit_ellipse, normalize_angle_deg, Ellipse, EllipseFitError, MIN_FIT_POINTS};
pub use image::{binarize, binarize_dark, dark_percentile, to_gray, Frame};
pub use scale::{normalize, ScaleError, ScalePolicy, ScaledFrame};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, parse_level};

pub use ::image::{GrayImage, RgbImage};
pub use nalgebra::{Point2, Vector2};
