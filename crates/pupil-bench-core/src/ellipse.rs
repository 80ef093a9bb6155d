//! Ellipse parameters and direct least-squares fitting.
//!
//! The fit follows Fitzgibbon, Pilu & Fisher (1999) in the numerically
//! stable formulation of Halíř & Flusser (1998): the scatter matrix is split
//! into quadratic and linear blocks, the linear block is eliminated, and the
//! remaining 3×3 generalized eigenproblem is solved in closed form.
//!
//! Conventions (shared by ground truth and detector output):
//! - `center` is in image pixels, x to the right, y down;
//! - `axes` are *full* axis lengths (diameters), major first;
//! - `angle` is the orientation of the major axis in degrees, measured from
//!   the +x axis towards +y, normalized to `[0, 180)`.

use nalgebra::{Matrix3, Point2, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Minimum number of points accepted by [`fit_ellipse`].
pub const MIN_FIT_POINTS: usize = 6;

/// Ellipse in image-pixel units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: Point2<f64>,
    /// Axis lengths. Never negative.
    pub axes: Vector2<f64>,
    /// Orientation in degrees.
    pub angle: f64,
}

impl Ellipse {
    pub fn new(center: [f64; 2], axes: [f64; 2], angle: f64) -> Self {
        Self {
            center: Point2::new(center[0], center[1]),
            axes: Vector2::new(axes[0].abs(), axes[1].abs()),
            angle,
        }
    }

    /// Scale center and axes by `factor`; the angle is left untouched.
    ///
    /// A uniform scale does not change orientation, so this is the only
    /// operation needed to move an ellipse between a scaled detector image
    /// and the source frame.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            center: Point2::new(self.center.x * factor, self.center.y * factor),
            axes: self.axes * factor.abs(),
            angle: self.angle,
        }
    }

    /// Enclosed area, treating `axes` as full lengths.
    pub fn area(&self) -> f64 {
        std::f64::consts::FRAC_PI_4 * self.axes.x * self.axes.y
    }

    pub fn is_finite(&self) -> bool {
        self.center.x.is_finite()
            && self.center.y.is_finite()
            && self.axes.x.is_finite()
            && self.axes.y.is_finite()
            && self.angle.is_finite()
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EllipseFitError {
    #[error("ellipse fit needs at least {needed} points, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("point set is degenerate (collinear or repeated points)")]
    Degenerate,
    #[error("no eigenvector satisfies the ellipse constraint")]
    NotAnEllipse,
}

/// Fit an ellipse to a set of boundary points.
pub fn fit_ellipse(points: &[Point2<f64>]) -> Result<Ellipse, EllipseFitError> {
    if points.len() < MIN_FIT_POINTS {
        return Err(EllipseFitError::TooFewPoints {
            needed: MIN_FIT_POINTS,
            got: points.len(),
        });
    }

    // Work in centroid-shifted, isotropically scaled coordinates. Since the
    // scale is isotropic, the ellipse found there maps back with a plain
    // affine transform and the angle is preserved.
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - mean_x).powi(2) + (p.y - mean_y).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist < 1e-12 {
        return Err(EllipseFitError::Degenerate);
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;

    let mut s1 = Matrix3::<f64>::zeros();
    let mut s2 = Matrix3::<f64>::zeros();
    let mut s3 = Matrix3::<f64>::zeros();
    for p in points {
        let x = (p.x - mean_x) * s;
        let y = (p.y - mean_y) * s;
        let quad = Vector3::new(x * x, x * y, y * y);
        let lin = Vector3::new(x, y, 1.0);
        s1 += quad * quad.transpose();
        s2 += quad * lin.transpose();
        s3 += lin * lin.transpose();
    }

    // Collinear input makes the linear block rank-deficient.
    if s3.determinant().abs() <= 1e-9 * n.powi(3) {
        return Err(EllipseFitError::Degenerate);
    }
    let s3_inv = s3.try_inverse().ok_or(EllipseFitError::Degenerate)?;
    let t = -(s3_inv * s2.transpose());
    let m = s1 + s2 * t;

    // Premultiply by C1^-1 for C1 = [[0, 0, 2], [0, -1, 0], [2, 0, 0]].
    let reduced = Matrix3::new(
        m[(2, 0)] / 2.0,
        m[(2, 1)] / 2.0,
        m[(2, 2)] / 2.0,
        -m[(1, 0)],
        -m[(1, 1)],
        -m[(1, 2)],
        m[(0, 0)] / 2.0,
        m[(0, 1)] / 2.0,
        m[(0, 2)] / 2.0,
    );

    let quadratic = constrained_eigenvector(&reduced).ok_or(EllipseFitError::NotAnEllipse)?;
    let linear = t * quadratic;
    let conic = [
        quadratic[0],
        quadratic[1],
        quadratic[2],
        linear[0],
        linear[1],
        linear[2],
    ];

    let normalized = conic_to_ellipse(conic).ok_or(EllipseFitError::NotAnEllipse)?;
    let ellipse = Ellipse {
        center: Point2::new(
            normalized.center.x / s + mean_x,
            normalized.center.y / s + mean_y,
        ),
        axes: normalized.axes / s,
        angle: normalized.angle,
    };
    if !ellipse.is_finite() {
        return Err(EllipseFitError::NotAnEllipse);
    }
    Ok(ellipse)
}

/// Eigenvector of `system` with `4ac - b^2 > 0`.
fn constrained_eigenvector(system: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let trace = system.trace();
    let minors = system[(0, 0)] * system[(1, 1)] - system[(0, 1)] * system[(1, 0)]
        + system[(0, 0)] * system[(2, 2)]
        - system[(0, 2)] * system[(2, 0)]
        + system[(1, 1)] * system[(2, 2)]
        - system[(1, 2)] * system[(2, 1)];
    let det = system.determinant();

    let mut best: Option<(f64, Vector3<f64>)> = None;
    for lambda in real_cubic_roots(-trace, minors, -det) {
        let shifted = system - Matrix3::identity() * lambda;
        let Some(v) = null_vector(&shifted) else {
            continue;
        };
        let constraint = 4.0 * v[0] * v[2] - v[1] * v[1];
        if constraint <= 0.0 {
            continue;
        }
        // Exactly one eigenpair satisfies the constraint in exact
        // arithmetic; prefer the smallest eigenvalue magnitude otherwise.
        if best.is_none_or(|(l, _)| lambda.abs() < l) {
            best = Some((lambda.abs(), v));
        }
    }
    best.map(|(_, v)| v)
}

/// Null vector of a rank-2 3×3 matrix from the largest row cross product.
fn null_vector(m: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let r0 = m.row(0).transpose();
    let r1 = m.row(1).transpose();
    let r2 = m.row(2).transpose();
    let candidates = [r0.cross(&r1), r0.cross(&r2), r1.cross(&r2)];
    let best = candidates
        .iter()
        .copied()
        .reduce(|a, b| if b.norm_squared() > a.norm_squared() { b } else { a })?;
    let norm = best.norm();
    if norm < 1e-15 {
        return None;
    }
    Some(best / norm)
}

/// Real roots of `x^3 + b x^2 + c x + d = 0`.
fn real_cubic_roots(b: f64, c: f64, d: f64) -> Vec<f64> {
    let p = c - b * b / 3.0;
    let q = 2.0 * b * b * b / 27.0 - b * c / 3.0 + d;
    let shift = -b / 3.0;
    let disc = q * q / 4.0 + p * p * p / 27.0;

    if disc > 0.0 {
        let sq = disc.sqrt();
        vec![(-q / 2.0 + sq).cbrt() + (-q / 2.0 - sq).cbrt() + shift]
    } else {
        let r = (-p / 3.0).max(0.0).sqrt();
        if r < 1e-15 {
            return vec![shift];
        }
        let phi = (-q / (2.0 * r * r * r)).clamp(-1.0, 1.0).acos();
        let tau = std::f64::consts::TAU;
        (0..3)
            .map(|k| 2.0 * r * ((phi + tau * k as f64) / 3.0).cos() + shift)
            .collect()
    }
}

/// Convert `A x² + B xy + C y² + D x + E y + F = 0` into an [`Ellipse`].
fn conic_to_ellipse(coeffs: [f64; 6]) -> Option<Ellipse> {
    let sign = if coeffs[0] + coeffs[2] < 0.0 { -1.0 } else { 1.0 };
    let [a, b, c, d, e, f] = coeffs.map(|v| v * sign);

    let denom = 4.0 * a * c - b * b;
    if denom <= 0.0 {
        return None;
    }
    let cx = (b * e - 2.0 * c * d) / denom;
    let cy = (b * d - 2.0 * a * e) / denom;
    let f_center = a * cx * cx + b * cx * cy + c * cy * cy + d * cx + e * cy + f;
    if f_center >= 0.0 {
        return None;
    }

    let half_sum = (a + c) / 2.0;
    let radius = (((a - c) / 2.0).powi(2) + (b / 2.0).powi(2)).sqrt();
    let lambda_max = half_sum + radius;
    let lambda_min = half_sum - radius;
    if lambda_min <= 0.0 {
        return None;
    }

    // Direction `theta` carries `lambda_max`, i.e. the minor axis.
    let theta = 0.5 * b.atan2(a - c);
    let minor = 2.0 * (-f_center / lambda_max).sqrt();
    let major = 2.0 * (-f_center / lambda_min).sqrt();

    Some(Ellipse {
        center: Point2::new(cx, cy),
        axes: Vector2::new(major, minor),
        angle: normalize_angle_deg((theta + std::f64::consts::FRAC_PI_2).to_degrees()),
    })
}

/// Map an orientation in degrees into `[0, 180)`.
pub fn normalize_angle_deg(angle: f64) -> f64 {
    let a = angle.rem_euclid(180.0);
    if a >= 180.0 {
        0.0
    } else {
        a
    }
}
