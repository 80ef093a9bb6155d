//! Raw detector output to canonical detections.

use pupil_bench_core::Ellipse;
use serde::{Deserialize, Serialize};

use crate::raw::{RawDetection, SchemaFamily};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AdaptError {
    #[error("detector registered as {expected:?} returned a {found:?} result")]
    SchemaMismatch {
        expected: SchemaFamily,
        found: SchemaFamily,
    },
    #[error("detector returned a non-finite {field}")]
    NonFinite { field: &'static str },
}

/// Detector output in source-image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDetection {
    pub confidence: f64,
    pub ellipse: Ellipse,
}

/// Maps one detector identity's raw results into [`CanonicalDetection`].
///
/// The family is fixed when the adapter is built and never inferred from a
/// result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectorAdapter {
    family: SchemaFamily,
}

impl DetectorAdapter {
    pub fn new(family: SchemaFamily) -> Self {
        Self { family }
    }

    pub fn family(&self) -> SchemaFamily {
        self.family
    }

    /// Scale center and axes by `rescaling_factor`; the angle passes through.
    ///
    /// Every numeric field must be finite.
    pub fn adapt(
        &self,
        raw: &RawDetection,
        rescaling_factor: f64,
    ) -> Result<CanonicalDetection, AdaptError> {
        let (confidence, center, axes, angle) = match (self.family, raw) {
            (SchemaFamily::EllipseObject, RawDetection::EllipseObject(r)) => {
                (r.confidence, r.ellipse.center, r.ellipse.axes, r.ellipse.angle)
            }
            (SchemaFamily::FlatFields, RawDetection::FlatFields(r)) => (
                r.confidence,
                [r.center_x, r.center_y],
                [r.first_ax, r.second_ax],
                r.angle,
            ),
            (expected, raw) => {
                return Err(AdaptError::SchemaMismatch {
                    expected,
                    found: raw.family(),
                })
            }
        };
        for (field, values) in [
            ("confidence", &[confidence][..]),
            ("center", &center[..]),
            ("axes", &axes[..]),
            ("angle", &[angle][..]),
        ] {
            if values.iter().any(|v| !v.is_finite()) {
                return Err(AdaptError::NonFinite { field });
            }
        }
        let scaled = Ellipse::new(center, axes, angle).scaled(rescaling_factor);
        Ok(CanonicalDetection {
            confidence,
            ellipse: scaled,
        })
    }
}
