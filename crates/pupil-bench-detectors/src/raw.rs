//! Detector-native result schemas.

use serde::{Deserialize, Serialize};

/// Output layout a detector identity is registered with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaFamily {
    /// Nested `ellipse.center`, `ellipse.axes`, `ellipse.angle`.
    EllipseObject,
    /// Flat `center_x`, `center_y`, `first_ax`, `second_ax`, `angle`.
    FlatFields,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawEllipse {
    pub center: [f64; 2],
    pub axes: [f64; 2],
    pub angle: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EllipseObjectResult {
    pub confidence: f64,
    pub ellipse: RawEllipse,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatFieldResult {
    pub center_x: f64,
    pub center_y: f64,
    pub first_ax: f64,
    pub second_ax: f64,
    pub angle: f64,
    pub confidence: f64,
}

/// What a detector hands back, in detector-space pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDetection {
    EllipseObject(EllipseObjectResult),
    FlatFields(FlatFieldResult),
}

impl RawDetection {
    pub fn family(&self) -> SchemaFamily {
        match self {
            RawDetection::EllipseObject(_) => SchemaFamily::EllipseObject,
            RawDetection::FlatFields(_) => SchemaFamily::FlatFields,
        }
    }
}

impl From<EllipseObjectResult> for RawDetection {
    fn from(value: EllipseObjectResult) -> Self {
        RawDetection::EllipseObject(value)
    }
}

impl From<FlatFieldResult> for RawDetection {
    fn from(value: FlatFieldResult) -> Self {
        RawDetection::FlatFields(value)
    }
}
