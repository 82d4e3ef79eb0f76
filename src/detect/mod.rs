pub mod backend;
pub mod face;
pub mod object;

pub use backend::{FixedOutputBackend, ModelBackend};
pub use face::FaceModel;
pub use object::ObjectModel;

use crate::error::DetectorError;
use crate::frame::FrameData;
use serde::{Deserialize, Serialize};

/// Which model variants run each cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMode {
    /// Run every available variant
    All,
    /// Run the face model only
    FacesOnly,
    /// Run the object model only
    ObjectsOnly,
}

impl DetectionMode {
    /// Check whether a model variant participates in this mode
    pub fn includes(&self, kind: ModelKind) -> bool {
        match (self, kind) {
            (DetectionMode::All, _) => true,
            (DetectionMode::FacesOnly, ModelKind::Face) => true,
            (DetectionMode::ObjectsOnly, ModelKind::Object) => true,
            _ => false,
        }
    }
}

/// Model variant identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Face,
    Object,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Face => "face",
            ModelKind::Object => "object",
        }
    }
}

/// Axis-aligned bounding box in source-frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a box from possibly out-of-frame float coordinates, clamping
    /// negative positions to zero
    pub fn from_f32(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x: x.max(0.0) as u32,
            y: y.max(0.0) as u32,
            width: width.max(0.0) as u32,
            height: height.max(0.0) as u32,
        }
    }
}

/// Transient result of one inference call. Created fresh every cycle, never
/// mutated, and discarded once folded into the tracker or serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Object category (e.g. "face", "dog")
    pub category: String,
    /// Bounding box in source-frame pixels
    pub bbox: BoundingBox,
    /// Model confidence, in [0, 1]
    pub confidence: f32,
    /// Estimated distance in centimeters; zero until the estimator stage
    /// has run (see `DistanceEstimator::annotate`)
    pub distance: f64,
}

impl Detection {
    pub fn new<S: Into<String>>(category: S, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            category: category.into(),
            bbox,
            confidence,
            distance: 0.0,
        }
    }
}

/// Capability shared by all detection model variants. Implementations are
/// stateless per call and wrap a pre-loaded inference backend; model-file
/// loading is an external collaborator's concern.
pub trait DetectionModel: Send + Sync {
    /// Which variant this model implements
    fn kind(&self) -> ModelKind;

    /// Run inference over a frame. Only detections with
    /// `confidence > threshold` are returned, with bounding boxes already
    /// rescaled to source-frame pixel coordinates.
    fn infer(&self, frame: &FrameData, threshold: f32) -> Result<Vec<Detection>, DetectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_mode_gating() {
        assert!(DetectionMode::All.includes(ModelKind::Face));
        assert!(DetectionMode::All.includes(ModelKind::Object));
        assert!(DetectionMode::FacesOnly.includes(ModelKind::Face));
        assert!(!DetectionMode::FacesOnly.includes(ModelKind::Object));
        assert!(DetectionMode::ObjectsOnly.includes(ModelKind::Object));
        assert!(!DetectionMode::ObjectsOnly.includes(ModelKind::Face));
    }

    #[test]
    fn test_bounding_box_clamps_negative_coordinates() {
        let bbox = BoundingBox::from_f32(-12.5, -3.0, 40.0, 25.0);
        assert_eq!(bbox.x, 0);
        assert_eq!(bbox.y, 0);
        assert_eq!(bbox.width, 40);
        assert_eq!(bbox.height, 25);
    }

    #[test]
    fn test_detection_mode_serde_kebab_case() {
        let mode: DetectionMode = serde_json::from_str("\"faces-only\"").unwrap();
        assert_eq!(mode, DetectionMode::FacesOnly);
        assert_eq!(
            serde_json::to_string(&DetectionMode::ObjectsOnly).unwrap(),
            "\"objects-only\""
        );
    }
}
