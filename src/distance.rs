use crate::detect::Detection;
use tracing::trace;

/// Average real-world widths per category, in centimeters, used as the
/// reference size in the pinhole distance formula
const REFERENCE_SIZES_CM: &[(&str, f64)] = &[
    ("person", 45.0),     // shoulder width
    ("face", 16.0),       // face width
    ("car", 180.0),       // car width
    ("cat", 30.0),        // body length
    ("dog", 40.0),        // body length
    ("bottle", 8.0),      // bottle width
    ("laptop", 35.0),     // laptop width
    ("cell phone", 7.0),  // phone width
];

/// Reference size applied when a category has no table entry
const DEFAULT_REFERENCE_SIZE_CM: f64 = 30.0;

/// Maps (category, pixel width) to an estimated real-world distance using
/// `distance = (reference_size * focal_length) / pixel_width`. Monotone
/// decreasing in pixel width for a fixed category.
#[derive(Debug, Clone)]
pub struct DistanceEstimator {
    focal_length: f64,
}

impl DistanceEstimator {
    /// Create an estimator with the given focal length constant (pixels)
    pub fn new(focal_length: f64) -> Self {
        debug_assert!(focal_length > 0.0);
        Self { focal_length }
    }

    /// Real-world reference width for a category, in centimeters
    pub fn reference_size(category: &str) -> f64 {
        REFERENCE_SIZES_CM
            .iter()
            .find(|(name, _)| *name == category)
            .map(|(_, size)| *size)
            .unwrap_or(DEFAULT_REFERENCE_SIZE_CM)
    }

    /// Estimated distance in centimeters. Must not be called with
    /// `pixel_width == 0`; callers guard against zero-width boxes first.
    pub fn estimate(&self, category: &str, pixel_width: u32) -> f64 {
        debug_assert!(pixel_width > 0, "estimate called with zero pixel width");
        (Self::reference_size(category) * self.focal_length) / pixel_width as f64
    }

    /// Fill in distances for a detection batch. Zero-width boxes have no
    /// defined distance and are dropped here, which keeps the `distance > 0`
    /// invariant for everything downstream.
    pub fn annotate(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections
            .into_iter()
            .filter_map(|mut det| {
                if det.bbox.width == 0 {
                    trace!("Dropping zero-width {} detection", det.category);
                    return None;
                }
                det.distance = self.estimate(&det.category, det.bbox.width);
                Some(det)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    #[test]
    fn test_face_reference_scenario() {
        // A 300px-wide face with a 16cm reference and focal constant 615
        let estimator = DistanceEstimator::new(615.0);
        assert_eq!(estimator.estimate("face", 300), 32.8);
    }

    #[test]
    fn test_unknown_category_uses_fallback() {
        let estimator = DistanceEstimator::new(615.0);
        let expected = (30.0 * 615.0) / 100.0;
        assert_eq!(estimator.estimate("zebra", 100), expected);
    }

    #[test]
    fn test_monotone_decreasing_in_pixel_width() {
        let estimator = DistanceEstimator::new(615.0);
        let widths = [1u32, 10, 50, 100, 300, 640];
        for pair in widths.windows(2) {
            assert!(
                estimator.estimate("person", pair[0]) >= estimator.estimate("person", pair[1]),
                "distance must not increase with pixel width"
            );
        }
    }

    #[test]
    fn test_annotate_drops_zero_width_boxes() {
        let estimator = DistanceEstimator::new(615.0);
        let detections = vec![
            Detection::new("face", BoundingBox::new(10, 10, 300, 300), 0.9),
            Detection::new("face", BoundingBox::new(5, 5, 0, 20), 0.8),
        ];

        let annotated = estimator.annotate(detections);
        assert_eq!(annotated.len(), 1);
        assert_eq!(annotated[0].distance, 32.8);
    }
}
