use crate::detect::{BoundingBox, Detection, DetectionModel, ModelBackend, ModelKind};
use crate::error::DetectorError;
use crate::frame::FrameData;
use tracing::trace;

/// Category emitted by the face variant
pub const FACE_CATEGORY: &str = "face";

/// Face detection adapter over an SSD-style backend.
///
/// Output rows carry 7 floats:
/// `[image_id, label, confidence, x_min, y_min, x_max, y_max]` with corner
/// coordinates normalized to [0, 1]. Rows shorter than 7 elements are
/// skipped, matching the bounds check the reference network output requires.
pub struct FaceModel {
    backend: Box<dyn ModelBackend>,
}

impl FaceModel {
    pub fn new(backend: Box<dyn ModelBackend>) -> Self {
        Self { backend }
    }
}

impl DetectionModel for FaceModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Face
    }

    fn infer(&self, frame: &FrameData, threshold: f32) -> Result<Vec<Detection>, DetectorError> {
        let rows = self.backend.forward(frame)?;
        let cols = frame.width as f32;
        let frame_rows = frame.height as f32;

        let mut results = Vec::new();
        for row in &rows {
            if row.len() < 7 {
                trace!("Skipping short face output row ({} elements)", row.len());
                continue;
            }

            let confidence = row[2];
            if confidence <= threshold {
                continue;
            }

            let x1 = row[3] * cols;
            let y1 = row[4] * frame_rows;
            let x2 = row[5] * cols;
            let y2 = row[6] * frame_rows;
            let bbox = BoundingBox::from_f32(x1, y1, x2 - x1, y2 - y1);

            results.push(Detection::new(FACE_CATEGORY, bbox, confidence));
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::FixedOutputBackend;
    use crate::frame::FrameFormat;
    use std::time::SystemTime;

    fn test_frame() -> FrameData {
        FrameData::new(
            1,
            SystemTime::now(),
            vec![0u8; 640 * 480 * 3],
            640,
            480,
            FrameFormat::Rgb24,
        )
    }

    #[test]
    fn test_face_rescales_to_frame_pixels() {
        let backend = FixedOutputBackend::new(vec![vec![0.0, 1.0, 0.9, 0.25, 0.25, 0.75, 0.5]]);
        let model = FaceModel::new(Box::new(backend));

        let detections = model.infer(&test_frame(), 0.5).unwrap();
        assert_eq!(detections.len(), 1);

        let det = &detections[0];
        assert_eq!(det.category, FACE_CATEGORY);
        assert_eq!(det.bbox.x, 160);
        assert_eq!(det.bbox.y, 120);
        assert_eq!(det.bbox.width, 320);
        assert_eq!(det.bbox.height, 120);
        assert_eq!(det.confidence, 0.9);
    }

    #[test]
    fn test_face_threshold_is_strict() {
        // One row exactly at threshold, one above, one below
        let backend = FixedOutputBackend::new(vec![
            vec![0.0, 1.0, 0.5, 0.1, 0.1, 0.2, 0.2],
            vec![0.0, 1.0, 0.51, 0.1, 0.1, 0.2, 0.2],
            vec![0.0, 1.0, 0.49, 0.1, 0.1, 0.2, 0.2],
        ]);
        let model = FaceModel::new(Box::new(backend));

        let detections = model.infer(&test_frame(), 0.5).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence, 0.51);
    }

    #[test]
    fn test_face_skips_short_rows() {
        let backend = FixedOutputBackend::new(vec![
            vec![0.0, 1.0, 0.9],
            vec![0.0, 1.0, 0.9, 0.1, 0.1, 0.2, 0.2],
        ]);
        let model = FaceModel::new(Box::new(backend));

        let detections = model.infer(&test_frame(), 0.5).unwrap();
        assert_eq!(detections.len(), 1);
    }
}
