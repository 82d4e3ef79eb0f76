use crate::detect::{BoundingBox, Detection, DetectionModel, ModelBackend, ModelKind};
use crate::error::DetectorError;
use crate::frame::FrameData;
use tracing::trace;

/// Closed category set for the object variant (COCO class names, in
/// network output order)
pub const OBJECT_CATEGORIES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Object detection adapter over a YOLO-style backend.
///
/// Output rows carry `[cx, cy, w, h, objectness, class_scores...]` with
/// center/size coordinates normalized to [0, 1]. Each row yields at most one
/// detection: the single highest-scoring class. No non-maximum suppression
/// is performed, so overlapping boxes for the same physical object are
/// accepted as separate detections; swapping in NMS would be an enhancement,
/// not a fix.
pub struct ObjectModel {
    backend: Box<dyn ModelBackend>,
}

impl ObjectModel {
    pub fn new(backend: Box<dyn ModelBackend>) -> Self {
        Self { backend }
    }

    /// Index and score of the best class in a row's score slice
    fn best_class(scores: &[f32]) -> Option<(usize, f32)> {
        scores
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (idx, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((idx, score)),
            })
    }
}

impl DetectionModel for ObjectModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Object
    }

    fn infer(&self, frame: &FrameData, threshold: f32) -> Result<Vec<Detection>, DetectorError> {
        let rows = self.backend.forward(frame)?;
        let frame_width = frame.width as f32;
        let frame_height = frame.height as f32;

        let mut results = Vec::new();
        for row in &rows {
            if row.len() < 6 {
                trace!("Skipping short object output row ({} elements)", row.len());
                continue;
            }

            let (class_id, confidence) = match Self::best_class(&row[5..]) {
                Some(best) => best,
                None => continue,
            };
            if confidence <= threshold {
                continue;
            }

            let category = match OBJECT_CATEGORIES.get(class_id) {
                Some(name) => *name,
                None => {
                    return Err(DetectorError::MalformedOutput {
                        details: format!("class id {} outside category set", class_id),
                    });
                }
            };

            let center_x = row[0] * frame_width;
            let center_y = row[1] * frame_height;
            let width = row[2] * frame_width;
            let height = row[3] * frame_height;
            let bbox = BoundingBox::from_f32(
                center_x - width / 2.0,
                center_y - height / 2.0,
                width,
                height,
            );

            results.push(Detection::new(category, bbox, confidence));
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

    /// Row with the given class score set and a centered box
    fn row_with_scores(scores: Vec<f32>) -> Vec<f32> {
        let mut row = vec![0.5, 0.5, 0.25, 0.25, 1.0];
        row.extend(scores);
        row
    }

    #[test]
    fn test_object_picks_single_best_class() {
        // Class 16 ("dog") scores highest
        let mut scores = vec![0.0f32; 80];
        scores[15] = 0.3; // cat
        scores[16] = 0.8; // dog
        let backend = FixedOutputBackend::new(vec![row_with_scores(scores)]);
        let model = ObjectModel::new(Box::new(backend));

        let detections = model.infer(&test_frame(), 0.5).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].category, "dog");
        assert_eq!(detections[0].confidence, 0.8);
    }

    #[test]
    fn test_object_box_rescaled_from_center_form() {
        let mut scores = vec![0.0f32; 80];
        scores[0] = 0.9; // person
        let backend = FixedOutputBackend::new(vec![row_with_scores(scores)]);
        let model = ObjectModel::new(Box::new(backend));

        let detections = model.infer(&test_frame(), 0.5).unwrap();
        let bbox = detections[0].bbox;
        // center (320, 240), size (160, 120) -> top-left (240, 180)
        assert_eq!(bbox.x, 240);
        assert_eq!(bbox.y, 180);
        assert_eq!(bbox.width, 160);
        assert_eq!(bbox.height, 120);
    }

    #[test]
    fn test_object_threshold_is_strict() {
        let mut at = vec![0.0f32; 80];
        at[2] = 0.5;
        let mut above = vec![0.0f32; 80];
        above[2] = 0.6;
        let backend =
            FixedOutputBackend::new(vec![row_with_scores(at), row_with_scores(above)]);
        let model = ObjectModel::new(Box::new(backend));

        let detections = model.infer(&test_frame(), 0.5).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence, 0.6);
    }

    #[test]
    fn test_object_overlapping_boxes_are_kept() {
        // Two identical rows produce two detections; no suppression
        let mut scores = vec![0.0f32; 80];
        scores[2] = 0.9;
        let backend = FixedOutputBackend::new(vec![
            row_with_scores(scores.clone()),
            row_with_scores(scores),
        ]);
        let model = ObjectModel::new(Box::new(backend));

        let detections = model.infer(&test_frame(), 0.5).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].bbox, detections[1].bbox);
    }

    #[test]
    fn test_object_rejects_out_of_range_class() {
        let mut row = vec![0.5, 0.5, 0.25, 0.25, 1.0];
        row.extend(vec![0.0f32; 81]);
        row[5 + 80] = 0.9; // index past the closed category set
        let backend = FixedOutputBackend::new(vec![row]);
        let model = ObjectModel::new(Box::new(backend));

        assert!(model.infer(&test_frame(), 0.5).is_err());
    }
}
