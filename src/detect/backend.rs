use crate::error::DetectorError;
use crate::frame::FrameData;

/// Forward pass of a pre-loaded inference network.
///
/// Backends hold a network that the external model loader prepared; the
/// pipeline never touches model files. Output is a sequence of float rows
/// whose layout is variant-specific: the face net emits 7-element SSD rows,
/// the object net emits `5 + num_classes` YOLO rows. Adapters in this module
/// tree interpret the rows.
pub trait ModelBackend: Send + Sync {
    /// Backend identifier for logging
    fn name(&self) -> &'static str;

    /// Run the network over a frame and return raw output rows
    fn forward(&self, frame: &FrameData) -> Result<Vec<Vec<f32>>, DetectorError>;
}

/// Backend returning canned output rows, for tests and dry runs
pub struct FixedOutputBackend {
    rows: Vec<Vec<f32>>,
}

impl FixedOutputBackend {
    pub fn new(rows: Vec<Vec<f32>>) -> Self {
        Self { rows }
    }

    /// Backend that detects nothing
    pub fn empty() -> Self {
        Self { rows: Vec::new() }
    }
}

impl ModelBackend for FixedOutputBackend {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn forward(&self, _frame: &FrameData) -> Result<Vec<Vec<f32>>, DetectorError> {
        Ok(self.rows.clone())
    }
}
