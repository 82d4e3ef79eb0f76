use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layout of a captured frame. The pipeline treats pixel data as
/// opaque beyond dimensions and channel count; decoding is the frame
/// source's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// 8-bit grayscale, one channel
    Gray8,
    /// RGB24, three channels
    Rgb24,
    /// BGR24, three channels (OpenCV-style sources)
    Bgr24,
}

impl FrameFormat {
    /// Number of channels per pixel
    pub fn channels(&self) -> usize {
        match self {
            FrameFormat::Gray8 => 1,
            FrameFormat::Rgb24 => 3,
            FrameFormat::Bgr24 => 3,
        }
    }
}

/// A single captured frame with shared ownership of the pixel buffer
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Monotonically increasing frame identifier
    pub id: u64,
    /// Timestamp when the frame was captured
    pub timestamp: SystemTime,
    /// Raw pixel data (shared so handoffs never copy)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel layout
    pub format: FrameFormat,
}

impl FrameData {
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Expected buffer length for the declared dimensions and format
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channels()
    }

    /// Validate that the buffer matches the declared dimensions
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }

    /// Timestamp as epoch milliseconds, as used on the wire
    pub fn epoch_millis(&self) -> u64 {
        self.timestamp
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
