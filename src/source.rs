use crate::error::FrameSourceError;
use crate::frame::{FrameData, FrameFormat};
use std::time::SystemTime;
use tracing::{debug, info};

/// Result of one frame read attempt
#[derive(Debug, Clone)]
pub enum FrameRead {
    /// A frame was captured
    Frame(FrameData),
    /// The source produced nothing this cycle (device busy, stream gap)
    Unavailable,
}

/// A device or stream that frames are pulled from. Lifecycle is
/// open / read-many / release; reads before `open` or after `release`
/// fail with `NotOpen`.
pub trait FrameSource: Send {
    /// Identifier for logging
    fn source_id(&self) -> u32;

    /// Acquire the underlying device or stream
    fn open(&mut self) -> Result<(), FrameSourceError>;

    /// Pull the next frame
    fn read(&mut self) -> Result<FrameRead, FrameSourceError>;

    /// Release the underlying device or stream. Safe to call when not open.
    fn release(&mut self);

    fn is_open(&self) -> bool;
}

/// Frame source producing synthetic gradient frames on demand, with a
/// script of cycle indices on which it reports unavailability. Stands in
/// for real capture hardware in tests and dry runs.
pub struct MockFrameSource {
    source_id: u32,
    width: u32,
    height: u32,
    open: bool,
    fail_open: bool,
    unavailable_on: Vec<u64>,
    read_errors_on: Vec<u64>,
    next_id: u64,
}

impl MockFrameSource {
    pub fn new(source_id: u32, width: u32, height: u32) -> Self {
        Self {
            source_id,
            width,
            height,
            open: false,
            fail_open: false,
            unavailable_on: Vec::new(),
            read_errors_on: Vec::new(),
            next_id: 0,
        }
    }

    /// Make `open` fail until `set_fail_open(false)` is called
    pub fn set_fail_open(&mut self, fail: bool) {
        self.fail_open = fail;
    }

    /// Report `Unavailable` on the given read indices (0-based)
    pub fn with_unavailable_on(mut self, indices: Vec<u64>) -> Self {
        self.unavailable_on = indices;
        self
    }

    /// Fail with `ReadFailed` on the given read indices (0-based)
    pub fn with_read_errors_on(mut self, indices: Vec<u64>) -> Self {
        self.read_errors_on = indices;
        self
    }

    fn synthetic_frame(&self, id: u64) -> FrameData {
        let mut data = vec![0u8; (self.width * self.height * 3) as usize];
        // Horizontal gradient keyed on the frame id so frames differ
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = ((i as u64 + id) % 256) as u8;
        }
        FrameData::new(
            id,
            SystemTime::now(),
            data,
            self.width,
            self.height,
            FrameFormat::Rgb24,
        )
    }
}

impl FrameSource for MockFrameSource {
    fn source_id(&self) -> u32 {
        self.source_id
    }

    fn open(&mut self) -> Result<(), FrameSourceError> {
        if self.fail_open {
            return Err(FrameSourceError::OpenFailed {
                source_id: self.source_id,
                details: "mock source configured to fail".to_string(),
            });
        }
        info!("Opened mock frame source {}", self.source_id);
        self.open = true;
        Ok(())
    }

    fn read(&mut self) -> Result<FrameRead, FrameSourceError> {
        if !self.open {
            return Err(FrameSourceError::NotOpen);
        }
        let id = self.next_id;
        self.next_id += 1;
        if self.read_errors_on.contains(&id) {
            return Err(FrameSourceError::ReadFailed {
                details: format!("scripted read failure at frame {}", id),
            });
        }
        if self.unavailable_on.contains(&id) {
            return Ok(FrameRead::Unavailable);
        }
        Ok(FrameRead::Frame(self.synthetic_frame(id)))
    }

    fn release(&mut self) {
        if self.open {
            debug!("Released mock frame source {}", self.source_id);
        }
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
