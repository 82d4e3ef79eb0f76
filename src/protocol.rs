use crate::detect::Detection;
use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};

/// Topic detection events are published under
pub const DETECTION_TOPIC: &str = "vision-detection";

/// Legacy single-detection alert prefix
pub const LEGACY_PREFIX: &str = "DETECTION:";

/// Acknowledgement token prefix, `ACK:<count>`
pub const ACK_PREFIX: &str = "ACK:";

/// Liveness probe and its reply
pub const PING: &str = "PING";
pub const PING_RESPONSE: &str = "PING_RESPONSE";

/// One detection as serialized on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionTuple {
    #[serde(rename = "type")]
    pub category: String,
    pub distance: f64,
    pub confidence: f32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl From<&Detection> for DetectionTuple {
    fn from(det: &Detection) -> Self {
        Self {
            category: det.category.clone(),
            distance: det.distance,
            confidence: det.confidence,
            x: det.bbox.x,
            y: det.bbox.y,
            width: det.bbox.width,
            height: det.bbox.height,
        }
    }
}

/// Batch of detections with the publish time in epoch milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub detections: Vec<DetectionTuple>,
    pub timestamp: u64,
}

impl DetectionEvent {
    pub fn new(detections: Vec<DetectionTuple>, timestamp: u64) -> Self {
        Self {
            detections,
            timestamp,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(body: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Addressed message as handed to a transport
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub topic: String,
    pub sender: String,
    pub body: String,
}

impl Envelope {
    pub fn detection_event(
        topic: &str,
        sender: &str,
        event: &DetectionEvent,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            topic: topic.to_string(),
            sender: sender.to_string(),
            body: event.encode()?,
        })
    }
}

/// Render a detection as the legacy colon-delimited alert line
pub fn encode_legacy_line(tuple: &DetectionTuple) -> String {
    format!(
        "{}{}:{:.1}:{:.2}",
        LEGACY_PREFIX, tuple.category, tuple.distance, tuple.confidence
    )
}

/// Parse a legacy `DETECTION:type:distance:confidence` line. Some senders
/// format floats under comma-decimal locales, so commas are accepted as
/// decimal separators.
pub fn parse_legacy_line(line: &str) -> Result<(String, f64, f32), ProtocolError> {
    let rest = line
        .strip_prefix(LEGACY_PREFIX)
        .ok_or_else(|| ProtocolError::Malformed {
            details: format!("missing {} prefix", LEGACY_PREFIX),
        })?;

    let mut parts = rest.splitn(3, ':');
    let category = parts.next().unwrap_or_default();
    let distance = parts.next().ok_or_else(|| ProtocolError::Malformed {
        details: "missing distance field".to_string(),
    })?;
    let confidence = parts.next().ok_or_else(|| ProtocolError::Malformed {
        details: "missing confidence field".to_string(),
    })?;

    if category.is_empty() {
        return Err(ProtocolError::Malformed {
            details: "empty category field".to_string(),
        });
    }

    let distance: f64 = distance
        .replace(',', ".")
        .parse()
        .map_err(|_| ProtocolError::Malformed {
            details: format!("unparsable distance '{}'", distance),
        })?;
    let confidence: f32 = confidence
        .replace(',', ".")
        .parse()
        .map_err(|_| ProtocolError::Malformed {
            details: format!("unparsable confidence '{}'", confidence),
        })?;

    Ok((category.to_string(), distance, confidence))
}

/// Render an acknowledgement for a received detection count
pub fn encode_ack(count: usize) -> String {
    format!("{}{}", ACK_PREFIX, count)
}

/// Parse an `ACK:<count>` token
pub fn parse_ack(line: &str) -> Result<usize, ProtocolError> {
    let rest = line
        .strip_prefix(ACK_PREFIX)
        .ok_or_else(|| ProtocolError::Malformed {
            details: format!("missing {} prefix", ACK_PREFIX),
        })?;
    rest.parse().map_err(|_| ProtocolError::Malformed {
        details: format!("unparsable ack count '{}'", rest),
    })
}
