use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScenewatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Frame source error: {0}")]
    FrameSource(#[from] FrameSourceError),

    #[error("Detector error: {0}")]
    Detector(#[from] DetectorError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),
}

/// Errors raised by frame sources (cameras, files, mocks)
#[derive(Error, Debug)]
pub enum FrameSourceError {
    #[error("Failed to open frame source {source_id}: {details}")]
    OpenFailed { source_id: u32, details: String },

    #[error("Frame source is not open")]
    NotOpen,

    #[error("Frame read failed: {details}")]
    ReadFailed { details: String },
}

/// Errors raised by detection model adapters
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Inference failed: {details}")]
    Inference { details: String },

    #[error("Malformed model output: {details}")]
    MalformedOutput { details: String },
}

/// Errors raised while publishing detection events
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Transport send failed to {recipient}: {details}")]
    SendFailed { recipient: String, details: String },

    #[error("Event encoding failed: {details}")]
    Encoding { details: String },
}

/// Errors raised while encoding or decoding wire messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed message: {details}")]
    Malformed { details: String },

    #[error("Unknown topic: {topic}")]
    UnknownTopic { topic: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the internal status event bus
#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, ScenewatchError>;
