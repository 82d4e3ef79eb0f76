pub mod config;
pub mod consumer;
pub mod detect;
pub mod distance;
pub mod error;
pub mod events;
pub mod frame;
pub mod pipeline;
pub mod protocol;
pub mod publisher;
pub mod source;
pub mod tracker;

pub use config::ScenewatchConfig;
pub use consumer::{ConsumerStats, DetectionConsumer};
pub use detect::{
    BoundingBox, Detection, DetectionMode, DetectionModel, FaceModel, FixedOutputBackend,
    ModelBackend, ModelKind, ObjectModel,
};
pub use distance::DistanceEstimator;
pub use error::{Result, ScenewatchError};
pub use events::{EventBus, EventFilter, EventReceiver, PipelineEvent};
pub use frame::{FrameData, FrameFormat};
pub use pipeline::{AnnotatedFrame, PipelineCommand, PipelineHandle, PipelineScheduler};
pub use protocol::{DetectionEvent, DetectionTuple, Envelope};
pub use publisher::{
    ChannelTransport, EventPublisher, RecipientPolicy, ReplyMonitor, StaticDirectory,
    SubscriberDirectory, Transport,
};
pub use source::{FrameRead, FrameSource, MockFrameSource};
pub use tracker::{ObjectTracker, TrackedObject};
