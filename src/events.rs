use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Status events emitted by the pipeline for external observers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// A full cycle completed with the given number of detections
    CycleCompleted {
        frame_id: u64,
        detection_count: usize,
        timestamp: SystemTime,
    },
    /// A cycle was skipped (source unavailable, disabled, or overlap)
    CycleSkipped { reason: String },
    /// A detection event was sent to subscribers
    DetectionsPublished {
        detection_count: usize,
        recipient_count: usize,
        timestamp: SystemTime,
    },
    /// The frame source became unavailable; pipeline is disabled
    SourceUnavailable { timestamp: SystemTime },
    /// The pipeline was enabled or disabled
    EnabledChanged { enabled: bool, timestamp: SystemTime },
    /// A model variant is unavailable; running with reduced coverage
    ModelUnavailable { variant: String },
    /// A component error that aborted a single cycle
    CycleError { component: String, error: String },
    /// Pipeline shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl PipelineEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            PipelineEvent::CycleCompleted {
                frame_id,
                detection_count,
                ..
            } => {
                format!(
                    "Cycle completed for frame {} ({} detections)",
                    frame_id, detection_count
                )
            }
            PipelineEvent::CycleSkipped { reason } => format!("Cycle skipped: {}", reason),
            PipelineEvent::DetectionsPublished {
                detection_count,
                recipient_count,
                ..
            } => {
                format!(
                    "Published {} detections to {} recipients",
                    detection_count, recipient_count
                )
            }
            PipelineEvent::SourceUnavailable { .. } => "Frame source unavailable".to_string(),
            PipelineEvent::EnabledChanged { enabled, .. } => {
                format!("Pipeline {}", if *enabled { "enabled" } else { "disabled" })
            }
            PipelineEvent::ModelUnavailable { variant } => {
                format!("Model unavailable: {}", variant)
            }
            PipelineEvent::CycleError { component, error } => {
                format!("Cycle error in {}: {}", component, error)
            }
            PipelineEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::CycleCompleted { .. } => "cycle_completed",
            PipelineEvent::CycleSkipped { .. } => "cycle_skipped",
            PipelineEvent::DetectionsPublished { .. } => "detections_published",
            PipelineEvent::SourceUnavailable { .. } => "source_unavailable",
            PipelineEvent::EnabledChanged { .. } => "enabled_changed",
            PipelineEvent::ModelUnavailable { .. } => "model_unavailable",
            PipelineEvent::CycleError { .. } => "cycle_error",
            PipelineEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for status fan-out using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: PipelineEvent) -> Result<usize, EventBusError> {
        match &event {
            PipelineEvent::SourceUnavailable { .. } => {
                warn!("Frame source unavailable, pipeline disabled");
            }
            PipelineEvent::ModelUnavailable { variant } => {
                warn!("Model unavailable: {}, running with reduced coverage", variant);
            }
            PipelineEvent::CycleError { component, error } => {
                error!("Cycle error in {}: {}", component, error);
            }
            PipelineEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                debug!("Event: {}", event.description());
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &PipelineEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Event receiver that only yields events matching its filter
pub struct EventReceiver {
    receiver: broadcast::Receiver<PipelineEvent>,
    filter: EventFilter,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<PipelineEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<PipelineEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event receiver lagged behind by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        let subscriber_count = bus
            .publish(PipelineEvent::CycleCompleted {
                frame_id: 7,
                detection_count: 3,
                timestamp: SystemTime::now(),
            })
            .unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            PipelineEvent::CycleCompleted {
                frame_id,
                detection_count,
                ..
            } => {
                assert_eq!(frame_id, 7);
                assert_eq!(detection_count, 3);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let bus = EventBus::new(10);
        let mut filtered = EventReceiver::new(
            bus.subscribe(),
            EventFilter::EventTypes(vec!["detections_published"]),
        );

        bus.publish(PipelineEvent::CycleSkipped {
            reason: "disabled".to_string(),
        })
        .unwrap();
        bus.publish(PipelineEvent::DetectionsPublished {
            detection_count: 2,
            recipient_count: 1,
            timestamp: SystemTime::now(),
        })
        .unwrap();

        let received = timeout(Duration::from_millis(100), filtered.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type(), "detections_published");
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::EventTypes(vec!["cycle_error"]);
        let error = PipelineEvent::CycleError {
            component: "detector".to_string(),
            error: "boom".to_string(),
        };
        let skipped = PipelineEvent::CycleSkipped {
            reason: "overlap".to_string(),
        };

        assert!(filter.matches(&error));
        assert!(!filter.matches(&skipped));
    }
}
