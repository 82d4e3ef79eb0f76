use crate::error::ProtocolError;
use crate::protocol::{
    self, DetectionEvent, Envelope, ACK_PREFIX, DETECTION_TOPIC, PING, PING_RESPONSE,
};
use chrono::{Local, TimeZone, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Latest observation for one detection category
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryStats {
    pub count: u64,
    pub latest_distance: f64,
    pub latest_confidence: f32,
}

/// Aggregate view over everything a consumer has received
#[derive(Debug, Clone, Default)]
pub struct ConsumerStats {
    pub events_received: u64,
    pub detections_received: u64,
    pub malformed_dropped: u64,
    pub per_category: HashMap<String, CategoryStats>,
}

impl ConsumerStats {
    /// Distinct categories seen so far
    pub fn category_count(&self) -> usize {
        self.per_category.len()
    }
}

/// Receives detection envelopes, keeps running aggregates, and answers
/// liveness probes. Malformed input is counted and dropped; the loop never
/// stops on bad data.
pub struct DetectionConsumer {
    name: String,
    stats: Arc<RwLock<ConsumerStats>>,
    replies: Option<mpsc::UnboundedSender<String>>,
}

impl DetectionConsumer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stats: Arc::new(RwLock::new(ConsumerStats::default())),
            replies: None,
        }
    }

    /// Send `ACK:<count>` after each event and `PING_RESPONSE` after each
    /// probe on the given channel
    pub fn with_replies(mut self, replies: mpsc::UnboundedSender<String>) -> Self {
        self.replies = Some(replies);
        self
    }

    /// Shared handle to the aggregates, usable while the loop runs
    pub fn stats(&self) -> Arc<RwLock<ConsumerStats>> {
        self.stats.clone()
    }

    /// Drain the inbound channel until it closes
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Envelope>) {
        info!("Consumer {} listening", self.name);
        while let Some(envelope) = inbox.recv().await {
            self.handle(&envelope);
        }
        info!("Consumer {} inbox closed", self.name);
    }

    /// Process one envelope. Accepts JSON detection events, legacy alert
    /// lines, and PING probes; anything else is dropped with a warning.
    pub fn handle(&mut self, envelope: &Envelope) {
        let body = envelope.body.trim();

        if body == PING {
            debug!("Consumer {} answering ping from {}", self.name, envelope.sender);
            self.reply(PING_RESPONSE.to_string());
            return;
        }
        if body.starts_with(ACK_PREFIX) {
            // Acks terminate at the consumer; nothing to aggregate
            return;
        }

        if envelope.topic != DETECTION_TOPIC {
            let err = ProtocolError::UnknownTopic {
                topic: envelope.topic.clone(),
            };
            warn!("Consumer {} dropping message: {}", self.name, err);
            self.stats.write().malformed_dropped += 1;
            return;
        }

        match DetectionEvent::decode(body) {
            Ok(event) => self.record_event(&event),
            Err(_) => match protocol::parse_legacy_line(body) {
                Ok((category, distance, confidence)) => {
                    self.record_legacy(&category, distance, confidence);
                }
                Err(e) => {
                    warn!("Consumer {} dropping malformed body: {}", self.name, e);
                    self.stats.write().malformed_dropped += 1;
                }
            },
        }
    }

    fn record_event(&mut self, event: &DetectionEvent) {
        let when = Utc
            .timestamp_millis_opt(event.timestamp as i64)
            .single()
            .map(|t| t.with_timezone(&Local).format("%H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| event.timestamp.to_string());

        {
            let mut stats = self.stats.write();
            stats.events_received += 1;
            stats.detections_received += event.detections.len() as u64;
            for det in &event.detections {
                let entry = stats.per_category.entry(det.category.clone()).or_default();
                entry.count += 1;
                entry.latest_distance = det.distance;
                entry.latest_confidence = det.confidence;
            }
        }

        for det in &event.detections {
            info!(
                "[{}] {}: {} at {:.1}cm (confidence {:.2})",
                when, self.name, det.category, det.distance, det.confidence
            );
        }
        self.reply(protocol::encode_ack(event.detections.len()));
    }

    fn record_legacy(&mut self, category: &str, distance: f64, confidence: f32) {
        {
            let mut stats = self.stats.write();
            stats.events_received += 1;
            stats.detections_received += 1;
            let entry = stats.per_category.entry(category.to_string()).or_default();
            entry.count += 1;
            entry.latest_distance = distance;
            entry.latest_confidence = confidence;
        }
        info!(
            "{}: legacy alert {} at {:.1}cm (confidence {:.2})",
            self.name, category, distance, confidence
        );
        self.reply(protocol::encode_ack(1));
    }

    fn reply(&self, message: String) {
        if let Some(replies) = &self.replies {
            if replies.send(message).is_err() {
                debug!("Consumer {} reply channel closed", self.name);
            }
        }
    }
}
