use crate::detect::Detection;
use crate::error::PublishError;
use crate::protocol::{self, DetectionEvent, DetectionTuple, Envelope, PING_RESPONSE};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Who receives each published detection event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientPolicy {
    /// Every known subscriber
    All,
    /// A single named subscriber
    One(String),
}

impl RecipientPolicy {
    /// Map the optional configured recipient onto a policy
    pub fn from_config(recipient: Option<&str>) -> Self {
        match recipient {
            Some(name) if !name.is_empty() => Self::One(name.to_string()),
            _ => Self::All,
        }
    }
}

/// Lookup of currently known subscribers. Implementations may be static
/// or backed by a discovery mechanism; `refresh` asks for a re-scan when
/// the publisher finds the list empty.
pub trait SubscriberDirectory: Send + Sync {
    fn subscribers(&self) -> Vec<String>;
    fn refresh(&self);
}

/// Directory over a fixed, mutable subscriber list
pub struct StaticDirectory {
    names: RwLock<Vec<String>>,
}

impl StaticDirectory {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names: RwLock::new(names),
        }
    }

    pub fn add(&self, name: &str) {
        let mut names = self.names.write();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    pub fn remove(&self, name: &str) {
        self.names.write().retain(|n| n != name);
    }
}

impl SubscriberDirectory for StaticDirectory {
    fn subscribers(&self) -> Vec<String> {
        self.names.read().clone()
    }

    fn refresh(&self) {
        debug!("Subscriber refresh requested ({} known)", self.names.read().len());
    }
}

/// One-way envelope delivery. Sends are fire-and-forget from the
/// publisher's point of view; a failed send is logged, never retried.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, recipient: &str, envelope: Envelope) -> Result<(), PublishError>;
}

/// Transport that delivers addressed envelopes over an in-process channel
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<(String, Envelope)>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::UnboundedSender<(String, Envelope)>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, recipient: &str, envelope: Envelope) -> Result<(), PublishError> {
        self.tx
            .send((recipient.to_string(), envelope))
            .map_err(|_| PublishError::SendFailed {
                recipient: recipient.to_string(),
                details: "channel closed".to_string(),
            })
    }
}

/// Publishes each cycle's detection set to subscribers, throttled to one
/// event per publish interval regardless of the pipeline tick rate. An
/// empty set is published too, so subscribers learn when the scene clears.
pub struct EventPublisher {
    sender_name: String,
    topic: String,
    policy: RecipientPolicy,
    interval: Duration,
    last_publish: Option<Instant>,
    directory: Arc<dyn SubscriberDirectory>,
    transport: Arc<dyn Transport>,
}

impl EventPublisher {
    pub fn new(
        sender_name: &str,
        topic: &str,
        policy: RecipientPolicy,
        interval: Duration,
        directory: Arc<dyn SubscriberDirectory>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            sender_name: sender_name.to_string(),
            topic: topic.to_string(),
            policy,
            interval,
            last_publish: None,
            directory,
            transport,
        }
    }

    pub fn set_policy(&mut self, policy: RecipientPolicy) {
        self.policy = policy;
    }

    pub fn policy(&self) -> &RecipientPolicy {
        &self.policy
    }

    fn recipients(&self) -> Vec<String> {
        match &self.policy {
            RecipientPolicy::All => self.directory.subscribers(),
            RecipientPolicy::One(name) => {
                let known = self.directory.subscribers();
                if known.iter().any(|n| n == name) {
                    vec![name.clone()]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Publish the cycle's detection set if the throttle interval has
    /// elapsed. Returns how many sends went out. Individual send failures
    /// are logged and do not abort the batch.
    pub async fn maybe_publish(
        &mut self,
        detections: &[Detection],
        now: Instant,
    ) -> Result<usize, PublishError> {
        if let Some(last) = self.last_publish {
            if now.saturating_duration_since(last) < self.interval {
                return Ok(0);
            }
        }

        let recipients = self.recipients();
        if recipients.is_empty() {
            // Consume the publish window anyway so a discovery backend is
            // poked at most once per interval, not once per tick
            self.last_publish = Some(now);
            self.directory.refresh();
            return Ok(0);
        }

        let tuples: Vec<DetectionTuple> = detections.iter().map(DetectionTuple::from).collect();
        let event = DetectionEvent::new(tuples, epoch_millis());
        let envelope =
            Envelope::detection_event(&self.topic, &self.sender_name, &event).map_err(|e| {
                PublishError::Encoding {
                    details: e.to_string(),
                }
            })?;

        let mut sent = 0;
        for recipient in &recipients {
            match self.transport.send(recipient, envelope.clone()).await {
                Ok(()) => {
                    debug!(
                        "Published {} detections to {}",
                        event.detections.len(),
                        recipient
                    );
                    sent += 1;
                }
                Err(e) => warn!("Send to {} failed: {}", recipient, e),
            }
        }

        if sent > 0 {
            self.last_publish = Some(now);
        }
        Ok(sent)
    }
}

/// Tallies subscriber replies on the sensing side. Replies are purely
/// informational; publishing never waits on them.
#[derive(Debug, Default)]
pub struct ReplyMonitor {
    ack_count: u64,
    acked_detections: u64,
    ping_responses: u64,
}

impl ReplyMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one reply line into the tallies. Unrecognized lines are
    /// logged and ignored.
    pub fn record(&mut self, line: &str) {
        let line = line.trim();
        if line == PING_RESPONSE {
            self.ping_responses += 1;
            debug!("Ping response received ({} total)", self.ping_responses);
            return;
        }
        match protocol::parse_ack(line) {
            Ok(count) => {
                self.ack_count += 1;
                self.acked_detections += count as u64;
                debug!(
                    "Ack for {} detections ({} acked across {} replies)",
                    count, self.acked_detections, self.ack_count
                );
            }
            Err(e) => warn!("Ignoring unrecognized reply: {}", e),
        }
    }

    pub fn ack_count(&self) -> u64 {
        self.ack_count
    }

    pub fn acked_detections(&self) -> u64 {
        self.acked_detections
    }

    pub fn ping_responses(&self) -> u64 {
        self.ping_responses
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingTransport {
        sent: Mutex<Vec<(String, Envelope)>>,
    }

    impl RecordingTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.sent.lock().len()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, recipient: &str, envelope: Envelope) -> Result<(), PublishError> {
            self.sent.lock().push((recipient.to_string(), envelope));
            Ok(())
        }
    }

    struct CountingDirectory {
        refreshes: AtomicUsize,
    }

    impl SubscriberDirectory for CountingDirectory {
        fn subscribers(&self) -> Vec<String> {
            Vec::new()
        }

        fn refresh(&self) {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn detection() -> Detection {
        let mut det = Detection::new("face", BoundingBox::new(10, 10, 300, 300), 0.9);
        det.distance = 32.8;
        det
    }

    fn publisher(
        policy: RecipientPolicy,
        directory: Arc<dyn SubscriberDirectory>,
        transport: Arc<dyn Transport>,
    ) -> EventPublisher {
        EventPublisher::new(
            "vision",
            "vision-detection",
            policy,
            Duration::from_millis(500),
            directory,
            transport,
        )
    }

    #[tokio::test]
    async fn test_throttle_suppresses_rapid_publishes() {
        let transport = RecordingTransport::new();
        let directory = Arc::new(StaticDirectory::new(vec!["monitor".to_string()]));
        let mut publisher = publisher(RecipientPolicy::All, directory, transport.clone());

        let base = Instant::now();
        let detections = vec![detection()];

        assert_eq!(publisher.maybe_publish(&detections, base).await.unwrap(), 1);
        // 100ms later, inside the interval
        assert_eq!(
            publisher
                .maybe_publish(&detections, base + Duration::from_millis(100))
                .await
                .unwrap(),
            0
        );
        // 600ms later, past the interval
        assert_eq!(
            publisher
                .maybe_publish(&detections, base + Duration::from_millis(600))
                .await
                .unwrap(),
            1
        );
        assert_eq!(transport.count(), 2);
    }

    #[tokio::test]
    async fn test_empty_set_publishes_scene_clear() {
        let transport = RecordingTransport::new();
        let directory = Arc::new(StaticDirectory::new(vec!["monitor".to_string()]));
        let mut publisher = publisher(RecipientPolicy::All, directory, transport.clone());

        assert_eq!(
            publisher.maybe_publish(&[], Instant::now()).await.unwrap(),
            1
        );

        let sent = transport.sent.lock();
        let event = DetectionEvent::decode(&sent[0].1.body).unwrap();
        assert!(event.detections.is_empty());
        assert!(event.timestamp > 0);
    }

    #[tokio::test]
    async fn test_no_subscribers_refresh_is_paced_by_throttle() {
        let transport = RecordingTransport::new();
        let directory = Arc::new(CountingDirectory {
            refreshes: AtomicUsize::new(0),
        });
        let mut publisher = publisher(RecipientPolicy::All, directory.clone(), transport.clone());

        let base = Instant::now();
        // Ticks every 50ms inside one publish window poke the directory once
        for offset in [0u64, 50, 100, 150] {
            publisher
                .maybe_publish(&[detection()], base + Duration::from_millis(offset))
                .await
                .unwrap();
        }
        assert_eq!(directory.refreshes.load(Ordering::SeqCst), 1);

        // A tick past the window triggers the next refresh
        publisher
            .maybe_publish(&[detection()], base + Duration::from_millis(600))
            .await
            .unwrap();
        assert_eq!(directory.refreshes.load(Ordering::SeqCst), 2);
        assert_eq!(transport.count(), 0);
    }

    #[tokio::test]
    async fn test_single_recipient_policy_addresses_one() {
        let transport = RecordingTransport::new();
        let directory = Arc::new(StaticDirectory::new(vec![
            "monitor".to_string(),
            "archiver".to_string(),
        ]));
        let mut publisher = publisher(
            RecipientPolicy::One("archiver".to_string()),
            directory,
            transport.clone(),
        );

        assert_eq!(
            publisher
                .maybe_publish(&[detection()], Instant::now())
                .await
                .unwrap(),
            1
        );
        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "archiver");
    }

    #[tokio::test]
    async fn test_configured_topic_is_stamped_on_envelopes() {
        let transport = RecordingTransport::new();
        let directory = Arc::new(StaticDirectory::new(vec!["monitor".to_string()]));
        let mut publisher = EventPublisher::new(
            "vision",
            "lab-detections",
            RecipientPolicy::All,
            Duration::from_millis(500),
            directory,
            transport.clone(),
        );

        publisher
            .maybe_publish(&[detection()], Instant::now())
            .await
            .unwrap();
        assert_eq!(transport.sent.lock()[0].1.topic, "lab-detections");
    }

    #[test]
    fn test_policy_from_config() {
        assert_eq!(RecipientPolicy::from_config(None), RecipientPolicy::All);
        assert_eq!(RecipientPolicy::from_config(Some("")), RecipientPolicy::All);
        assert_eq!(
            RecipientPolicy::from_config(Some("monitor")),
            RecipientPolicy::One("monitor".to_string())
        );
    }

    #[test]
    fn test_reply_monitor_tallies_acks_and_pings() {
        let mut monitor = ReplyMonitor::new();
        monitor.record("ACK:2");
        monitor.record("ACK:3");
        monitor.record("PING_RESPONSE");
        monitor.record("what is this");

        assert_eq!(monitor.ack_count(), 2);
        assert_eq!(monitor.acked_detections(), 5);
        assert_eq!(monitor.ping_responses(), 1);
    }
}
