use crate::config::ScenewatchConfig;
use crate::detect::{Detection, DetectionMode, DetectionModel};
use crate::distance::DistanceEstimator;
use crate::events::{EventBus, PipelineEvent};
use crate::frame::FrameData;
use crate::publisher::{EventPublisher, RecipientPolicy};
use crate::source::{FrameRead, FrameSource};
use crate::tracker::{ObjectTracker, TrackedObject};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// A frame together with the detections found in it, for render sinks
/// and debugging consumers
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub frame: FrameData,
    pub detections: Vec<Detection>,
}

/// Runtime control messages accepted by a running scheduler
#[derive(Debug, Clone)]
pub enum PipelineCommand {
    /// Switch which model variants run each cycle
    SetMode(DetectionMode),
    /// Change the confidence threshold; values outside [0, 1] are ignored
    SetThreshold(f32),
    /// Change who receives published events
    SetRecipientPolicy(RecipientPolicy),
    /// Resume capture, reopening the source if needed
    Enable,
    /// Pause capture without releasing the source
    Disable,
    /// Stop the scheduler
    Shutdown,
}

/// Caller-side handle to a spawned scheduler
#[derive(Clone)]
pub struct PipelineHandle {
    commands: mpsc::Sender<PipelineCommand>,
    annotated_rx: watch::Receiver<Option<AnnotatedFrame>>,
    tracks_rx: watch::Receiver<Vec<TrackedObject>>,
}

impl PipelineHandle {
    pub async fn send(&self, command: PipelineCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Most recent annotated frame, if any cycle has completed yet
    pub fn latest_annotated(&self) -> Option<AnnotatedFrame> {
        self.annotated_rx.borrow().clone()
    }

    /// Most recent tracker snapshot
    pub fn latest_tracks(&self) -> Vec<TrackedObject> {
        self.tracks_rx.borrow().clone()
    }

    /// Watch receiver for tracker snapshots, for callers that want to await
    /// changes rather than poll
    pub fn tracks_watch(&self) -> watch::Receiver<Vec<TrackedObject>> {
        self.tracks_rx.clone()
    }
}

/// Drives the capture/detect/estimate/track/publish cycle on a fixed tick.
/// The scheduler owns every pipeline stage; other tasks interact only
/// through commands and the watch channels, so no stage needs a lock.
pub struct PipelineScheduler {
    source: Box<dyn FrameSource>,
    models: Vec<Box<dyn DetectionModel>>,
    estimator: DistanceEstimator,
    tracker: ObjectTracker,
    publisher: EventPublisher,
    mode: DetectionMode,
    threshold: f32,
    enabled: bool,
    tick_period: Duration,
    events: EventBus,
    commands: mpsc::Receiver<PipelineCommand>,
    annotated_tx: watch::Sender<Option<AnnotatedFrame>>,
    tracks_tx: watch::Sender<Vec<TrackedObject>>,
    cancel: CancellationToken,
}

impl PipelineScheduler {
    pub fn new(
        config: &ScenewatchConfig,
        source: Box<dyn FrameSource>,
        models: Vec<Box<dyn DetectionModel>>,
        publisher: EventPublisher,
        events: EventBus,
        cancel: CancellationToken,
    ) -> (Self, PipelineHandle) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (annotated_tx, annotated_rx) = watch::channel(None);
        let (tracks_tx, tracks_rx) = watch::channel(Vec::new());

        let scheduler = Self {
            source,
            models,
            estimator: DistanceEstimator::new(config.distance.focal_length),
            tracker: ObjectTracker::new(Duration::from_millis(config.tracker.eviction_window_ms)),
            publisher,
            mode: config.detection.mode,
            threshold: config.detection.confidence_threshold,
            enabled: true,
            tick_period: Duration::from_millis(config.pipeline.tick_period_ms),
            events,
            commands: command_rx,
            annotated_tx,
            tracks_tx,
            cancel,
        };
        let handle = PipelineHandle {
            commands: command_tx,
            annotated_rx,
            tracks_rx,
        };
        (scheduler, handle)
    }

    /// Run until cancelled. Skipped ticks are dropped rather than queued,
    /// so a slow cycle never causes overlapping cycles or a catch-up burst.
    pub async fn run(mut self) {
        if let Err(e) = self.source.open() {
            let _ = self.events.publish(PipelineEvent::SourceUnavailable {
                timestamp: SystemTime::now(),
            });
            warn!("Frame source open failed, starting disabled: {}", e);
            self.enabled = false;
        }

        for kind in [crate::detect::ModelKind::Face, crate::detect::ModelKind::Object] {
            if !self.models.iter().any(|m| m.kind() == kind) {
                let _ = self.events.publish(PipelineEvent::ModelUnavailable {
                    variant: kind.as_str().to_string(),
                });
            }
        }

        let mut ticker = tokio::time::interval(self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "Pipeline running ({}ms tick, mode {:?})",
            self.tick_period.as_millis(),
            self.mode
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                Some(command) = self.commands.recv() => self.handle_command(command),
                _ = ticker.tick() => self.run_cycle().await,
            }
        }

        self.source.release();
        info!("Pipeline stopped");
    }

    fn handle_command(&mut self, command: PipelineCommand) {
        match command {
            PipelineCommand::SetMode(mode) => {
                info!("Detection mode set to {:?}", mode);
                self.mode = mode;
            }
            PipelineCommand::SetThreshold(threshold) => {
                if (0.0..=1.0).contains(&threshold) {
                    info!("Confidence threshold set to {}", threshold);
                    self.threshold = threshold;
                } else {
                    warn!("Ignoring out-of-range confidence threshold {}", threshold);
                }
            }
            PipelineCommand::SetRecipientPolicy(policy) => {
                info!("Recipient policy set to {:?}", policy);
                self.publisher.set_policy(policy);
            }
            PipelineCommand::Enable => {
                if !self.source.is_open() {
                    if let Err(e) = self.source.open() {
                        warn!("Enable requested but source open failed: {}", e);
                        let _ = self.events.publish(PipelineEvent::SourceUnavailable {
                            timestamp: SystemTime::now(),
                        });
                        return;
                    }
                }
                self.enabled = true;
                let _ = self.events.publish(PipelineEvent::EnabledChanged {
                    enabled: true,
                    timestamp: SystemTime::now(),
                });
            }
            PipelineCommand::Disable => {
                self.enabled = false;
                let _ = self.events.publish(PipelineEvent::EnabledChanged {
                    enabled: false,
                    timestamp: SystemTime::now(),
                });
            }
            PipelineCommand::Shutdown => {
                let _ = self.events.publish(PipelineEvent::ShutdownRequested {
                    timestamp: SystemTime::now(),
                    reason: "command".to_string(),
                });
                self.cancel.cancel();
            }
        }
    }

    /// One capture/detect/estimate/track/publish pass. Any stage failure
    /// degrades to skipping the affected work for this cycle; the loop
    /// itself never dies.
    async fn run_cycle(&mut self) {
        if !self.enabled {
            trace!("Cycle skipped: pipeline disabled");
            return;
        }

        let frame = match self.source.read() {
            Ok(FrameRead::Frame(frame)) => frame,
            Ok(FrameRead::Unavailable) => {
                let _ = self.events.publish(PipelineEvent::CycleSkipped {
                    reason: "frame source produced no frame".to_string(),
                });
                return;
            }
            Err(e) => {
                let _ = self.events.publish(PipelineEvent::CycleError {
                    component: "source".to_string(),
                    error: e.to_string(),
                });
                return;
            }
        };

        let mut detections = Vec::new();
        for model in &self.models {
            if !self.mode.includes(model.kind()) {
                continue;
            }
            match model.infer(&frame, self.threshold) {
                Ok(found) => detections.extend(found),
                Err(e) => {
                    // Degrade to the remaining variants for this cycle
                    let _ = self.events.publish(PipelineEvent::CycleError {
                        component: model.kind().as_str().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let detections = self.estimator.annotate(detections);
        let now = Instant::now();
        self.tracker.update(&detections, now);
        let detection_count = detections.len();
        let frame_id = frame.id;

        // Each event carries this cycle's detections only; the tracker
        // registry feeds the watch channel for display readers, never the
        // wire
        match self.publisher.maybe_publish(&detections, now).await {
            Ok(0) => {}
            Ok(recipient_count) => {
                let _ = self.events.publish(PipelineEvent::DetectionsPublished {
                    detection_count,
                    recipient_count,
                    timestamp: SystemTime::now(),
                });
            }
            Err(e) => {
                let _ = self.events.publish(PipelineEvent::CycleError {
                    component: "publisher".to_string(),
                    error: e.to_string(),
                });
            }
        }

        // Latest-value handoffs; nobody listening is fine
        let _ = self.tracks_tx.send(self.tracker.snapshot());
        let _ = self.annotated_tx.send(Some(AnnotatedFrame { frame, detections }));

        debug!(
            "Cycle complete: frame {} with {} detections, {} live tracks",
            frame_id,
            detection_count,
            self.tracker.len()
        );
        let _ = self.events.publish(PipelineEvent::CycleCompleted {
            frame_id,
            detection_count,
            timestamp: SystemTime::now(),
        });
    }
}
