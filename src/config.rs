use crate::detect::DetectionMode;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScenewatchConfig {
    pub source: SourceConfig,
    pub detection: DetectionConfig,
    pub distance: DistanceConfig,
    pub tracker: TrackerConfig,
    pub publisher: PublisherConfig,
    pub pipeline: PipelineConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    /// Frame source device index (e.g., 0 for the first camera)
    #[serde(default = "default_source_index")]
    pub index: u32,

    /// Capture resolution (width, height)
    #[serde(default = "default_source_resolution")]
    pub resolution: (u32, u32),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectionConfig {
    /// Which model variants run each cycle
    #[serde(default = "default_detection_mode")]
    pub mode: DetectionMode,

    /// Minimum confidence; detections at or below this value are discarded
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DistanceConfig {
    /// Focal length constant in pixels for the distance formula
    #[serde(default = "default_focal_length")]
    pub focal_length: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TrackerConfig {
    /// How long an unseen entry survives before eviction, in milliseconds
    #[serde(default = "default_eviction_window_ms")]
    pub eviction_window_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PublisherConfig {
    /// Minimum interval between publishes, in milliseconds
    #[serde(default = "default_publish_interval_ms")]
    pub publish_interval_ms: u64,

    /// Topic identifier stamped on outbound envelopes
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Specific subscriber to address; `None` broadcasts to all known
    /// subscribers
    pub recipient: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineConfig {
    /// Scheduler tick period in milliseconds
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    /// Grace period granted to an in-flight cycle on shutdown, in
    /// milliseconds
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Status event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl ScenewatchConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("scenewatch.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("source.index", default_source_index() as i64)?
            .set_default(
                "source.resolution",
                vec![
                    default_source_resolution().0 as i64,
                    default_source_resolution().1 as i64,
                ],
            )?
            .set_default("detection.mode", "all")?
            .set_default(
                "detection.confidence_threshold",
                default_confidence_threshold() as f64,
            )?
            .set_default("distance.focal_length", default_focal_length())?
            .set_default(
                "tracker.eviction_window_ms",
                default_eviction_window_ms() as i64,
            )?
            .set_default(
                "publisher.publish_interval_ms",
                default_publish_interval_ms() as i64,
            )?
            .set_default("publisher.topic", default_topic())?
            .set_default("pipeline.tick_period_ms", default_tick_period_ms() as i64)?
            .set_default(
                "pipeline.shutdown_grace_ms",
                default_shutdown_grace_ms() as i64,
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with SCENEWATCH_ prefix
            .add_source(Environment::with_prefix("SCENEWATCH").separator("_"))
            .build()?;

        let config: ScenewatchConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.resolution.0 == 0 || self.source.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Source resolution must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            return Err(ConfigError::Message(
                "Confidence threshold must be within [0, 1]".to_string(),
            ));
        }

        if self.distance.focal_length <= 0.0 {
            return Err(ConfigError::Message(
                "Focal length must be greater than 0".to_string(),
            ));
        }

        if self.tracker.eviction_window_ms == 0 {
            return Err(ConfigError::Message(
                "Tracker eviction window must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.tick_period_ms == 0 {
            return Err(ConfigError::Message(
                "Pipeline tick period must be greater than 0".to_string(),
            ));
        }

        if self.publisher.topic.is_empty() {
            return Err(ConfigError::Message(
                "Publisher topic must not be empty".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ScenewatchConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig {
                index: default_source_index(),
                resolution: default_source_resolution(),
            },
            detection: DetectionConfig {
                mode: default_detection_mode(),
                confidence_threshold: default_confidence_threshold(),
            },
            distance: DistanceConfig {
                focal_length: default_focal_length(),
            },
            tracker: TrackerConfig {
                eviction_window_ms: default_eviction_window_ms(),
            },
            publisher: PublisherConfig {
                publish_interval_ms: default_publish_interval_ms(),
                topic: default_topic(),
                recipient: None,
            },
            pipeline: PipelineConfig {
                tick_period_ms: default_tick_period_ms(),
                shutdown_grace_ms: default_shutdown_grace_ms(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_source_index() -> u32 {
    0
}
fn default_source_resolution() -> (u32, u32) {
    (640, 480)
}

fn default_detection_mode() -> DetectionMode {
    DetectionMode::All
}
fn default_confidence_threshold() -> f32 {
    0.5
}

fn default_focal_length() -> f64 {
    615.0
}

fn default_eviction_window_ms() -> u64 {
    2000
}

fn default_publish_interval_ms() -> u64 {
    500
}
fn default_topic() -> String {
    "vision-detection".to_string()
}

fn default_tick_period_ms() -> u64 {
    50
}
fn default_shutdown_grace_ms() -> u64 {
    250
}

fn default_event_bus_capacity() -> usize {
    100
}
