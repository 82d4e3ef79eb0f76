use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use scenewatch::{
    ChannelTransport, DetectionConsumer, DetectionModel, EventBus, EventPublisher, FaceModel,
    FixedOutputBackend, MockFrameSource, ObjectModel, PipelineScheduler, RecipientPolicy,
    ReplyMonitor, ScenewatchConfig, StaticDirectory,
};

#[derive(Parser, Debug)]
#[command(name = "scenewatch")]
#[command(about = "Real-time perception pipeline with detection tracking and event publishing")]
#[command(version)]
#[command(long_about = "Captures frames from a source on a fixed tick, runs face and object \
detection over them, estimates real-world distances from pixel widths, tracks objects across \
brief detection gaps, and publishes throttled detection events to subscribers.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "scenewatch.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the pipeline")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - build the pipeline but don't start it
    #[arg(long, help = "Perform dry run - build pipeline components but don't start them")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting scenewatch v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match ScenewatchConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate()?;

    // Demo wiring: a synthetic frame source and canned model backends.
    // Real capture devices implement FrameSource; real inference engines
    // implement ModelBackend.
    let source = MockFrameSource::new(config.source.index, config.source.resolution.0, config.source.resolution.1);
    let face_backend = FixedOutputBackend::new(vec![vec![0.0, 1.0, 0.92, 0.3, 0.25, 0.55, 0.6]]);
    let object_backend = FixedOutputBackend::empty();
    let models: Vec<Box<dyn DetectionModel>> = vec![
        Box::new(FaceModel::new(Box::new(face_backend))),
        Box::new(ObjectModel::new(Box::new(object_backend))),
    ];

    let consumer_name = "monitor";
    let directory = Arc::new(StaticDirectory::new(vec![consumer_name.to_string()]));
    let (envelope_tx, mut envelope_rx) = mpsc::unbounded_channel();
    let transport = Arc::new(ChannelTransport::new(envelope_tx));

    let publisher = EventPublisher::new(
        "scenewatch",
        &config.publisher.topic,
        RecipientPolicy::from_config(config.publisher.recipient.as_deref()),
        Duration::from_millis(config.publisher.publish_interval_ms),
        directory,
        transport,
    );

    let events = EventBus::new(config.system.event_bus_capacity);
    let cancel = CancellationToken::new();

    let (scheduler, _handle) = PipelineScheduler::new(
        &config,
        Box::new(source),
        models,
        publisher,
        events,
        cancel.clone(),
    );

    if args.dry_run {
        info!("Dry run mode - pipeline built but not started");
        println!("✓ Dry run completed successfully - pipeline components built");
        return Ok(());
    }

    // In-process consumer; envelopes addressed to it are routed from the
    // transport channel to its inbox, and its ACK/ping replies come back
    // on a reply channel
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
    let consumer = DetectionConsumer::new(consumer_name).with_replies(reply_tx);
    let consumer_task = tokio::spawn(consumer.run(inbox_rx));
    let reply_task = tokio::spawn(async move {
        let mut monitor = ReplyMonitor::new();
        while let Some(reply) = reply_rx.recv().await {
            monitor.record(&reply);
        }
        info!(
            "Subscribers acknowledged {} detections across {} replies",
            monitor.acked_detections(),
            monitor.ack_count()
        );
    });
    let router_task = tokio::spawn(async move {
        while let Some((recipient, envelope)) = envelope_rx.recv().await {
            if recipient == consumer_name {
                if inbox_tx.send(envelope).is_err() {
                    break;
                }
            } else {
                warn!("No route for recipient {}", recipient);
            }
        }
    });

    let pipeline_task = tokio::spawn(scheduler.run());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    cancel.cancel();

    let grace = Duration::from_millis(config.pipeline.shutdown_grace_ms);
    if tokio::time::timeout(grace, pipeline_task).await.is_err() {
        warn!("Pipeline did not stop within {}ms grace period", grace.as_millis());
    }
    router_task.abort();
    consumer_task.abort();
    reply_task.abort();

    info!("scenewatch exited");
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scenewatch={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() {
    println!("# Scenewatch Configuration File");
    println!("# This is the default configuration with all available options");
    println!();

    let default_config = r#"[source]
# Frame source device index (e.g., 0 for the first camera)
index = 0
# Capture resolution (width, height)
resolution = [640, 480]

[detection]
# Which model variants run each cycle: "all", "faces-only", "objects-only"
mode = "all"
# Minimum confidence; detections at or below this value are discarded
confidence_threshold = 0.5

[distance]
# Focal length constant in pixels for the distance formula
focal_length = 615.0

[tracker]
# How long an unseen object survives before eviction, in milliseconds
eviction_window_ms = 2000

[publisher]
# Minimum interval between publishes, in milliseconds
publish_interval_ms = 500
# Topic identifier stamped on outbound envelopes
topic = "vision-detection"
# Specific subscriber to address; omit to broadcast to all known subscribers
# recipient = "monitor"

[pipeline]
# Scheduler tick period in milliseconds
tick_period_ms = 50
# Grace period granted to an in-flight cycle on shutdown, in milliseconds
shutdown_grace_ms = 250

[system]
# Status event bus capacity
event_bus_capacity = 100
"#;

    println!("{}", default_config);
}
