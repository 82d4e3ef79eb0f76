use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

use scenewatch::protocol::DETECTION_TOPIC;
use scenewatch::{DetectionConsumer, Envelope};

/// Standalone detection consumer. Reads one message body per line from
/// stdin (JSON detection events, legacy DETECTION: lines, or PING), keeps
/// running aggregates, and writes ACK/PING_RESPONSE replies to stdout.
#[derive(Parser, Debug)]
#[command(name = "monitor")]
#[command(about = "Consume and aggregate detection events from stdin")]
#[command(version)]
struct Args {
    /// Consumer name used in logs and as the reply identity
    #[arg(short, long, default_value = "monitor", help = "Consumer name")]
    name: String,

    /// Enable debug logging
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    info!("Starting monitor consumer '{}'", args.name);

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

    let consumer = DetectionConsumer::new(&args.name).with_replies(reply_tx);
    let stats = consumer.stats();
    let consumer_task = tokio::spawn(consumer.run(inbox_rx));

    let reply_task = tokio::spawn(async move {
        while let Some(reply) = reply_rx.recv().await {
            println!("{}", reply);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let envelope = Envelope {
            topic: DETECTION_TOPIC.to_string(),
            sender: "stdin".to_string(),
            body: line,
        };
        if inbox_tx.send(envelope).is_err() {
            break;
        }
    }

    drop(inbox_tx);
    consumer_task.await?;
    reply_task.await?;

    let stats = stats.read();
    info!(
        "Received {} events with {} detections across {} categories ({} malformed dropped)",
        stats.events_received,
        stats.detections_received,
        stats.category_count(),
        stats.malformed_dropped
    );
    for (category, entry) in &stats.per_category {
        info!(
            "  {}: {} seen, last at {:.1}cm (confidence {:.2})",
            category, entry.count, entry.latest_distance, entry.latest_confidence
        );
    }

    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let log_level = if args.debug {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scenewatch={}", log_level)));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().compact().with_target(false))
        .with(env_filter)
        .init();

    Ok(())
}
