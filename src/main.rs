//! Command-line interface for ktail
//!
//! # Usage Examples
//!
//! ```bash
//! # Single fetch pass starting at offset 0
//! ktail consume --broker localhost:9092 --topic events
//!
//! # Follow a partition until Ctrl-C, polling every 500ms
//! ktail tail --broker localhost:9092 --topic events --offset 1024 \
//!   --poll-interval 500ms
//!
//! # Up to 5 offsets before a point in time
//! ktail offsets --broker localhost:9092 --topic events \
//!   --time 2024-01-01T00:00:00Z --max 5
//! ```
//!
//! Messages are written to stdout as `<offset>\t<payload>`, with the payload
//! decoded as lossy UTF-8. Logging goes to stderr and is controlled by
//! `RUST_LOG`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ktail::config::parse_time_marker;
use ktail::kafka::{BrokerConsumer, ConsumerConfig, Message, TimeMarker};
use ktail::Config;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ktail")]
#[command(about = "Consume a partition of a 0.7 Kafka broker")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single fetch pass and print the messages it returns
    Consume {
        #[command(flatten)]
        config: Config,
    },

    /// Poll the partition continuously until interrupted
    Tail {
        #[command(flatten)]
        config: Config,
    },

    /// List valid offsets before a point in time, newest first
    Offsets {
        #[command(flatten)]
        config: Config,

        /// "latest", "earliest", milliseconds since the epoch, or an RFC 3339 timestamp
        #[arg(long, default_value = "latest", value_parser = parse_time_marker)]
        time: TimeMarker,

        /// Maximum number of offsets to return
        #[arg(long, default_value_t = 1)]
        max: u32,
    },
}

fn print_message(message: Message) {
    println!(
        "{}\t{}",
        message.offset(),
        String::from_utf8_lossy(message.payload())
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Consume { config } => {
            let mut consumer = BrokerConsumer::from_config(ConsumerConfig::from(&config))
                .context("Invalid consumer configuration")?;
            let count = consumer
                .consume(print_message)
                .await
                .with_context(|| format!("Failed to consume from {}", config.topic))?;
            info!(
                "Consumed {count} messages from {}:{}, next offset {}",
                config.topic,
                config.partition,
                consumer.offset()
            );
        }
        Commands::Tail { config } => {
            let mut consumer = BrokerConsumer::from_config(ConsumerConfig::from(&config))
                .context("Invalid consumer configuration")?;
            let quit = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl-C, stopping: {e}");
                }
            };
            let summary = consumer
                .consume_until_quit(config.poll_interval, quit, print_message)
                .await
                .with_context(|| format!("Failed to tail {}", config.topic))?;
            info!(
                "Consumed {} messages in {} polls ({} failed), next offset {}",
                summary.messages,
                summary.polls,
                summary.failed_polls,
                consumer.offset()
            );
        }
        Commands::Offsets { config, time, max } => {
            let consumer =
                BrokerConsumer::offset_consumer(&config.broker, &config.topic, config.partition);
            let offsets = consumer
                .get_offsets(time, max)
                .await
                .with_context(|| format!("Failed to query offsets for {}", config.topic))?;
            for offset in offsets {
                println!("{offset}");
            }
        }
    }

    Ok(())
}
