//! ktail Library
//!
//! Command-line configuration for consuming a single partition of a 0.7
//! Kafka broker. The protocol client lives in the `ktail_kafka` crate,
//! re-exported here as [`kafka`].
//!
//! # CLI Usage
//!
//! ```bash
//! # One fetch pass from offset 0
//! ktail consume --broker localhost:9092 --topic events
//!
//! # Follow the partition until Ctrl-C
//! ktail tail --broker localhost:9092 --topic events --poll-interval 500ms
//!
//! # Latest offset
//! ktail offsets --broker localhost:9092 --topic events --time latest --max 1
//! ```

use clap::Parser;
use std::time::Duration;

pub mod config;

pub use ktail_kafka as kafka;

/// Connection and cursor options shared by every subcommand.
#[derive(Parser, Debug, Clone)]
pub struct Config {
    /// Broker host, optionally with a port
    #[arg(long, default_value = "localhost:9092", env = "KTAIL_BROKER")]
    pub broker: String,

    /// Topic to consume from
    #[arg(long, env = "KTAIL_TOPIC")]
    pub topic: String,

    /// Partition to consume from
    #[arg(long, default_value_t = 0)]
    pub partition: i32,

    /// Offset to start consuming from
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// Maximum bytes per fetch; must be at least the size of the largest message
    #[arg(long, default_value_t = 1024 * 1024)]
    pub max_fetch_size: u32,

    /// Delay between polls ("500ms", "2s", "1m"; plain numbers are milliseconds)
    #[arg(long, default_value = "1s", value_parser = config::parse_poll_interval)]
    pub poll_interval: Duration,

    /// Verify the CRC32 checksum of every message
    #[arg(long)]
    pub verify_checksums: bool,
}

impl From<&Config> for kafka::ConsumerConfig {
    fn from(config: &Config) -> Self {
        Self {
            hostname: config.broker.clone(),
            topic: config.topic.clone(),
            partition: config.partition,
            offset: config.offset,
            max_fetch_size: config.max_fetch_size,
            verify_checksums: config.verify_checksums,
        }
    }
}
