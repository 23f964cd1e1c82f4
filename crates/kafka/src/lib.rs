//! Consumer for the length-prefixed binary protocol of 0.7-era Kafka brokers.
//!
//! Features:
//!
//! - Wire codec: fetch and offset requests, message frames, offset lists
//! - Single-pass consumption with an offset cursor that only moves forward
//! - Continuous polling with graceful shutdown, delivering to a callback or a channel
//! - Offset queries by timestamp, or for the earliest or latest offset
//!
//! Consumption is single-broker and single-partition. There is no producer
//! path, compression, or cluster metadata.

/// Broker address and connection
///
/// Opens the TCP connection and performs one request/response exchange at a time.
pub mod broker;

/// Consumer with an offset cursor
///
/// Single fetch passes and offset queries.
pub mod consumer;
pub mod error;
pub mod poll;
pub mod proto;

// Re-export main types for easy access
pub use broker::{Broker, BrokerConnection, DEFAULT_PORT};
pub use consumer::{BrokerConsumer, ConsumerConfig};
pub use error::{Error, ErrorCode, Result};
pub use poll::PollSummary;
pub use proto::{Message, TimeMarker};
