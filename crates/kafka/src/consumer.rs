use crate::broker::{Broker, BrokerConnection};
use crate::error::{Error, Result};
use crate::proto::response::NO_DATA_LENGTH;
use crate::proto::{
    self, Message, TimeMarker, LENGTH_PREFIX_SIZE, MAX_FETCH_OFFSET, MAX_TOPIC_LEN,
};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error};

/// Configuration for a single-partition consumer
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Broker host, optionally with a port ("host:port")
    pub hostname: String,
    /// Topic to consume from
    pub topic: String,
    /// Partition to consume from
    pub partition: i32,
    /// Offset to start consuming from
    pub offset: u64,
    /// Maximum size in bytes of one fetch response
    ///
    /// This must be at least as big as the biggest message in the topic.
    /// A message larger than this is never returned and the consumer stalls
    /// at its offset.
    pub max_fetch_size: u32,
    /// Verify each message's CRC32 checksum while decoding
    pub verify_checksums: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost:9092".to_string(),
            topic: "".to_string(),
            partition: 0,
            offset: 0,
            max_fetch_size: 1024 * 1024,
            verify_checksums: false,
        }
    }
}

impl ConsumerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hostname.trim().is_empty() {
            return Err(Error::InvalidConfig("hostname must not be empty".to_string()));
        }
        if self.topic.is_empty() {
            return Err(Error::InvalidConfig("topic must not be empty".to_string()));
        }
        if self.topic.len() > MAX_TOPIC_LEN {
            return Err(Error::InvalidConfig(format!(
                "topic name is {} bytes, the protocol allows at most {MAX_TOPIC_LEN}",
                self.topic.len()
            )));
        }
        if self.offset > MAX_FETCH_OFFSET {
            return Err(Error::InvalidConfig(format!(
                "offset {} is beyond the largest fetch offset {MAX_FETCH_OFFSET}",
                self.offset
            )));
        }
        Ok(())
    }
}

/// Position of a consumer in its partition log.
#[derive(Debug, Clone)]
pub(crate) struct Cursor {
    pub(crate) offset: u64,
    pub(crate) max_fetch_size: u32,
    pub(crate) verify_checksums: bool,
}

/// Consumer for one topic-partition on one broker.
///
/// Owns its offset cursor. Every consuming call takes `&mut self`, so one
/// instance never runs two consume loops at once.
#[derive(Debug)]
pub struct BrokerConsumer {
    pub(crate) broker: Broker,
    pub(crate) cursor: Cursor,
}

impl BrokerConsumer {
    /// Create a consumer starting at `offset`.
    ///
    /// `max_fetch_size` should be at least as big as the biggest message
    /// published to the topic.
    pub fn new(
        hostname: impl Into<String>,
        topic: impl Into<String>,
        partition: i32,
        offset: u64,
        max_fetch_size: u32,
    ) -> Self {
        Self {
            broker: Broker::new(hostname, topic, partition),
            cursor: Cursor {
                offset,
                max_fetch_size,
                verify_checksums: false,
            },
        }
    }

    /// Create a consumer with offset and max fetch size of zero, for offset
    /// queries.
    pub fn offset_consumer(hostname: impl Into<String>, topic: impl Into<String>, partition: i32) -> Self {
        Self::new(hostname, topic, partition, 0, 0)
    }

    pub fn from_config(config: ConsumerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            broker: Broker::new(config.hostname, config.topic, config.partition),
            cursor: Cursor {
                offset: config.offset,
                max_fetch_size: config.max_fetch_size,
                verify_checksums: config.verify_checksums,
            },
        })
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Next offset that will be requested.
    pub fn offset(&self) -> u64 {
        self.cursor.offset
    }

    /// Move the cursor explicitly. The only way the offset goes backwards.
    pub fn set_offset(&mut self, offset: u64) {
        self.cursor.offset = offset;
    }

    pub fn max_fetch_size(&self) -> u32 {
        self.cursor.max_fetch_size
    }

    pub fn set_max_fetch_size(&mut self, max_fetch_size: u32) {
        self.cursor.max_fetch_size = max_fetch_size;
    }

    pub fn set_verify_checksums(&mut self, verify: bool) {
        self.cursor.verify_checksums = verify;
    }

    /// Connect, run a single fetch pass, and close the connection.
    ///
    /// Returns the number of messages handed to `handler`.
    pub async fn consume<F>(&mut self, handler: F) -> Result<usize>
    where
        F: FnMut(Message),
    {
        let mut conn = self.broker.connect().await?;
        let result = self.consume_once(&mut conn, handler).await;
        if let Err(e) = &result {
            error!(
                "Fatal error consuming {}:{}: {e}",
                self.broker.topic(),
                self.broker.partition()
            );
        }
        result
    }

    /// Run one fetch pass over an open connection.
    ///
    /// The cursor advances only when every message in the response decoded.
    /// Messages handed to `handler` before a decode failure stay delivered.
    /// A cursor beyond [`MAX_FETCH_OFFSET`] fails with
    /// [`Error::InvalidRequest`] before anything is sent.
    pub async fn consume_once<S, F>(
        &mut self,
        conn: &mut BrokerConnection<S>,
        mut handler: F,
    ) -> Result<usize>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        F: FnMut(Message),
    {
        fetch(&self.broker, &mut self.cursor, conn, |m| {
            handler(m);
            true
        })
        .await
    }

    /// Get up to `max_num_offsets` valid offsets before `time`, newest first.
    pub async fn get_offsets(&self, time: TimeMarker, max_num_offsets: u32) -> Result<Vec<u64>> {
        let request = self.broker.encode_offset_request(time, max_num_offsets)?;
        let mut conn = self.broker.connect().await?;
        conn.send(&request).await?;
        let response = conn.read_response().await?;
        let offsets = proto::decode_offset_list(&response, max_num_offsets)?;
        debug!(
            "Broker returned {} offsets for {}:{} before {time:?}",
            offsets.len(),
            self.broker.topic(),
            self.broker.partition()
        );
        Ok(offsets)
    }
}

/// One request/response exchange followed by a decode pass over the payload.
///
/// `deliver` returns whether it took the message. A refused message ends the
/// pass with [`Error::ReceiverClosed`] and, like a decode failure, leaves the
/// cursor where the pass started.
pub(crate) async fn fetch<S, F>(
    broker: &Broker,
    cursor: &mut Cursor,
    conn: &mut BrokerConnection<S>,
    mut deliver: F,
) -> Result<usize>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnMut(Message) -> bool,
{
    let started = Instant::now();
    // Also bounds the cursor to i64::MAX, so the offset sums below cannot
    // overflow: `current` never exceeds a u32 frame length.
    let request = broker.encode_fetch_request(cursor.offset, cursor.max_fetch_size)?;
    conn.send(&request).await?;
    let response = conn.read_response().await?;

    if response.length <= NO_DATA_LENGTH {
        debug!("No new data for {}:{} at offset {}", broker.topic(), broker.partition(), cursor.offset);
        return Ok(0);
    }

    // `length` counts the two-byte error code that `payload` has already
    // dropped, so at least two payload bytes remain whenever the loop runs.
    let length = response.length as usize;
    let payload = response.payload;
    let mut current = 0usize;
    let mut count = 0usize;

    while current + LENGTH_PREFIX_SIZE <= length {
        let offset = cursor.offset + current as u64;
        let message = proto::decode(&payload.slice(current..))
            .ok_or(Error::Decode { offset })?
            .at_offset(offset);

        if cursor.verify_checksums && !message.is_valid() {
            return Err(Error::ChecksumMismatch {
                offset,
                stored: message.checksum(),
                computed: proto::checksum(message.payload()),
            });
        }

        current += message.frame_len() as usize;
        if !deliver(message) {
            return Err(Error::ReceiverClosed { offset });
        }
        count += 1;
    }

    cursor.offset += current as u64;
    debug!(
        "Fetched {count} messages from {}:{} in {:?}, next offset {}",
        broker.topic(),
        broker.partition(),
        started.elapsed(),
        cursor.offset
    );

    Ok(count)
}
