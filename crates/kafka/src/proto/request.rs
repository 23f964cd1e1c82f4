//! Request encoding.

use bytes::{BufMut, Bytes, BytesMut};

use super::LENGTH_PREFIX_SIZE;
use crate::error::{Error, Result};

/// Longest topic name the two-byte length field can carry.
pub const MAX_TOPIC_LEN: usize = u16::MAX as usize;

/// Largest offset a fetch request can carry in its signed 64-bit field.
pub const MAX_FETCH_OFFSET: u64 = i64::MAX as u64;

/// Request types understood by the broker.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Fetch = 1,
    Offsets = 4,
}

impl RequestType {
    pub fn from_wire(v: i16) -> Option<Self> {
        match v {
            1 => Some(Self::Fetch),
            4 => Some(Self::Offsets),
            _ => None,
        }
    }
}

/// Point in time for an offset query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeMarker {
    /// The offset past the newest message.
    Latest,
    /// The oldest offset still retained.
    Earliest,
    /// Milliseconds since the Unix epoch.
    At(i64),
}

impl TimeMarker {
    pub const LATEST: i64 = -1;
    pub const EARLIEST: i64 = -2;

    pub fn as_wire(self) -> i64 {
        match self {
            Self::Latest => Self::LATEST,
            Self::Earliest => Self::EARLIEST,
            Self::At(ms) => ms,
        }
    }

    pub fn from_wire(v: i64) -> Self {
        match v {
            Self::LATEST => Self::Latest,
            Self::EARLIEST => Self::Earliest,
            ms => Self::At(ms),
        }
    }
}

/// Common header size after the length prefix: type, topic length, partition.
const HEADER_FIXED_SIZE: usize = 2 + 2 + 4;

/// Body size shared by fetch and offset requests: an i64 and a u32.
const BODY_SIZE: usize = 8 + 4;

fn encode_request(
    request_type: RequestType,
    topic: &str,
    partition: i32,
    position: i64,
    limit: u32,
) -> Result<Bytes> {
    let topic_len = u16::try_from(topic.len()).map_err(|_| {
        Error::InvalidRequest(format!(
            "topic name is {} bytes, the protocol allows at most {MAX_TOPIC_LEN}",
            topic.len()
        ))
    })?;
    let size = HEADER_FIXED_SIZE + topic.len() + BODY_SIZE;
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + size);

    // Bounded by the topic check above
    buf.put_u32(size as u32);
    buf.put_i16(request_type as i16);
    buf.put_u16(topic_len);
    buf.put_slice(topic.as_bytes());
    buf.put_i32(partition);
    buf.put_i64(position);
    buf.put_u32(limit);

    Ok(buf.freeze())
}

/// Encode a fetch request for messages starting at `offset`.
///
/// `max_fetch_size` caps the response payload. It is not validated; a value
/// smaller than the next message makes the broker return no data. Offsets
/// above [`MAX_FETCH_OFFSET`] and topics longer than [`MAX_TOPIC_LEN`] are
/// rejected with [`Error::InvalidRequest`].
pub fn encode_fetch_request(
    topic: &str,
    partition: i32,
    offset: u64,
    max_fetch_size: u32,
) -> Result<Bytes> {
    let position = i64::try_from(offset).map_err(|_| {
        Error::InvalidRequest(format!(
            "offset {offset} is beyond the largest fetch offset {MAX_FETCH_OFFSET}"
        ))
    })?;
    encode_request(RequestType::Fetch, topic, partition, position, max_fetch_size)
}

/// Encode a request for up to `max_num_offsets` valid offsets before `time`.
pub fn encode_offset_request(
    topic: &str,
    partition: i32,
    time: TimeMarker,
    max_num_offsets: u32,
) -> Result<Bytes> {
    encode_request(
        RequestType::Offsets,
        topic,
        partition,
        time.as_wire(),
        max_num_offsets,
    )
}
