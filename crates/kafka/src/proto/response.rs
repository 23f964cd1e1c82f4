//! Response frames and the offset list body.

use bytes::{Buf, Bytes};

use crate::error::{Error, Result};

/// Size of the error code at the start of every response.
pub const ERROR_CODE_SIZE: usize = 2;

/// A fetch response this short carries no messages, only the error code.
pub const NO_DATA_LENGTH: u32 = ERROR_CODE_SIZE as u32;

/// An offset response this short carries no offsets.
pub const NO_OFFSETS_LENGTH: u32 = 4;

/// One response frame read from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Declared frame size, error code included.
    pub length: u32,
    /// Frame body after the error code.
    pub payload: Bytes,
}

impl Response {
    pub fn new(length: u32, payload: Bytes) -> Self {
        Self { length, payload }
    }
}

/// Decode the body of an offset response: `[count: u32][count x offset: u64]`.
///
/// Collects at most `min(count, max_num_offsets)` offsets and stops early if
/// the buffer runs out. A response of `NO_OFFSETS_LENGTH` bytes or fewer is an
/// empty list.
pub fn decode_offset_list(response: &Response, max_num_offsets: u32) -> Result<Vec<u64>> {
    if response.length <= NO_OFFSETS_LENGTH {
        return Ok(Vec::new());
    }

    let mut payload = response.payload.clone();
    if payload.remaining() < 4 {
        return Err(Error::MalformedResponse(format!(
            "offset response of {} bytes has no room for a count",
            response.length
        )));
    }

    let count = payload.get_u32();
    let wanted = count.min(max_num_offsets) as usize;
    let mut offsets = Vec::with_capacity(wanted.min(payload.remaining() / 8));
    while offsets.len() < wanted && payload.remaining() >= 8 {
        offsets.push(payload.get_u64());
    }

    Ok(offsets)
}
