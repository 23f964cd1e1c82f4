//! Wire format of the 0.7 broker protocol.
//!
//! Every integer on the wire is big-endian.
//!
//! ```text
//! request:   [size: u32][type: i16][topic len: u16][topic][partition: i32][body]
//! response:  [size: u32][error code: i16][body]
//! message:   [length: u32][checksum: u32][payload]
//! ```
//!
//! `size` never counts its own four bytes. A message `length` covers the
//! checksum and the payload.

pub mod message;
pub mod request;
pub mod response;

pub use message::{checksum, decode, encode_message, encode_message_with_checksum, Message};
pub use request::{
    encode_fetch_request, encode_offset_request, RequestType, TimeMarker, MAX_FETCH_OFFSET,
    MAX_TOPIC_LEN,
};
pub use response::{decode_offset_list, Response};

/// Size of every length field preceding a frame.
pub const LENGTH_PREFIX_SIZE: usize = 4;
