//! Message frames inside a fetch response.

use bytes::{BufMut, Bytes, BytesMut};

use super::LENGTH_PREFIX_SIZE;

pub const CHECKSUM_SIZE: usize = 4;

/// A message decoded from a fetch response.
///
/// The payload is a slice of the response buffer it was decoded from, so
/// holding on to a message keeps that buffer alive rather than aliasing a
/// buffer that gets reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    checksum: [u8; CHECKSUM_SIZE],
    payload: Bytes,
    total_length: u32,
    offset: u64,
}

impl Message {
    /// Stored checksum as a big-endian integer.
    pub fn checksum(&self) -> u32 {
        u32::from_be_bytes(self.checksum)
    }

    pub fn checksum_bytes(&self) -> &[u8; CHECKSUM_SIZE] {
        &self.checksum
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// The stored length field: checksum plus payload.
    pub fn total_length(&self) -> u32 {
        self.total_length
    }

    /// Bytes this message occupies on the wire, length prefix included.
    pub fn frame_len(&self) -> u64 {
        LENGTH_PREFIX_SIZE as u64 + u64::from(self.total_length)
    }

    /// Absolute position of this message in the partition log.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether the stored checksum matches the CRC32 of the payload.
    pub fn is_valid(&self) -> bool {
        self.checksum() == checksum(&self.payload)
    }

    /// Re-encode this message as a wire frame.
    pub fn encode(&self) -> Bytes {
        encode_message_with_checksum(self.checksum(), &self.payload)
    }

    pub(crate) fn at_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

/// CRC32 of a payload, as stored in the checksum field.
pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Decode the message frame at the start of `buffer`.
///
/// Returns `None` when the buffer is shorter than the declared length or the
/// declared length cannot hold a checksum. Trailing bytes after the frame are
/// ignored. The returned message has offset 0; the consumer assigns the
/// absolute offset.
pub fn decode(buffer: &Bytes) -> Option<Message> {
    let prefix: [u8; LENGTH_PREFIX_SIZE] = buffer.get(..LENGTH_PREFIX_SIZE)?.try_into().ok()?;
    let total_length = u32::from_be_bytes(prefix);
    let length = usize::try_from(total_length).ok()?;
    if length < CHECKSUM_SIZE {
        return None;
    }

    let end = LENGTH_PREFIX_SIZE.checked_add(length)?;
    if buffer.len() < end {
        return None;
    }

    let payload_start = LENGTH_PREFIX_SIZE + CHECKSUM_SIZE;
    let checksum: [u8; CHECKSUM_SIZE] = buffer[LENGTH_PREFIX_SIZE..payload_start].try_into().ok()?;

    Some(Message {
        checksum,
        payload: buffer.slice(payload_start..end),
        total_length,
        offset: 0,
    })
}

/// Encode a payload as a message frame with its CRC32 checksum.
pub fn encode_message(payload: &[u8]) -> Bytes {
    encode_message_with_checksum(checksum(payload), payload)
}

/// Encode a payload as a message frame with an explicit checksum.
pub fn encode_message_with_checksum(checksum: u32, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + CHECKSUM_SIZE + payload.len());
    buf.put_u32((CHECKSUM_SIZE + payload.len()) as u32);
    buf.put_u32(checksum);
    buf.put_slice(payload);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_recovers_checksum_and_payload() {
        let frame = encode_message_with_checksum(0xdeadbeef, b"hello broker");

        let msg = decode(&frame).unwrap();

        assert_eq!(msg.checksum(), 0xdeadbeef);
        assert_eq!(msg.checksum_bytes(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(msg.payload().as_ref(), b"hello broker");
        assert_eq!(msg.total_length(), 4 + 12);
        assert_eq!(msg.frame_len(), 4 + 4 + 12);
        assert_eq!(msg.offset(), 0);
    }

    #[test]
    fn test_decode_layout_is_big_endian() {
        let frame = Bytes::from_static(&[0, 0, 0, 6, 1, 2, 3, 4, b'o', b'k']);

        let msg = decode(&frame).unwrap();

        assert_eq!(msg.total_length(), 6);
        assert_eq!(msg.checksum(), 0x01020304);
        assert_eq!(msg.payload().as_ref(), b"ok");
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut buf = BytesMut::new();
        buf.put_slice(&encode_message(b"first"));
        buf.put_slice(&encode_message(b"second"));
        let buf = buf.freeze();

        let msg = decode(&buf).unwrap();
        assert_eq!(msg.payload().as_ref(), b"first");
    }

    #[test]
    fn test_decode_truncated_frame() {
        let frame = encode_message(b"truncated payload");
        let short = frame.slice(..frame.len() - 1);

        assert!(decode(&short).is_none());
    }

    #[test]
    fn test_decode_shorter_than_length_prefix() {
        assert!(decode(&Bytes::new()).is_none());
        assert!(decode(&Bytes::from_static(&[0, 0, 0])).is_none());
    }

    #[test]
    fn test_decode_length_without_room_for_checksum() {
        let frame = Bytes::from_static(&[0, 0, 0, 2, 0xaa, 0xbb]);
        assert!(decode(&frame).is_none());
    }

    #[test]
    fn test_empty_payload() {
        let frame = encode_message(b"");
        let msg = decode(&frame).unwrap();

        assert_eq!(msg.total_length(), 4);
        assert!(msg.payload().is_empty());
        assert!(msg.is_valid());
    }

    #[test]
    fn test_checksum_validation() {
        let good = decode(&encode_message(b"payload")).unwrap();
        assert!(good.is_valid());

        let bad = decode(&encode_message_with_checksum(1, b"payload")).unwrap();
        assert!(!bad.is_valid());
    }

    #[test]
    fn test_reencode_matches_received_frame() {
        let frame = encode_message(b"same bytes back");
        let msg = decode(&frame).unwrap().at_offset(42);

        assert_eq!(msg.offset(), 42);
        assert_eq!(msg.encode(), frame);
    }
}
