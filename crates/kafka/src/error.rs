use std::fmt;
use thiserror::Error;

/// Error codes a broker places in the first two bytes of a response.
///
/// Zero means success and is never represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Unknown,
    OffsetOutOfRange,
    InvalidMessage,
    WrongPartition,
    InvalidFetchSize,
    Other(i16),
}

impl ErrorCode {
    /// Map a wire error code, returning `None` for the success code.
    pub fn from_wire(code: i16) -> Option<Self> {
        match code {
            0 => None,
            -1 => Some(Self::Unknown),
            1 => Some(Self::OffsetOutOfRange),
            2 => Some(Self::InvalidMessage),
            3 => Some(Self::WrongPartition),
            4 => Some(Self::InvalidFetchSize),
            other => Some(Self::Other(other)),
        }
    }

    pub fn as_wire(self) -> i16 {
        match self {
            Self::Unknown => -1,
            Self::OffsetOutOfRange => 1,
            Self::InvalidMessage => 2,
            Self::WrongPartition => 3,
            Self::InvalidFetchSize => 4,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown error (-1)"),
            Self::OffsetOutOfRange => write!(f, "offset out of range (1)"),
            Self::InvalidMessage => write!(f, "invalid message (2)"),
            Self::WrongPartition => write!(f, "wrong partition (3)"),
            Self::InvalidFetchSize => write!(f, "invalid fetch size (4)"),
            Self::Other(code) => write!(f, "error code {code}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to connect to broker {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The broker closed the connection. Continuous consumers treat this as
    /// "no data this poll" rather than a failure.
    #[error("End of stream")]
    EndOfStream,

    #[error("Error decoding message at offset {offset}")]
    Decode { offset: u64 },

    #[error("Checksum mismatch for message at offset {offset}: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        offset: u64,
        stored: u32,
        computed: u32,
    },

    #[error("Broker error: {0}")]
    Broker(ErrorCode),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A request field does not fit its wire encoding.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The channel receiver went away before this message could be handed
    /// over. The cursor stays before it.
    #[error("Receiver closed before message at offset {offset} was delivered")]
    ReceiverClosed { offset: u64 },

    #[error("Polling task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
