use crate::error::{Error, ErrorCode, Result};
use crate::proto::{self, Response, TimeMarker, LENGTH_PREFIX_SIZE};
use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Port used when the hostname does not carry one.
pub const DEFAULT_PORT: u16 = 9092;

/// A single topic-partition on a single broker.
#[derive(Debug, Clone)]
pub struct Broker {
    hostname: String,
    topic: String,
    partition: i32,
}

impl Broker {
    /// `hostname` is a host and optionally a port, delimited by ':'.
    pub fn new(hostname: impl Into<String>, topic: impl Into<String>, partition: i32) -> Self {
        Self {
            hostname: hostname.into(),
            topic: topic.into(),
            partition,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    /// Socket address to dial, with `DEFAULT_PORT` filled in when missing.
    pub fn address(&self) -> String {
        let host = self.hostname.as_str();
        if let Some(rest) = host.strip_prefix('[') {
            return if rest.contains("]:") {
                host.to_string()
            } else {
                format!("{host}:{DEFAULT_PORT}")
            };
        }
        match host.rsplit_once(':') {
            Some((name, port)) if !name.contains(':') && port.parse::<u16>().is_ok() => {
                host.to_string()
            }
            // Bare IPv6 literal
            Some(_) => format!("[{host}]:{DEFAULT_PORT}"),
            None => format!("{host}:{DEFAULT_PORT}"),
        }
    }

    /// Open a new connection. Each call dials the broker again.
    pub async fn connect(&self) -> Result<BrokerConnection> {
        let addr = self.address();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| Error::Connect {
                addr: addr.clone(),
                source,
            })?;
        debug!(
            "Connected to broker {addr} for {}:{}",
            self.topic, self.partition
        );
        Ok(BrokerConnection::new(stream))
    }

    pub fn encode_fetch_request(&self, offset: u64, max_fetch_size: u32) -> Result<Bytes> {
        proto::encode_fetch_request(&self.topic, self.partition, offset, max_fetch_size)
    }

    pub fn encode_offset_request(
        &self,
        time: TimeMarker,
        max_num_offsets: u32,
    ) -> Result<Bytes> {
        proto::encode_offset_request(&self.topic, self.partition, time, max_num_offsets)
    }
}

/// An open connection to a broker.
///
/// Generic over the stream so the exchange can run over any duplex byte
/// stream. The connection closes when dropped.
#[derive(Debug)]
pub struct BrokerConnection<S = TcpStream> {
    stream: S,
}

impl<S> BrokerConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Write one encoded request.
    pub async fn send(&mut self, request: &[u8]) -> Result<()> {
        self.stream.write_all(request).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read one length-prefixed response frame fully into memory.
    ///
    /// A non-zero error code is returned as [`Error::Broker`]. A stream that
    /// ends before or inside the frame is [`Error::EndOfStream`]. The buffer
    /// grows with the bytes actually received, not with the declared length.
    pub async fn read_response(&mut self) -> Result<Response> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        self.stream
            .read_exact(&mut prefix)
            .await
            .map_err(read_error)?;
        let length = u32::from_be_bytes(prefix);

        let mut frame = Vec::new();
        let read = (&mut self.stream)
            .take(u64::from(length))
            .read_to_end(&mut frame)
            .await
            .map_err(read_error)?;
        if read < length as usize {
            debug!("Stream closed after {read} of {length} response bytes");
            return Err(Error::EndOfStream);
        }

        let mut frame = Bytes::from(frame);
        if frame.remaining() < proto::response::ERROR_CODE_SIZE {
            return Err(Error::MalformedResponse(format!(
                "response frame of {length} bytes has no error code"
            )));
        }
        if let Some(code) = ErrorCode::from_wire(frame.get_i16()) {
            return Err(Error::Broker(code));
        }

        Ok(Response::new(length, frame))
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

fn read_error(err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::EndOfStream
    } else {
        Error::Io(err)
    }
}
