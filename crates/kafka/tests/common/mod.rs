//! In-process broker that answers requests from a script.

#![allow(dead_code)]

use bytes::{BufMut, Bytes, BytesMut};
use ktail_kafka::proto::encode_message;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// What the broker does with the next request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Write this response frame, length prefix included.
    Frame(Bytes),
    /// Close the connection without answering.
    Close,
    /// Shut down the write half without answering. Later requests on the
    /// connection are still read and recorded, and each one sees end of
    /// stream.
    EndOfStream,
}

/// A request as the broker saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub request_type: i16,
    pub topic: String,
    pub partition: i32,
    /// Offset for a fetch, time marker for an offset request.
    pub position: i64,
    /// Max fetch size or max number of offsets.
    pub limit: u32,
}

impl RecordedRequest {
    fn parse(body: &[u8]) -> Self {
        let topic_len = u16::from_be_bytes([body[2], body[3]]) as usize;
        let rest = &body[4 + topic_len..];
        Self {
            request_type: i16::from_be_bytes([body[0], body[1]]),
            topic: String::from_utf8_lossy(&body[4..4 + topic_len]).into_owned(),
            partition: i32::from_be_bytes(rest[0..4].try_into().unwrap()),
            position: i64::from_be_bytes(rest[4..12].try_into().unwrap()),
            limit: u32::from_be_bytes(rest[12..16].try_into().unwrap()),
        }
    }
}

struct State {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    requests: Mutex<Vec<RecordedRequest>>,
    connections: AtomicUsize,
    client_closes: AtomicUsize,
}

pub struct MockBroker {
    addr: SocketAddr,
    state: Arc<State>,
    accept_loop: JoinHandle<()>,
}

impl MockBroker {
    /// Answer requests with `replies` in order, then with `fallback`.
    pub async fn start(replies: Vec<Reply>, fallback: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(State {
            replies: Mutex::new(replies.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
            client_closes: AtomicUsize::new(0),
        });

        let accept_state = Arc::clone(&state);
        let accept_loop = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accept_state.connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(socket, Arc::clone(&accept_state)));
            }
        });

        Self {
            addr,
            state,
            accept_loop,
        }
    }

    /// Answer with `replies`, then close any connection that asks for more.
    pub async fn scripted(replies: Vec<Reply>) -> Self {
        Self::start(replies, Reply::Close).await
    }

    pub fn hostname(&self) -> String {
        self.addr.to_string()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Connections the client closed while the broker waited for a request.
    pub fn client_closes(&self) -> usize {
        self.state.client_closes.load(Ordering::SeqCst)
    }

    /// Wait until the broker has received `n` requests.
    pub async fn wait_for_requests(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.requests().len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("client stopped sending requests");
    }

    /// Wait until the client has closed `n` connections.
    pub async fn wait_for_client_closes(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.client_closes() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("client did not close its connection");
    }
}

impl Drop for MockBroker {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn serve(mut socket: TcpStream, state: Arc<State>) {
    let mut write_closed = false;
    loop {
        let mut size = [0u8; 4];
        if socket.read_exact(&mut size).await.is_err() {
            state.client_closes.fetch_add(1, Ordering::SeqCst);
            return;
        }
        let mut body = vec![0u8; u32::from_be_bytes(size) as usize];
        if socket.read_exact(&mut body).await.is_err() {
            state.client_closes.fetch_add(1, Ordering::SeqCst);
            return;
        }
        state
            .requests
            .lock()
            .unwrap()
            .push(RecordedRequest::parse(&body));
        if write_closed {
            continue;
        }

        let reply = state
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| state.fallback.clone());
        match reply {
            Reply::Frame(frame) => {
                if socket.write_all(&frame).await.is_err() {
                    return;
                }
            }
            Reply::Close => return,
            Reply::EndOfStream => {
                let _ = socket.shutdown().await;
                write_closed = true;
            }
        }
    }
}

fn frame(error_code: i16, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(6 + body.len());
    buf.put_u32((2 + body.len()) as u32);
    buf.put_i16(error_code);
    buf.put_slice(body);
    buf.freeze()
}

/// Fetch response carrying `payloads` as well-formed message frames.
pub fn messages(payloads: &[&[u8]]) -> Reply {
    let mut body = BytesMut::new();
    for payload in payloads {
        body.put_slice(&encode_message(payload));
    }
    Reply::Frame(frame(0, &body))
}

/// Response with the success code and a raw body.
pub fn raw(body: &[u8]) -> Reply {
    Reply::Frame(frame(0, body))
}

/// Response with only the success code: no new data.
pub fn empty() -> Reply {
    raw(&[])
}

pub fn broker_error(code: i16) -> Reply {
    Reply::Frame(frame(code, &[]))
}

pub fn offsets(count: u32, offsets: &[u64]) -> Reply {
    let mut body = BytesMut::new();
    body.put_u32(count);
    for offset in offsets {
        body.put_u64(*offset);
    }
    raw(&body)
}

/// Bytes a message with this payload occupies on the wire.
pub fn frame_len(payload: &[u8]) -> u64 {
    (4 + 4 + payload.len()) as u64
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
