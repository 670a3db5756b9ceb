//! A scripted Runtime Core for tests.
//!
//! [`MockRuntime`] installs itself as the process-wide connection backend and
//! speaks the real IPC protocol over the real Unix sockets: it answers the
//! handshake, records every command request (reclaiming pointer-variant
//! payloads the way the real runtime would), and replies according to a
//! per-session responder script. Tests can also drive responses by hand for
//! out-of-order scenarios, inject push notifications, and drop the
//! connection to simulate runtime failures.
//!
//! The backend is process-global, so sessions are matched to expectations in
//! connection order: call [`MockRuntime::expect_session`] before each client
//! `create`, and serialize tests that share the process.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use kestrel_codec::{decode_delimited, encode_delimited, CodecError};
use kestrel_proto as proto;
use kestrel_runtime::{
    install_backend, take_leaked_bytes_vec, value_to_pointer, ConnectionBackend, PushKind, Value,
};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixStream;
use tokio::sync::Mutex as AsyncMutex;

/// What the mock runtime sends back for one request.
#[derive(Clone, Debug)]
pub enum MockReply {
    /// A decoded value, delivered as a leaked `resp_pointer`.
    Value(Value),
    /// The OK acknowledgment (constant response).
    Ok,
    /// A null result (no value branch).
    Null,
    /// A typed request error.
    Error(proto::RequestErrorType, String),
    /// A fatal closing error.
    Closing(String),
    /// No response; the test drives it later via `send_response`.
    None,
}

/// One command request as the runtime saw it, with pointer-variant payloads
/// already reclaimed (the runtime owns and frees them).
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub request: proto::CommandRequest,
    /// Single-command args reclaimed from an `args_vec_pointer`.
    pub pointer_args: Option<Vec<Vec<u8>>>,
    /// Per-command reclaimed args for pointer-variant batch entries.
    pub batch_pointer_args: Vec<Option<Vec<Vec<u8>>>>,
    /// Keys and args reclaimed from script invocation pointers.
    pub script_pointer_keys: Option<Vec<Vec<u8>>>,
    pub script_pointer_args: Option<Vec<Vec<u8>>>,
}

impl RecordedRequest {
    /// The single-command argument list, wherever it travelled.
    pub fn single_args(&self) -> Vec<Vec<u8>> {
        if let Some(args) = &self.pointer_args {
            return args.clone();
        }
        match &self.request.command {
            Some(proto::command_request::Command::SingleCommand(command)) => {
                match &command.args {
                    Some(proto::command::Args::ArgsArray(array)) => array.args.clone(),
                    _ => Vec::new(),
                }
            }
            _ => Vec::new(),
        }
    }

    pub fn request_type(&self) -> Option<proto::RequestType> {
        match &self.request.command {
            Some(proto::command_request::Command::SingleCommand(command)) => {
                proto::RequestType::try_from(command.request_type).ok()
            }
            _ => None,
        }
    }
}

type Responder = Arc<dyn Fn(&RecordedRequest) -> MockReply + Send + Sync>;

struct SessionInner {
    responder: Mutex<Responder>,
    handshake_reply: Mutex<MockReply>,
    connection_request: Mutex<Option<proto::ConnectionRequest>>,
    requests: Mutex<Vec<RecordedRequest>>,
    writer: Mutex<Option<Arc<AsyncMutex<OwnedWriteHalf>>>>,
    connected: AtomicBool,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            responder: Mutex::new(Arc::new(|_| MockReply::Null)),
            handshake_reply: Mutex::new(MockReply::Ok),
            connection_request: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            writer: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }
}

/// Handle to one expected (or live) client session.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

impl SessionHandle {
    /// Script the reply for each incoming command request.
    pub fn set_responder(
        &self,
        responder: impl Fn(&RecordedRequest) -> MockReply + Send + Sync + 'static,
    ) {
        *self.inner.responder.lock() = Arc::new(responder);
    }

    /// Change what the handshake resolves with. Default is OK.
    pub fn set_handshake_reply(&self, reply: MockReply) {
        *self.inner.handshake_reply.lock() = reply;
    }

    /// The connection request received in the handshake, once it happened.
    pub fn connection_request(&self) -> Option<proto::ConnectionRequest> {
        self.inner.connection_request.lock().clone()
    }

    /// Every command request seen so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Wait until `count` command requests arrived.
    pub async fn wait_for_requests(&self, count: usize) {
        while self.inner.requests.lock().len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Send one response by hand, for out-of-order orchestration.
    pub async fn send_response(&self, callback_idx: u32, reply: MockReply) {
        if let Some(response) = build_response(callback_idx, reply, None) {
            self.send_raw(response).await;
        }
    }

    /// Deliver a push notification.
    pub async fn send_push(&self, kind: PushKind, values: Vec<Value>) {
        let response = proto::Response {
            callback_idx: 0,
            value: Some(proto::response::Value::RespPointer(value_to_pointer(
                Value::Push { kind, values },
            ))),
            is_push: true,
            root_span_ptr: None,
        };
        self.send_raw(response).await;
    }

    /// Write a raw response frame to the session's socket.
    pub async fn send_raw(&self, response: proto::Response) {
        let writer = self.inner.writer.lock().clone();
        let Some(writer) = writer else {
            panic!("no client connected to this session yet");
        };
        let mut buf = BytesMut::new();
        encode_delimited(&mut buf, &response);
        let mut writer = writer.lock().await;
        writer.write_all(&buf).await.expect("mock runtime write failed");
    }

    /// Half-close the socket: the client sees EOF on its next read.
    pub async fn shutdown(&self) {
        let writer = self.inner.writer.lock().clone();
        if let Some(writer) = writer {
            let _ = writer.lock().await.shutdown().await;
        }
        self.inner.connected.store(false, Ordering::SeqCst);
    }
}

struct RuntimeInner {
    /// Sessions waiting for their connection, matched in accept order.
    pending: Mutex<VecDeque<Arc<SessionInner>>>,
}

/// The process-wide scripted runtime.
#[derive(Clone)]
pub struct MockRuntime {
    inner: Arc<RuntimeInner>,
}

impl MockRuntime {
    /// The installed global instance, installing it on first use.
    pub fn global() -> MockRuntime {
        static GLOBAL: OnceLock<MockRuntime> = OnceLock::new();
        GLOBAL
            .get_or_init(|| {
                let runtime = MockRuntime {
                    inner: Arc::new(RuntimeInner {
                        pending: Mutex::new(VecDeque::new()),
                    }),
                };
                install_backend(runtime.clone());
                runtime
            })
            .clone()
    }

    /// Register the session the next accepted connection belongs to.
    pub fn expect_session(&self) -> SessionHandle {
        let inner = Arc::new(SessionInner::new());
        self.inner.pending.lock().push_back(inner.clone());
        SessionHandle { inner }
    }
}

impl ConnectionBackend for MockRuntime {
    fn handle_connection(&self, stream: UnixStream) {
        let session = self
            .inner
            .pending
            .lock()
            .pop_front()
            .unwrap_or_else(|| Arc::new(SessionInner::new()));
        tokio::spawn(serve(session, stream));
    }
}

async fn serve(session: Arc<SessionInner>, stream: UnixStream) {
    let (mut read_half, write_half) = stream.into_split();
    let writer = Arc::new(AsyncMutex::new(write_half));
    *session.writer.lock() = Some(writer.clone());
    session.connected.store(true, Ordering::SeqCst);

    let mut buf = BytesMut::with_capacity(64 * 1024);
    let mut handshaken = false;
    loop {
        match read_half.read_buf(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let mut offset = 0;
        loop {
            if !handshaken {
                match decode_delimited::<proto::ConnectionRequest>(&buf, offset) {
                    Ok((request, next)) => {
                        offset = next;
                        handshaken = true;
                        *session.connection_request.lock() = Some(request);
                        let reply = session.handshake_reply.lock().clone();
                        if let Some(response) = build_response(0, reply, None) {
                            write_response(&writer, &response).await;
                        }
                    }
                    Err(CodecError::PartialMessage) => break,
                    Err(CodecError::Malformed(msg)) => {
                        tracing::warn!(error = %msg, "mock runtime: malformed handshake");
                        return;
                    }
                }
            } else {
                match decode_delimited::<proto::CommandRequest>(&buf, offset) {
                    Ok((request, next)) => {
                        offset = next;
                        let recorded = materialize(request);
                        let reply = {
                            let responder = session.responder.lock().clone();
                            responder(&recorded)
                        };
                        let callback_idx = recorded.request.callback_idx;
                        let span_ptr = recorded.request.root_span_ptr;
                        session.requests.lock().push(recorded);
                        if let Some(response) = build_response(callback_idx, reply, span_ptr) {
                            write_response(&writer, &response).await;
                        }
                    }
                    Err(CodecError::PartialMessage) => break,
                    Err(CodecError::Malformed(msg)) => {
                        tracing::warn!(error = %msg, "mock runtime: malformed request");
                        return;
                    }
                }
            }
        }
        buf.advance(offset);
    }
    session.connected.store(false, Ordering::SeqCst);
}

async fn write_response(writer: &Arc<AsyncMutex<OwnedWriteHalf>>, response: &proto::Response) {
    let mut buf = BytesMut::new();
    encode_delimited(&mut buf, response);
    let mut writer = writer.lock().await;
    // The client may already have hung up; tests assert on their own side.
    let _ = writer.write_all(&buf).await;
}

/// Reclaim every pointer-variant payload in the request, as the owning side
/// must.
fn materialize(request: proto::CommandRequest) -> RecordedRequest {
    let mut recorded = RecordedRequest {
        request,
        pointer_args: None,
        batch_pointer_args: Vec::new(),
        script_pointer_keys: None,
        script_pointer_args: None,
    };

    match &recorded.request.command {
        Some(proto::command_request::Command::SingleCommand(command)) => {
            if let Some(proto::command::Args::ArgsVecPointer(ptr)) = command.args {
                recorded.pointer_args = Some(unsafe { take_leaked_bytes_vec(ptr) });
            }
        }
        Some(proto::command_request::Command::Batch(batch)) => {
            for command in &batch.commands {
                let reclaimed = match command.args {
                    Some(proto::command::Args::ArgsVecPointer(ptr)) => {
                        Some(unsafe { take_leaked_bytes_vec(ptr) })
                    }
                    _ => None,
                };
                recorded.batch_pointer_args.push(reclaimed);
            }
        }
        Some(proto::command_request::Command::ScriptInvocationPointers(pointers)) => {
            recorded.script_pointer_keys = pointers
                .keys_pointer
                .map(|ptr| unsafe { take_leaked_bytes_vec(ptr) });
            recorded.script_pointer_args = pointers
                .args_pointer
                .map(|ptr| unsafe { take_leaked_bytes_vec(ptr) });
        }
        _ => {}
    }
    recorded
}

fn build_response(
    callback_idx: u32,
    reply: MockReply,
    root_span_ptr: Option<u64>,
) -> Option<proto::Response> {
    let value = match reply {
        MockReply::None => return None,
        MockReply::Value(value) => {
            Some(proto::response::Value::RespPointer(value_to_pointer(value)))
        }
        MockReply::Ok => Some(proto::response::Value::ConstantResponse(
            proto::ConstantResponse::Ok as i32,
        )),
        MockReply::Null => None,
        MockReply::Error(kind, message) => {
            Some(proto::response::Value::RequestError(proto::RequestError {
                r#type: kind as i32,
                message,
            }))
        }
        MockReply::Closing(message) => Some(proto::response::Value::ClosingError(message)),
    };
    Some(proto::Response {
        callback_idx,
        value,
        is_push: false,
        root_span_ptr,
    })
}
