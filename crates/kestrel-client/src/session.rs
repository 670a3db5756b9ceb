//! One client session: a Unix-socket stream, a writer coalescer and a
//! reader loop.
//!
//! Writes go through a buffered queue guarded by a single-holder mutex: any
//! number of tasks may append, exactly one drains the queue to the socket at
//! a time, encoding the whole snapshot back-to-back and writing it as one
//! syscall. This batches naturally under load without adding latency when
//! idle.
//!
//! The reader loop is one long-running task. It reads chunks, decodes as many
//! complete frames as the buffer holds, dispatches each to the multiplexer
//! (or the push channel) and never calls user code except the documented
//! non-blocking push callback. Stream EOF becomes a closing error and tears
//! the session down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use kestrel_codec::{decode_delimited, encode_delimited, CodecError};
use kestrel_proto as proto;
use kestrel_runtime::{
    drop_otel_span, value_from_pointer, Value, DEFAULT_READ_BYTES_SIZE,
    DEFAULT_TIMEOUT_IN_MILLISECONDS,
};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::{oneshot, Mutex as AsyncMutex};

use crate::errors::{Error, RequestErrorKind, UNEXPECTED_CLOSE};
use crate::mux::{SlotTable, HANDSHAKE_SLOT};
use crate::push::PushChannel;

/// A message queued for the writer coalescer.
pub(crate) enum Outbound {
    Connection(proto::ConnectionRequest),
    Command(proto::CommandRequest),
}

impl Outbound {
    /// The slot a write failure should be surfaced on.
    fn callback_idx(&self) -> u32 {
        match self {
            Outbound::Connection(_) => HANDSHAKE_SLOT,
            Outbound::Command(request) => request.callback_idx,
        }
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Outbound::Connection(request) => encode_delimited(buf, request),
            Outbound::Command(request) => encode_delimited(buf, request),
        }
    }
}

/// Process-wide state of one UDS connection to the runtime.
pub(crate) struct ClientSession {
    queue: Mutex<Vec<Outbound>>,
    writer: AsyncMutex<OwnedWriteHalf>,
    slots: Mutex<SlotTable>,
    push: PushChannel,
    is_closed: AtomicBool,
    /// Stops the reader loop on an explicit close.
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl ClientSession {
    /// Connect to the runtime's socket and start the reader task. The
    /// connect itself runs under the engine-wide creation deadline.
    pub(crate) async fn connect(socket_path: &str, push: PushChannel) -> Result<Arc<Self>, Error> {
        let deadline = Duration::from_millis(DEFAULT_TIMEOUT_IN_MILLISECONDS);
        let stream = tokio::time::timeout(deadline, UnixStream::connect(socket_path))
            .await
            .map_err(|_| Error::Closing("Failed to create UDS connection".to_string()))?
            .map_err(|e| Error::Closing(format!("Failed to create UDS connection: {e}")))?;
        Ok(Self::from_stream(stream, push))
    }

    /// Wrap an already-connected stream. Used directly by tests.
    pub(crate) fn from_stream(stream: UnixStream, push: PushChannel) -> Arc<Self> {
        let (read_half, write_half) = stream.into_split();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let session = Arc::new(Self {
            queue: Mutex::new(Vec::new()),
            writer: AsyncMutex::new(write_half),
            slots: Mutex::new(SlotTable::new()),
            push,
            is_closed: AtomicBool::new(false),
            shutdown: Mutex::new(Some(shutdown_tx)),
        });
        tokio::spawn(run_reader(session.clone(), read_half, shutdown_rx));
        session
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.is_closed.load(Ordering::SeqCst)
    }

    pub(crate) fn push_channel(&self) -> &PushChannel {
        &self.push
    }

    /// Send the connection configuration on the handshake slot and await the
    /// runtime's verdict. A non-OK reply is fatal.
    pub(crate) async fn handshake(&self, request: proto::ConnectionRequest) -> Result<(), Error> {
        let deadline = Duration::from_millis(DEFAULT_TIMEOUT_IN_MILLISECONDS);
        let reply = tokio::time::timeout(
            deadline,
            self.send_request(|idx| {
                debug_assert_eq!(idx, HANDSHAKE_SLOT);
                Outbound::Connection(request)
            }),
        )
        .await
        .map_err(|_| Error::Closing("Timed out waiting for the connection handshake".to_string()))??;

        match reply {
            Value::Okay => Ok(()),
            other => Err(Error::Closing(format!(
                "Failed to set the connection configuration: {other}"
            ))),
        }
    }

    /// Allocate a slot, park an awaiter, hand the request to the writer and
    /// suspend until the matching response (or session close) resolves it.
    pub(crate) async fn send_request(
        &self,
        build: impl FnOnce(u32) -> Outbound,
    ) -> Result<Value, Error> {
        if self.is_closed() {
            return Err(Error::closed_client());
        }

        let (tx, rx) = oneshot::channel();
        let idx = self.slots.lock().register(tx);

        // close() may have drained the table between the flag check and the
        // install; reclaim the slot rather than parking forever.
        if self.is_closed() {
            self.slots.lock().take(idx);
            return Err(Error::closed_client());
        }

        self.schedule(build(idx)).await;
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::closed_client()),
        }
    }

    /// Queue a message, then drain the queue to the socket if no other task
    /// is already doing so. Callers that lose the writer race return
    /// immediately; the current holder transmits their entry.
    pub(crate) async fn schedule(&self, msg: Outbound) {
        let origin_idx = msg.callback_idx();
        self.queue.lock().push(msg);

        let Ok(mut writer) = self.writer.try_lock() else {
            return;
        };
        loop {
            let batch: Vec<Outbound> = std::mem::take(&mut *self.queue.lock());
            if batch.is_empty() {
                break;
            }
            let mut buf = BytesMut::new();
            for msg in &batch {
                msg.encode_into(&mut buf);
            }
            if let Err(e) = writer.write_all(&buf).await {
                drop(writer);
                self.fail_request(origin_idx, write_error(e));
                return;
            }
        }
    }

    /// Surface a transport failure on the slot whose write was in flight.
    fn fail_request(&self, idx: u32, err: Error) {
        match self.slots.lock().take(idx) {
            Some(awaiter) => {
                let _ = awaiter.send(Err(err));
            }
            None => {
                tracing::warn!(
                    callback_idx = idx,
                    error = %err,
                    "unhandled write error for unknown request"
                );
            }
        }
    }

    /// Terminate the session: every live request and push awaiter resolves
    /// with a closing error carrying `err_message`, the reader stops and the
    /// stream shuts down. Idempotent; safe from the reader's error path.
    pub(crate) async fn close(&self, err_message: &str) {
        if self.is_closed.swap(true, Ordering::SeqCst) {
            return;
        }

        for awaiter in self.slots.lock().take_all() {
            let _ = awaiter.send(Err(Error::Closing(err_message.to_string())));
        }
        self.push.close_all(err_message);

        if let Some(shutdown) = self.shutdown.lock().take() {
            let _ = shutdown.send(());
        }
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    /// Route one decoded frame: push traffic to the push channel, everything
    /// else to its callback slot. An error return tears the session down.
    fn dispatch_response(&self, response: proto::Response) -> Result<(), Error> {
        if response.is_push {
            self.process_push(response)
        } else {
            self.process_response(response)
        }
    }

    fn process_push(&self, response: proto::Response) -> Result<(), Error> {
        use proto::response::Value as RespValue;

        match response.value {
            Some(RespValue::ClosingError(msg)) => Err(Error::Closing(msg)),
            Some(RespValue::RespPointer(ptr)) => {
                // The pointer is consumed here, exactly once.
                let value = unsafe { value_from_pointer(ptr) };
                match value {
                    Value::Push { kind, values } => {
                        self.push.handle_notification(kind, values);
                        Ok(())
                    }
                    other => {
                        tracing::warn!(value = %other, "push response is not a push notification");
                        Ok(())
                    }
                }
            }
            _ => Err(Error::Closing(
                "Client Error - push notification without resp_pointer".to_string(),
            )),
        }
    }

    fn process_response(&self, response: proto::Response) -> Result<(), Error> {
        use proto::response::Value as RespValue;

        let span_ptr = response.root_span_ptr;
        let idx = response.callback_idx;
        let closing = response.is_closing_error();

        let awaiter = {
            let mut slots = self.slots.lock();
            let awaiter = slots.take(idx);
            if awaiter.is_some() && !closing {
                slots.recycle(idx);
            }
            awaiter
        };

        let result = match (awaiter, response.value) {
            (None, value) => {
                // A response with no live awaiter means the slot protocol
                // broke; treat the session as poisoned.
                let err_msg = match value {
                    Some(RespValue::ClosingError(msg)) => msg,
                    _ => format!(
                        "Client Error - closing due to unknown error. callback index: {idx}"
                    ),
                };
                tracing::warn!(callback_idx = idx, "unhandled response for unknown request");
                Err(Error::Closing(err_msg))
            }
            (Some(awaiter), Some(RespValue::ClosingError(msg))) => {
                let _ = awaiter.send(Err(Error::Closing(msg.clone())));
                Err(Error::Closing(msg))
            }
            (Some(awaiter), Some(RespValue::RequestError(err))) => {
                let kind = proto::RequestErrorType::try_from(err.r#type)
                    .map(RequestErrorKind::from)
                    .unwrap_or(RequestErrorKind::Unspecified);
                let _ = awaiter.send(Err(Error::Request {
                    kind,
                    message: err.message,
                }));
                Ok(())
            }
            (Some(awaiter), Some(RespValue::RespPointer(ptr))) => {
                // The pointer is consumed here, exactly once.
                let value = unsafe { value_from_pointer(ptr) };
                let _ = awaiter.send(Ok(value));
                Ok(())
            }
            (Some(awaiter), Some(RespValue::ConstantResponse(_))) => {
                let _ = awaiter.send(Ok(Value::Okay));
                Ok(())
            }
            (Some(awaiter), None) => {
                let _ = awaiter.send(Ok(Value::Nil));
                Ok(())
            }
        };

        if let Some(span) = span_ptr {
            drop_otel_span(span);
        }
        result
    }

    async fn reader_loop(
        &self,
        mut read_half: OwnedReadHalf,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> Result<(), Error> {
        let mut buf = BytesMut::with_capacity(DEFAULT_READ_BYTES_SIZE);
        loop {
            buf.reserve(DEFAULT_READ_BYTES_SIZE);
            let n = tokio::select! {
                result = read_half.read_buf(&mut buf) => {
                    result.map_err(|_| Error::Closing(UNEXPECTED_CLOSE.to_string()))?
                }
                _ = &mut *shutdown => return Ok(()),
            };
            if n == 0 {
                return Err(Error::Closing(UNEXPECTED_CLOSE.to_string()));
            }

            let mut offset = 0;
            loop {
                match decode_delimited::<proto::Response>(&buf, offset) {
                    Ok((response, next)) => {
                        offset = next;
                        self.dispatch_response(response)?;
                    }
                    Err(CodecError::PartialMessage) => break,
                    Err(CodecError::Malformed(msg)) => return Err(Error::Closing(msg)),
                }
            }
            // Keep only the unconsumed tail for the next read.
            buf.advance(offset);
        }
    }
}

fn write_error(e: std::io::Error) -> Error {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::NotConnected
        | ErrorKind::UnexpectedEof => Error::Closing(UNEXPECTED_CLOSE.to_string()),
        _ => Error::Closing(format!("Socket write failed: {e}")),
    }
}

async fn run_reader(
    session: Arc<ClientSession>,
    read_half: OwnedReadHalf,
    mut shutdown: oneshot::Receiver<()>,
) {
    if let Err(err) = session.reader_loop(read_half, &mut shutdown).await {
        let msg = match &err {
            Error::Closing(msg) => msg.clone(),
            other => other.to_string(),
        };
        session.close(&msg).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CLIENT_CLOSED;

    fn command(callback_idx: u32) -> Outbound {
        Outbound::Command(proto::CommandRequest {
            callback_idx,
            command: Some(proto::command_request::Command::SingleCommand(
                proto::Command {
                    request_type: proto::RequestType::Ping as i32,
                    args: None,
                },
            )),
            route: None,
            root_span_ptr: None,
        })
    }

    async fn read_requests(
        peer: &mut UnixStream,
        expected: usize,
    ) -> Vec<proto::CommandRequest> {
        let mut buf = BytesMut::new();
        let mut requests = Vec::new();
        while requests.len() < expected {
            peer.read_buf(&mut buf).await.unwrap();
            let mut offset = 0;
            loop {
                match decode_delimited::<proto::CommandRequest>(&buf, offset) {
                    Ok((request, next)) => {
                        offset = next;
                        requests.push(request);
                    }
                    Err(CodecError::PartialMessage) => break,
                    Err(CodecError::Malformed(msg)) => panic!("malformed frame: {msg}"),
                }
            }
            buf.advance(offset);
        }
        requests
    }

    #[tokio::test]
    async fn coalescer_preserves_submission_order_under_contention() {
        let (local, mut peer) = UnixStream::pair().unwrap();
        let session = ClientSession::from_stream(local, PushChannel::new(false, None));

        // Simulate a busy writer: while the lock is held, scheduling only
        // queues.
        let writer_guard = session.writer.lock().await;
        for idx in 1..=3 {
            session.schedule(command(idx)).await;
        }
        assert_eq!(session.queue.lock().len(), 3);
        drop(writer_guard);

        // The next scheduler drains the whole backlog plus its own entry.
        session.schedule(command(4)).await;
        assert!(session.queue.lock().is_empty());

        let requests = read_requests(&mut peer, 4).await;
        let order: Vec<u32> = requests.iter().map(|r| r.callback_idx).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn close_resolves_inflight_requests_and_is_idempotent() {
        let (local, _peer) = UnixStream::pair().unwrap();
        let session = ClientSession::from_stream(local, PushChannel::new(false, None));

        let inflight = {
            let session = session.clone();
            tokio::spawn(async move { session.send_request(command).await })
        };
        tokio::task::yield_now().await;

        session.close("going away").await;
        let err = inflight.await.unwrap().unwrap_err();
        assert!(matches!(&err, Error::Closing(msg) if msg.contains("going away")));

        // Closed sessions reject new work synchronously.
        let err = session.send_request(command).await.unwrap_err();
        assert!(matches!(&err, Error::Closing(msg) if msg == CLIENT_CLOSED));

        // A second close is a no-op.
        session.close("again").await;
    }

    #[tokio::test]
    async fn peer_eof_becomes_unexpected_close() {
        let (local, peer) = UnixStream::pair().unwrap();
        let session = ClientSession::from_stream(local, PushChannel::new(false, None));

        let inflight = {
            let session = session.clone();
            tokio::spawn(async move { session.send_request(command).await })
        };
        tokio::task::yield_now().await;

        drop(peer);
        let err = inflight.await.unwrap().unwrap_err();
        assert!(matches!(&err, Error::Closing(msg) if msg.contains(UNEXPECTED_CLOSE)));
        assert!(session.is_closed());
    }
}
