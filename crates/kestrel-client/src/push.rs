//! Push-notification delivery: the pub/sub side of the engine.
//!
//! Two delivery disciplines, fixed at construction from the connection
//! configuration: a user callback invoked synchronously on the reader task,
//! or a pull-style pair of FIFO queues (pending notifications on one side,
//! parked awaiters on the other) drained pairwise under the push lock.

use std::collections::VecDeque;

use kestrel_runtime::{PushKind, Value};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::config::PubSubCallback;
use crate::errors::Error;

/// A pub/sub message delivered to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PubSubMessage {
    pub channel: Vec<u8>,
    pub message: Vec<u8>,
    /// The matching pattern, for pattern-subscription messages.
    pub pattern: Option<Vec<u8>>,
}

type PushAwaiter = oneshot::Sender<Result<PubSubMessage, Error>>;

struct PushState {
    /// Notifications with no awaiter yet.
    pending: VecDeque<PubSubMessage>,
    /// Awaiters with no notification yet.
    waiters: VecDeque<PushAwaiter>,
}

pub(crate) struct PushChannel {
    /// Whether the connection was configured with any subscriptions.
    configured: bool,
    callback: Option<PubSubCallback>,
    state: Mutex<PushState>,
}

impl PushChannel {
    pub(crate) fn new(configured: bool, callback: Option<PubSubCallback>) -> Self {
        Self {
            configured,
            callback,
            state: Mutex::new(PushState {
                pending: VecDeque::new(),
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Route one decoded push notification.
    ///
    /// Runs on the reader task. Message notifications go to the callback or
    /// the pending queue; confirmations are consumed silently; a disconnect
    /// notice is logged.
    pub(crate) fn handle_notification(&self, kind: PushKind, values: Vec<Value>) {
        if kind == PushKind::Disconnection {
            tracing::warn!("transport disconnected, messages might be lost");
            return;
        }
        if !kind.is_message() {
            // Subscribe/unsubscribe confirmations carry no user payload.
            return;
        }
        let Some(message) = notification_to_message(kind, values) else {
            return;
        };

        let mut state = self.state.lock();
        if let Some(callback) = &self.callback {
            // Documented contract: the callback must not block the reader.
            callback(message);
            return;
        }
        state.pending.push_back(message);
        drain_matched(&mut state);
    }

    /// Park an awaiter and resolve it with the next message.
    pub(crate) async fn get_message(&self) -> Result<PubSubMessage, Error> {
        self.check_pull_mode("complete")?;

        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock();
            state.waiters.push_back(tx);
            drain_matched(&mut state);
        }
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::closed_client()),
        }
    }

    /// Return the next message if one is already queued; never blocks.
    pub(crate) fn try_get_message(&self) -> Result<Option<PubSubMessage>, Error> {
        self.check_pull_mode("succeed")?;

        let mut state = self.state.lock();
        drain_matched(&mut state);
        Ok(state.pending.pop_front())
    }

    /// Resolve every parked awaiter with a closing error.
    pub(crate) fn close_all(&self, err_message: &str) {
        let mut state = self.state.lock();
        while let Some(waiter) = state.waiters.pop_front() {
            let _ = waiter.send(Err(Error::Closing(err_message.to_string())));
        }
    }

    fn check_pull_mode(&self, verb: &str) -> Result<(), Error> {
        if !self.configured {
            return Err(Error::Configuration(format!(
                "The operation will never {verb} since there was no pubsub subscriptions applied to the client."
            )));
        }
        if self.callback.is_some() {
            return Err(Error::Configuration(format!(
                "The operation will never {verb} since messages will be passed to the configured callback."
            )));
        }
        Ok(())
    }
}

/// Pair up queued notifications with parked awaiters. Caller holds the push
/// lock.
fn drain_matched(state: &mut PushState) {
    loop {
        if state.pending.is_empty() || state.waiters.is_empty() {
            return;
        }
        let waiter = match state.waiters.pop_front() {
            Some(waiter) => waiter,
            None => return,
        };
        let message = match state.pending.pop_front() {
            Some(message) => message,
            None => {
                state.waiters.push_front(waiter);
                return;
            }
        };
        if let Err(Ok(message)) = waiter.send(Ok(message)) {
            // The awaiter was cancelled; the message belongs to the next one.
            state.pending.push_front(message);
        }
    }
}

/// Translate a message-kind notification into a [`PubSubMessage`].
///
/// Pattern messages carry `[pattern, channel, message]`; exact and sharded
/// messages carry `[channel, message]`. Anything else is malformed and is
/// dropped with a warning.
fn notification_to_message(kind: PushKind, values: Vec<Value>) -> Option<PubSubMessage> {
    fn bytes(value: &Value) -> Option<Vec<u8>> {
        value.as_bytes().map(<[u8]>::to_vec)
    }

    let message = match (kind, values.len()) {
        (PushKind::PMessage, 3) => PubSubMessage {
            pattern: Some(bytes(&values[0])?),
            channel: bytes(&values[1])?,
            message: bytes(&values[2])?,
        },
        (PushKind::Message | PushKind::SMessage, 2) => PubSubMessage {
            pattern: None,
            channel: bytes(&values[0])?,
            message: bytes(&values[1])?,
        },
        (kind, len) => {
            tracing::warn!(%kind, len, "malformed pubsub notification");
            return None;
        }
    };
    Some(message)
}
