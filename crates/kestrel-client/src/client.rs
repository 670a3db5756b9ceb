//! The user-facing clients.
//!
//! [`Client`] drives a standalone server, [`ClusterClient`] a cluster; both
//! bridge the typed command surface (see `commands.rs`) to the background
//! runtime through one multiplexed session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kestrel_proto as proto;
use kestrel_runtime::{
    create_leaked_bytes_vec, create_otel_span, should_sample, ClusterScanCursor, Value,
    DEFAULT_TIMEOUT_IN_MILLISECONDS, MAX_REQUEST_ARGS_LEN,
};
use parking_lot::Mutex;
use proto::RequestType;
use tokio::sync::oneshot;

use crate::config::{ClientConfig, ServerCredentials};
use crate::errors::{Error, RequestErrorKind};
use crate::logger::{Level, Logger};
use crate::push::PubSubMessage;
use crate::routes::{set_protobuf_route, Route};
use crate::session::{ClientSession, Outbound};

/// Kind filter for a cluster scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectType {
    String,
    List,
    Set,
    ZSet,
    Hash,
    Stream,
}

impl ObjectType {
    fn as_str(self) -> &'static str {
        match self {
            ObjectType::String => "String",
            ObjectType::List => "List",
            ObjectType::Set => "Set",
            ObjectType::ZSet => "ZSet",
            ObjectType::Hash => "Hash",
            ObjectType::Stream => "Stream",
        }
    }
}

fn args_len(args: &[Vec<u8>]) -> usize {
    args.iter().map(Vec::len).sum()
}

/// Build one wire command, inlining the arguments when they are small and
/// handing them to the runtime as a leaked vector otherwise.
fn build_command(request_type: RequestType, args: Vec<Vec<u8>>) -> proto::Command {
    let payload = if args_len(&args) < MAX_REQUEST_ARGS_LEN {
        proto::command::Args::ArgsArray(proto::ArgsArray { args })
    } else {
        proto::command::Args::ArgsVecPointer(create_leaked_bytes_vec(args))
    };
    proto::Command {
        request_type: request_type as i32,
        args: Some(payload),
    }
}

/// Client for a standalone server.
///
/// Create with [`Client::create`]; the typed command wrappers live in
/// `commands.rs`. All commands resolve with the decoded [`Value`] the runtime
/// sent back.
pub struct Client {
    session: Arc<ClientSession>,
    config: ClientConfig,
    /// Kept in sync with successful password updates so the runtime's
    /// reconnects and the binding agree on the credentials.
    credentials: Mutex<Option<ServerCredentials>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("config", &self.config).finish()
    }
}

impl Client {
    /// Connect a client for a standalone server.
    pub async fn create(config: ClientConfig) -> Result<Self, Error> {
        Self::create_with_mode(config, false).await
    }

    pub(crate) async fn create_with_mode(
        config: ClientConfig,
        cluster_mode: bool,
    ) -> Result<Self, Error> {
        let (path_tx, path_rx) = oneshot::channel();
        kestrel_runtime::start_socket_listener(move |result| {
            let _ = path_tx.send(result);
        });

        let deadline = Duration::from_millis(DEFAULT_TIMEOUT_IN_MILLISECONDS);
        let socket_path = tokio::time::timeout(deadline, path_rx)
            .await
            .map_err(|_| {
                Error::Closing("Timed out waiting for the socket listener".to_string())
            })?
            .map_err(|_| {
                Error::Closing("Socket initialization error: listener dropped".to_string())
            })?
            .map_err(Error::Closing)?;

        Logger::log(Level::Info, "connection info", "new connection established");

        let push = crate::push::PushChannel::new(
            config.is_pubsub_configured(),
            config.pubsub_callback(),
        );
        let session = ClientSession::connect(&socket_path, push).await?;

        if let Err(err) = session.handshake(config.to_connection_request(cluster_mode)).await {
            session.close(&err.to_string()).await;
            return Err(err);
        }

        let credentials = Mutex::new(config.credentials.clone());
        Ok(Self {
            session,
            config,
            credentials,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The credentials the client currently believes are in effect.
    pub fn current_credentials(&self) -> Option<ServerCredentials> {
        self.credentials.lock().clone()
    }

    /// Send one command and await its decoded result.
    pub async fn execute_command(
        &self,
        request_type: RequestType,
        args: Vec<Vec<u8>>,
        route: Option<Route>,
    ) -> Result<Value, Error> {
        if self.session.is_closed() {
            return Err(Error::closed_client());
        }

        let span = should_sample().then(|| create_otel_span(request_type.name()));
        let command = build_command(request_type, args);
        self.session
            .send_request(move |idx| {
                let mut request = proto::CommandRequest {
                    callback_idx: idx,
                    command: Some(proto::command_request::Command::SingleCommand(command)),
                    route: None,
                    root_span_ptr: span,
                };
                set_protobuf_route(&mut request, route.as_ref());
                Outbound::Command(request)
            })
            .await
    }

    /// Send an ordered list of commands as one request. The result is a list
    /// of sub-results; with `raise_on_error`, the first sub-error is raised
    /// instead. An atomic batch runs as a transaction and resolves with Nil
    /// when the server aborts it.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute_batch(
        &self,
        commands: Vec<(RequestType, Vec<Vec<u8>>)>,
        is_atomic: bool,
        raise_on_error: bool,
        retry_server_error: bool,
        retry_connection_error: bool,
        route: Option<Route>,
        timeout: Option<u32>,
    ) -> Result<Value, Error> {
        if self.session.is_closed() {
            return Err(Error::closed_client());
        }

        let span = should_sample().then(|| create_otel_span("Batch"));
        let batch = proto::Batch {
            commands: commands
                .into_iter()
                .map(|(request_type, args)| build_command(request_type, args))
                .collect(),
            is_atomic,
            raise_on_error,
            timeout,
            retry_server_error,
            retry_connection_error,
        };
        self.session
            .send_request(move |idx| {
                let mut request = proto::CommandRequest {
                    callback_idx: idx,
                    command: Some(proto::command_request::Command::Batch(batch)),
                    route: None,
                    root_span_ptr: span,
                };
                set_protobuf_route(&mut request, route.as_ref());
                Outbound::Command(request)
            })
            .await
    }

    /// Invoke a server-side script by SHA1 hash. The inline-vs-pointer
    /// choice considers keys and args together, and both lists always travel
    /// the same way.
    pub async fn execute_script(
        &self,
        hash: &str,
        keys: Vec<Vec<u8>>,
        args: Vec<Vec<u8>>,
        route: Option<Route>,
    ) -> Result<Value, Error> {
        if self.session.is_closed() {
            return Err(Error::closed_client());
        }

        let command = if args_len(&keys) + args_len(&args) < MAX_REQUEST_ARGS_LEN {
            proto::command_request::Command::ScriptInvocation(proto::ScriptInvocation {
                hash: hash.to_string(),
                keys,
                args,
            })
        } else {
            proto::command_request::Command::ScriptInvocationPointers(
                proto::ScriptInvocationPointers {
                    hash: hash.to_string(),
                    keys_pointer: Some(create_leaked_bytes_vec(keys)),
                    args_pointer: Some(create_leaked_bytes_vec(args)),
                },
            )
        };
        self.session
            .send_request(move |idx| {
                let mut request = proto::CommandRequest::default();
                request.callback_idx = idx;
                request.command = Some(command);
                set_protobuf_route(&mut request, route.as_ref());
                Outbound::Command(request)
            })
            .await
    }

    /// Update the password the runtime uses when reconnecting; with
    /// `immediate_auth` the live connections re-authenticate right away.
    /// On success the client's own credentials snapshot follows suit.
    pub async fn update_connection_password(
        &self,
        password: Option<String>,
        immediate_auth: bool,
    ) -> Result<Value, Error> {
        if self.session.is_closed() {
            return Err(Error::closed_client());
        }

        let update = proto::UpdateConnectionPassword {
            password: password.clone(),
            immediate_auth,
        };
        let response = self
            .session
            .send_request(move |idx| {
                let mut request = proto::CommandRequest::default();
                request.callback_idx = idx;
                request.command = Some(
                    proto::command_request::Command::UpdateConnectionPassword(update),
                );
                Outbound::Command(request)
            })
            .await?;

        if response == Value::Okay {
            let mut credentials = self.credentials.lock();
            match credentials.as_mut() {
                Some(creds) => creds.password = password.unwrap_or_default(),
                None => {
                    *credentials = Some(ServerCredentials::new(password.unwrap_or_default()))
                }
            }
        }
        Ok(response)
    }

    /// Ask the runtime to refresh its IAM token now.
    pub async fn refresh_iam_token(&self) -> Result<Value, Error> {
        if self.session.is_closed() {
            return Err(Error::closed_client());
        }

        self.session
            .send_request(|idx| {
                let mut request = proto::CommandRequest::default();
                request.callback_idx = idx;
                request.command = Some(proto::command_request::Command::RefreshIamToken(
                    proto::RefreshIamToken {},
                ));
                Outbound::Command(request)
            })
            .await
    }

    /// Await the next pub/sub message. Only valid in pull mode on a session
    /// configured with subscriptions.
    pub async fn get_pubsub_message(&self) -> Result<PubSubMessage, Error> {
        if self.session.is_closed() {
            return Err(Error::closed_client());
        }
        self.session.push_channel().get_message().await
    }

    /// Return the next pub/sub message if one is queued; never blocks.
    pub fn try_get_pubsub_message(&self) -> Result<Option<PubSubMessage>, Error> {
        if self.session.is_closed() {
            return Err(Error::closed_client());
        }
        self.session.push_channel().try_get_message()
    }

    /// Engine counters from the runtime.
    pub fn get_statistics(&self) -> HashMap<String, String> {
        kestrel_runtime::get_statistics()
    }

    /// Terminate the client. Every open awaiter resolves with a closing
    /// error carrying `err_message`; further calls fail synchronously.
    /// Idempotent.
    pub async fn close(&self, err_message: Option<String>) {
        self.session
            .close(err_message.as_deref().unwrap_or_default())
            .await;
    }
}

/// Client for a cluster.
///
/// Dereferences to [`Client`] for the shared surface and adds the
/// cluster-only operations.
pub struct ClusterClient {
    inner: Client,
}

impl ClusterClient {
    /// Connect a client for a cluster.
    pub async fn create(config: ClientConfig) -> Result<Self, Error> {
        Ok(Self {
            inner: Client::create_with_mode(config, true).await?,
        })
    }

    /// One step of a cluster-wide SCAN. Returns the advanced cursor and the
    /// batch of keys; iteration is done once the cursor reports finished.
    pub async fn cluster_scan(
        &self,
        cursor: &ClusterScanCursor,
        match_pattern: Option<Vec<u8>>,
        count: Option<i64>,
        object_type: Option<ObjectType>,
        allow_non_covered_slots: bool,
    ) -> Result<(ClusterScanCursor, Vec<Value>), Error> {
        if self.inner.session.is_closed() {
            return Err(Error::closed_client());
        }

        let scan = proto::ClusterScan {
            cursor: cursor.get_cursor().to_string(),
            match_pattern,
            count,
            object_type: object_type.map(|ty| ty.as_str().to_string()),
            allow_non_covered_slots,
        };
        let response = self
            .inner
            .session
            .send_request(move |idx| {
                let mut request = proto::CommandRequest::default();
                request.callback_idx = idx;
                request.command = Some(proto::command_request::Command::ClusterScan(scan));
                Outbound::Command(request)
            })
            .await?;
        parse_scan_response(response)
    }
}

impl std::ops::Deref for ClusterClient {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.inner
    }
}

/// A scan response is `[new_cursor, [keys...]]`.
fn parse_scan_response(response: Value) -> Result<(ClusterScanCursor, Vec<Value>), Error> {
    fn malformed() -> Error {
        Error::Request {
            kind: RequestErrorKind::Unspecified,
            message: "malformed cluster scan response".to_string(),
        }
    }

    let Value::Array(mut items) = response else {
        return Err(malformed());
    };
    if items.len() != 2 {
        return Err(malformed());
    }
    let keys = match items.pop() {
        Some(Value::Array(keys)) => keys,
        _ => return Err(malformed()),
    };
    let cursor = match items.pop() {
        Some(Value::BulkString(bytes)) => {
            String::from_utf8(bytes).map_err(|_| malformed())?
        }
        Some(Value::SimpleString(s)) => s,
        _ => return Err(malformed()),
    };
    Ok((ClusterScanCursor::from_id(cursor), keys))
}
