//! Wire messages, laid out the way `prost-build` would emit them: one
//! module per protobuf package, oneof enums nested in per-message modules.

use crate::request_type::RequestType;

/// A single `host:port` seed address.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeAddress {
    #[prost(string, tag = "1")]
    pub host: ::prost::alloc::string::String,
    #[prost(uint32, tag = "2")]
    pub port: u32,
}

/// Whether and how the runtime should wrap connections in TLS.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TlsMode {
    NoTls = 0,
    SecureTls = 1,
    InsecureTls = 2,
}

/// Which nodes read commands may be routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ReadFrom {
    Primary = 0,
    PreferReplica = 1,
    AzAffinity = 2,
    AzAffinityReplicasAndPrimary = 3,
}

/// RESP protocol revision to negotiate with the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProtocolVersion {
    Resp3 = 0,
    Resp2 = 1,
}

/// Exponential backoff parameters for the runtime's reconnection loop.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ConnectionRetryStrategy {
    #[prost(uint32, tag = "1")]
    pub number_of_retries: u32,
    #[prost(uint32, tag = "2")]
    pub factor: u32,
    #[prost(uint32, tag = "3")]
    pub exponent_base: u32,
}

/// Server credentials. An empty username means the default user.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AuthenticationInfo {
    #[prost(string, tag = "1")]
    pub username: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub password: ::prost::alloc::string::String,
}

/// Subscription mode for one channel set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum PubSubChannelType {
    Exact = 0,
    Pattern = 1,
    Sharded = 2,
}

/// Channels or patterns to subscribe for one [`PubSubChannelType`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PubSubChannelsOrPatterns {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub channels_or_patterns: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

/// Pub/sub subscriptions to establish on connect, keyed by
/// [`PubSubChannelType`] discriminant.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PubSubSubscriptions {
    #[prost(map = "uint32, message", tag = "1")]
    pub channels_or_patterns_by_type:
        ::std::collections::HashMap<u32, PubSubChannelsOrPatterns>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct PeriodicChecksManualInterval {
    /// Interval in seconds between topology checks.
    #[prost(uint32, tag = "1")]
    pub duration_in_sec: u32,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct PeriodicChecksDisabled {}

/// Session handshake: everything the runtime needs to establish and maintain
/// the server connection(s).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConnectionRequest {
    #[prost(message, repeated, tag = "1")]
    pub addresses: ::prost::alloc::vec::Vec<NodeAddress>,
    #[prost(enumeration = "TlsMode", tag = "2")]
    pub tls_mode: i32,
    #[prost(bool, tag = "3")]
    pub cluster_mode_enabled: bool,
    /// Per-request timeout in milliseconds, applied by the runtime.
    #[prost(uint32, tag = "4")]
    pub request_timeout: u32,
    #[prost(enumeration = "ReadFrom", tag = "5")]
    pub read_from: i32,
    #[prost(message, optional, tag = "6")]
    pub connection_retry_strategy: ::core::option::Option<ConnectionRetryStrategy>,
    #[prost(message, optional, tag = "7")]
    pub authentication_info: ::core::option::Option<AuthenticationInfo>,
    /// Standalone only; ignored in cluster mode.
    #[prost(uint32, tag = "8")]
    pub database_id: u32,
    #[prost(enumeration = "ProtocolVersion", tag = "9")]
    pub protocol: i32,
    #[prost(string, tag = "10")]
    pub client_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "11")]
    pub pubsub_subscriptions: ::core::option::Option<PubSubSubscriptions>,
    #[prost(oneof = "connection_request::PeriodicChecks", tags = "12, 13")]
    pub periodic_checks: ::core::option::Option<connection_request::PeriodicChecks>,
    /// IAM authentication is mutually exclusive with `authentication_info`.
    #[prost(bool, tag = "14")]
    pub use_iam_auth: bool,
}

pub mod connection_request {
    /// Cluster topology check policy. Absent means the runtime default.
    #[derive(Clone, Copy, PartialEq, ::prost::Oneof)]
    pub enum PeriodicChecks {
        #[prost(message, tag = "12")]
        PeriodicChecksManualInterval(super::PeriodicChecksManualInterval),
        #[prost(message, tag = "13")]
        PeriodicChecksDisabled(super::PeriodicChecksDisabled),
    }
}


/// Inline argument payload: the argument bytes travel inside the message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ArgsArray {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub args: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

/// One command: a request type plus its arguments, carried either inline or
/// as a runtime-owned pointer to a leaked byte-vector (large payloads).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Command {
    #[prost(enumeration = "RequestType", tag = "1")]
    pub request_type: i32,
    #[prost(oneof = "command::Args", tags = "2, 3")]
    pub args: ::core::option::Option<command::Args>,
}

pub mod command {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Args {
        #[prost(message, tag = "2")]
        ArgsArray(super::ArgsArray),
        /// Address of a `Vec<Vec<u8>>` leaked to the runtime; the runtime
        /// frees it.
        #[prost(uint64, tag = "3")]
        ArgsVecPointer(u64),
    }
}

/// Cluster routes addressable without a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SimpleRoutes {
    AllNodes = 0,
    AllPrimaries = 1,
    Random = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SlotTypes {
    Primary = 0,
    Replica = 1,
}

/// Route to the node serving the slot that a key hashes to.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SlotKeyRoute {
    #[prost(enumeration = "SlotTypes", tag = "1")]
    pub slot_type: i32,
    #[prost(string, tag = "2")]
    pub slot_key: ::prost::alloc::string::String,
}

/// Route to the node serving an explicit slot id.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct SlotIdRoute {
    #[prost(enumeration = "SlotTypes", tag = "1")]
    pub slot_type: i32,
    #[prost(int32, tag = "2")]
    pub slot_id: i32,
}

/// Route to one node by address.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ByAddressRoute {
    #[prost(string, tag = "1")]
    pub host: ::prost::alloc::string::String,
    #[prost(int32, tag = "2")]
    pub port: i32,
}

/// Which cluster node(s) should receive a command.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Routes {
    #[prost(oneof = "routes::Value", tags = "1, 2, 3, 4")]
    pub value: ::core::option::Option<routes::Value>,
}

pub mod routes {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(enumeration = "super::SimpleRoutes", tag = "1")]
        SimpleRoutes(i32),
        #[prost(message, tag = "2")]
        SlotKeyRoute(super::SlotKeyRoute),
        #[prost(message, tag = "3")]
        SlotIdRoute(super::SlotIdRoute),
        #[prost(message, tag = "4")]
        ByAddressRoute(super::ByAddressRoute),
    }
}

/// An ordered list of commands answered as one response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Batch {
    #[prost(message, repeated, tag = "1")]
    pub commands: ::prost::alloc::vec::Vec<Command>,
    /// Atomic batches run as a MULTI/EXEC transaction.
    #[prost(bool, tag = "2")]
    pub is_atomic: bool,
    /// When set, the first sub-error is re-raised instead of being embedded
    /// in the result list.
    #[prost(bool, tag = "3")]
    pub raise_on_error: bool,
    /// Batch-level timeout in milliseconds; absent means the runtime default.
    #[prost(uint32, optional, tag = "4")]
    pub timeout: ::core::option::Option<u32>,
    #[prost(bool, tag = "5")]
    pub retry_server_error: bool,
    #[prost(bool, tag = "6")]
    pub retry_connection_error: bool,
}

/// Script invocation with inline key and argument payloads.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ScriptInvocation {
    #[prost(string, tag = "1")]
    pub hash: ::prost::alloc::string::String,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub keys: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub args: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

/// Script invocation with both payload lists leaked to the runtime. Keys and
/// args always move to pointers together, never mixed with inline payloads.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ScriptInvocationPointers {
    #[prost(string, tag = "1")]
    pub hash: ::prost::alloc::string::String,
    #[prost(uint64, optional, tag = "2")]
    pub keys_pointer: ::core::option::Option<u64>,
    #[prost(uint64, optional, tag = "3")]
    pub args_pointer: ::core::option::Option<u64>,
}

/// One step of a cluster-wide SCAN. The cursor id is minted by the runtime;
/// `"0"` starts a new iteration.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClusterScan {
    #[prost(string, tag = "1")]
    pub cursor: ::prost::alloc::string::String,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub match_pattern: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    #[prost(int64, optional, tag = "3")]
    pub count: ::core::option::Option<i64>,
    #[prost(string, optional, tag = "4")]
    pub object_type: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(bool, tag = "5")]
    pub allow_non_covered_slots: bool,
}

/// Update the password used by the runtime's reconnection mechanism. Absent
/// password removes it.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateConnectionPassword {
    #[prost(string, optional, tag = "1")]
    pub password: ::core::option::Option<::prost::alloc::string::String>,
    /// Re-authenticate the live connection immediately instead of on the
    /// next reconnect.
    #[prost(bool, tag = "2")]
    pub immediate_auth: bool,
}

/// Empty marker: ask the runtime to refresh its IAM token now.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct RefreshIamToken {}

/// Envelope for everything the client asks of the runtime after the
/// handshake. `callback_idx` matches the eventual [`crate::Response`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandRequest {
    #[prost(uint32, tag = "1")]
    pub callback_idx: u32,
    #[prost(oneof = "command_request::Command", tags = "2, 3, 4, 5, 6, 7, 8")]
    pub command: ::core::option::Option<command_request::Command>,
    #[prost(message, optional, tag = "9")]
    pub route: ::core::option::Option<Routes>,
    /// Tracing span handle brackets the request; the runtime echoes it back
    /// on the response so the client can drop it.
    #[prost(uint64, optional, tag = "10")]
    pub root_span_ptr: ::core::option::Option<u64>,
}

pub mod command_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Command {
        #[prost(message, tag = "2")]
        SingleCommand(super::Command),
        #[prost(message, tag = "3")]
        Batch(super::Batch),
        #[prost(message, tag = "4")]
        ScriptInvocation(super::ScriptInvocation),
        #[prost(message, tag = "5")]
        ScriptInvocationPointers(super::ScriptInvocationPointers),
        #[prost(message, tag = "6")]
        ClusterScan(super::ClusterScan),
        #[prost(message, tag = "7")]
        UpdateConnectionPassword(super::UpdateConnectionPassword),
        #[prost(message, tag = "8")]
        RefreshIamToken(super::RefreshIamToken),
    }
}


/// Request-level failure kinds reported by the runtime. Stable wire values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RequestErrorType {
    /// Any per-request failure that fits no other kind.
    Unspecified = 0,
    /// The connection to the server dropped while the request was in flight.
    Disconnect = 1,
    /// A transaction was aborted server-side (e.g. a watched key changed).
    ExecAbort = 2,
    /// The runtime's per-request timeout elapsed.
    Timeout = 3,
}

/// A typed per-request error.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestError {
    #[prost(enumeration = "RequestErrorType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

/// Acknowledgment sentinels that need no value payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ConstantResponse {
    Ok = 0,
}

/// One response frame. Exactly one of the `value` branches is present; an
/// absent branch means a null result. `is_push` marks unsolicited
/// notifications, which route to the push channel instead of a callback slot.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Response {
    #[prost(uint32, tag = "1")]
    pub callback_idx: u32,
    #[prost(oneof = "response::Value", tags = "2, 3, 4, 5")]
    pub value: ::core::option::Option<response::Value>,
    #[prost(bool, tag = "6")]
    pub is_push: bool,
    /// Span handle carried by the originating request, echoed back so the
    /// client drops it.
    #[prost(uint64, optional, tag = "7")]
    pub root_span_ptr: ::core::option::Option<u64>,
}

pub mod response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        /// Fatal: the session is terminal after this.
        #[prost(string, tag = "2")]
        ClosingError(::prost::alloc::string::String),
        #[prost(message, tag = "3")]
        RequestError(super::RequestError),
        /// Opaque handle into runtime memory; decoded (and consumed) by
        /// `value_from_pointer`.
        #[prost(uint64, tag = "4")]
        RespPointer(u64),
        #[prost(enumeration = "super::ConstantResponse", tag = "5")]
        ConstantResponse(i32),
    }
}

impl Response {
    /// Whether this response carries a fatal closing error.
    pub fn is_closing_error(&self) -> bool {
        matches!(self.value, Some(response::Value::ClosingError(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_error_type_values_are_stable() {
        assert_eq!(RequestErrorType::Unspecified as i32, 0);
        assert_eq!(RequestErrorType::Disconnect as i32, 1);
        assert_eq!(RequestErrorType::ExecAbort as i32, 2);
        assert_eq!(RequestErrorType::Timeout as i32, 3);
    }

    #[test]
    fn request_error_type_roundtrip() {
        for kind in [
            RequestErrorType::Unspecified,
            RequestErrorType::Disconnect,
            RequestErrorType::ExecAbort,
            RequestErrorType::Timeout,
        ] {
            assert_eq!(RequestErrorType::try_from(kind as i32).unwrap(), kind);
        }
        assert!(RequestErrorType::try_from(99).is_err());
    }

    #[test]
    fn absent_value_branch_means_null() {
        let resp = Response {
            callback_idx: 7,
            value: None,
            is_push: false,
            root_span_ptr: None,
        };
        assert!(!resp.is_closing_error());
        assert!(resp.value.is_none());
    }
}
