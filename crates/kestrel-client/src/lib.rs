//! Asynchronous multiplexed client engine for the Valkey/Redis wire
//! protocol.
//!
//! A [`Client`] (or [`ClusterClient`]) bridges the typed command surface to a
//! background networking runtime over a Unix-domain socket carrying
//! length-delimited protobuf frames. Requests are multiplexed through
//! callback slots, so any number of tasks can issue commands concurrently on
//! one session; pub/sub traffic arrives on a separate push channel with
//! either callback or pull delivery.
//!
//! ```ignore
//! use kestrel_client::prelude::*;
//!
//! let config = ClientConfig {
//!     addresses: vec![NodeAddress::new("localhost", 6379)],
//!     ..Default::default()
//! };
//! let client = Client::create(config).await?;
//! client.set("key", "value").await?;
//! let value = client.get("key").await?;
//! ```

mod client;
mod commands;
mod config;
mod errors;
mod logger;
mod mux;
mod otel;
mod push;
mod routes;
mod session;

pub use client::{Client, ClusterClient, ObjectType};
pub use commands::Batch;
pub use config::{
    BackoffStrategy, ClientConfig, NodeAddress, PeriodicChecks, ProtocolVersion,
    PubSubCallback, PubSubChannelMode, PubSubSubscriptions, ReadFrom, ServerCredentials,
};
pub use errors::{Error, RequestErrorKind};
pub use logger::{Level, Logger};
pub use otel::{
    OpenTelemetry, OpenTelemetryConfig, OpenTelemetryMetricsConfig, OpenTelemetryTracesConfig,
};
pub use push::PubSubMessage;
pub use routes::{Route, SlotType};

// Re-exported so command wrappers and callers share one set of value and
// request-type definitions.
pub use kestrel_proto::RequestType;
pub use kestrel_runtime::{ClusterScanCursor, PushKind, Value};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use kestrel_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Batch, Client, ClientConfig, ClusterClient, ClusterScanCursor, Error, NodeAddress,
        PubSubMessage, RequestType, Route, ServerCredentials, Value,
    };
}
