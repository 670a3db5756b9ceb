//! Client configuration and its translation to the handshake message.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use kestrel_proto as proto;

use crate::push::PubSubMessage;

/// One seed address of the server (or cluster).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Username/password credentials. An absent username means the default user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerCredentials {
    pub username: Option<String>,
    pub password: String,
}

impl ServerCredentials {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            username: None,
            password: password.into(),
        }
    }

    pub fn with_username(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: password.into(),
        }
    }
}

/// Exponential backoff for the runtime's reconnection loop: retry `i` waits
/// `factor * exponent_base^i` milliseconds, capped at `number_of_retries`
/// growth steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffStrategy {
    pub number_of_retries: u32,
    pub factor: u32,
    pub exponent_base: u32,
}

/// Which nodes read commands may be routed to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadFrom {
    #[default]
    Primary,
    PreferReplica,
    AzAffinity,
    AzAffinityReplicasAndPrimary,
}

/// RESP protocol revision to negotiate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProtocolVersion {
    #[default]
    Resp3,
    Resp2,
}

/// Cluster topology check policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PeriodicChecks {
    /// The runtime's default interval.
    #[default]
    Default,
    /// A fixed interval in seconds.
    ManualInterval(u32),
    Disabled,
}

/// Subscription mode for one channel set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PubSubChannelMode {
    Exact,
    Pattern,
    Sharded,
}

impl PubSubChannelMode {
    fn to_protobuf(self) -> proto::PubSubChannelType {
        match self {
            PubSubChannelMode::Exact => proto::PubSubChannelType::Exact,
            PubSubChannelMode::Pattern => proto::PubSubChannelType::Pattern,
            PubSubChannelMode::Sharded => proto::PubSubChannelType::Sharded,
        }
    }
}

/// Push-notification callback. Runs synchronously on the reader task and
/// therefore must not block.
pub type PubSubCallback = Arc<dyn Fn(PubSubMessage) + Send + Sync>;

/// Pub/sub subscriptions to establish on connect.
///
/// With a callback, every incoming message is delivered to it; without one,
/// messages queue up for `get_pubsub_message` / `try_get_pubsub_message`.
#[derive(Clone, Default)]
pub struct PubSubSubscriptions {
    pub channels_and_patterns: HashMap<PubSubChannelMode, HashSet<Vec<u8>>>,
    pub callback: Option<PubSubCallback>,
}

impl std::fmt::Debug for PubSubSubscriptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSubSubscriptions")
            .field("channels_and_patterns", &self.channels_and_patterns)
            .field("callback", &self.callback.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Everything needed to create a client.
#[derive(Clone, Debug, Default)]
pub struct ClientConfig {
    pub addresses: Vec<NodeAddress>,
    pub use_tls: bool,
    pub credentials: Option<ServerCredentials>,
    /// IAM authentication; mutually exclusive with `credentials`.
    pub use_iam_auth: bool,
    /// Standalone only; ignored in cluster mode.
    pub database_id: u32,
    pub reconnect_strategy: Option<BackoffStrategy>,
    pub read_from: ReadFrom,
    /// Per-request timeout in milliseconds, applied by the runtime. Absent
    /// means the runtime default.
    pub request_timeout: Option<u32>,
    pub client_name: Option<String>,
    pub protocol: ProtocolVersion,
    /// Cluster mode only.
    pub periodic_checks: PeriodicChecks,
    pub pubsub_subscriptions: Option<PubSubSubscriptions>,
}

impl ClientConfig {
    pub(crate) fn is_pubsub_configured(&self) -> bool {
        self.pubsub_subscriptions.is_some()
    }

    pub(crate) fn pubsub_callback(&self) -> Option<PubSubCallback> {
        self.pubsub_subscriptions
            .as_ref()
            .and_then(|subs| subs.callback.clone())
    }

    /// Build the handshake message.
    pub(crate) fn to_connection_request(&self, cluster_mode: bool) -> proto::ConnectionRequest {
        let tls_mode = if self.use_tls {
            proto::TlsMode::SecureTls
        } else {
            proto::TlsMode::NoTls
        };
        let read_from = match self.read_from {
            ReadFrom::Primary => proto::ReadFrom::Primary,
            ReadFrom::PreferReplica => proto::ReadFrom::PreferReplica,
            ReadFrom::AzAffinity => proto::ReadFrom::AzAffinity,
            ReadFrom::AzAffinityReplicasAndPrimary => {
                proto::ReadFrom::AzAffinityReplicasAndPrimary
            }
        };
        let protocol = match self.protocol {
            ProtocolVersion::Resp3 => proto::ProtocolVersion::Resp3,
            ProtocolVersion::Resp2 => proto::ProtocolVersion::Resp2,
        };

        let periodic_checks = match (cluster_mode, self.periodic_checks) {
            (false, _) | (true, PeriodicChecks::Default) => None,
            (true, PeriodicChecks::ManualInterval(duration_in_sec)) => Some(
                proto::connection_request::PeriodicChecks::PeriodicChecksManualInterval(
                    proto::PeriodicChecksManualInterval { duration_in_sec },
                ),
            ),
            (true, PeriodicChecks::Disabled) => Some(
                proto::connection_request::PeriodicChecks::PeriodicChecksDisabled(
                    proto::PeriodicChecksDisabled {},
                ),
            ),
        };

        let pubsub_subscriptions = self.pubsub_subscriptions.as_ref().map(|subs| {
            let mut by_type = HashMap::new();
            for (mode, channels) in &subs.channels_and_patterns {
                by_type.insert(
                    mode.to_protobuf() as u32,
                    proto::PubSubChannelsOrPatterns {
                        channels_or_patterns: channels.iter().cloned().collect(),
                    },
                );
            }
            proto::PubSubSubscriptions {
                channels_or_patterns_by_type: by_type,
            }
        });

        proto::ConnectionRequest {
            addresses: self
                .addresses
                .iter()
                .map(|addr| proto::NodeAddress {
                    host: addr.host.clone(),
                    port: u32::from(addr.port),
                })
                .collect(),
            tls_mode: tls_mode as i32,
            cluster_mode_enabled: cluster_mode,
            request_timeout: self.request_timeout.unwrap_or(0),
            read_from: read_from as i32,
            connection_retry_strategy: self.reconnect_strategy.map(|strategy| {
                proto::ConnectionRetryStrategy {
                    number_of_retries: strategy.number_of_retries,
                    factor: strategy.factor,
                    exponent_base: strategy.exponent_base,
                }
            }),
            authentication_info: self.credentials.as_ref().map(|creds| {
                proto::AuthenticationInfo {
                    username: creds.username.clone().unwrap_or_default(),
                    password: creds.password.clone(),
                }
            }),
            database_id: if cluster_mode { 0 } else { self.database_id },
            protocol: protocol as i32,
            client_name: self.client_name.clone().unwrap_or_default(),
            pubsub_subscriptions,
            periodic_checks,
            use_iam_auth: self.use_iam_auth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ClientConfig {
        ClientConfig {
            addresses: vec![NodeAddress::new("localhost", 6379)],
            ..Default::default()
        }
    }

    #[test]
    fn defaults_translate_to_minimal_handshake() {
        let request = base_config().to_connection_request(false);
        assert_eq!(request.addresses.len(), 1);
        assert_eq!(request.tls_mode, proto::TlsMode::NoTls as i32);
        assert!(!request.cluster_mode_enabled);
        assert_eq!(request.database_id, 0);
        assert!(request.authentication_info.is_none());
        assert!(request.pubsub_subscriptions.is_none());
        assert!(request.periodic_checks.is_none());
    }

    #[test]
    fn credentials_and_database_carry_over() {
        let mut config = base_config();
        config.credentials = Some(ServerCredentials::with_username("user1", "passwordA"));
        config.database_id = 3;
        config.use_tls = true;

        let request = config.to_connection_request(false);
        let auth = request.authentication_info.unwrap();
        assert_eq!(auth.username, "user1");
        assert_eq!(auth.password, "passwordA");
        assert_eq!(request.database_id, 3);
        assert_eq!(request.tls_mode, proto::TlsMode::SecureTls as i32);
    }

    #[test]
    fn database_id_is_standalone_only() {
        let mut config = base_config();
        config.database_id = 5;
        let request = config.to_connection_request(true);
        assert_eq!(request.database_id, 0);
        assert!(request.cluster_mode_enabled);
    }

    #[test]
    fn subscriptions_group_by_mode() {
        let mut config = base_config();
        let mut channels = HashMap::new();
        channels.insert(
            PubSubChannelMode::Exact,
            HashSet::from([b"updates".to_vec()]),
        );
        channels.insert(
            PubSubChannelMode::Pattern,
            HashSet::from([b"news.*".to_vec()]),
        );
        config.pubsub_subscriptions = Some(PubSubSubscriptions {
            channels_and_patterns: channels,
            callback: None,
        });

        let request = config.to_connection_request(true);
        let subs = request.pubsub_subscriptions.unwrap();
        assert_eq!(subs.channels_or_patterns_by_type.len(), 2);
        let exact = &subs.channels_or_patterns_by_type
            [&(proto::PubSubChannelType::Exact as u32)];
        assert_eq!(exact.channels_or_patterns, vec![b"updates".to_vec()]);
    }

    #[test]
    fn periodic_checks_only_in_cluster_mode() {
        let mut config = base_config();
        config.periodic_checks = PeriodicChecks::ManualInterval(30);
        assert!(config.to_connection_request(false).periodic_checks.is_none());
        assert!(matches!(
            config.to_connection_request(true).periodic_checks,
            Some(proto::connection_request::PeriodicChecks::PeriodicChecksManualInterval(
                interval
            )) if interval.duration_in_sec == 30
        ));
    }
}
