//! Cluster routing metadata attached to individual commands.

use kestrel_proto as proto;

/// Whether a slot route targets the primary or a replica.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotType {
    Primary,
    Replica,
}

impl SlotType {
    fn to_protobuf(self) -> proto::SlotTypes {
        match self {
            SlotType::Primary => proto::SlotTypes::Primary,
            SlotType::Replica => proto::SlotTypes::Replica,
        }
    }
}

/// Which cluster node(s) should receive a command. Absent route lets the
/// runtime pick based on the command's keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    AllNodes,
    AllPrimaries,
    Random,
    /// The node serving the slot that `slot_key` hashes to.
    SlotKey { slot_type: SlotType, slot_key: String },
    /// The node serving an explicit slot id.
    SlotId { slot_type: SlotType, slot_id: i32 },
    /// One node, by address.
    ByAddress { host: String, port: i32 },
}

impl Route {
    pub(crate) fn to_protobuf(&self) -> proto::Routes {
        let value = match self {
            Route::AllNodes => {
                proto::routes::Value::SimpleRoutes(proto::SimpleRoutes::AllNodes as i32)
            }
            Route::AllPrimaries => {
                proto::routes::Value::SimpleRoutes(proto::SimpleRoutes::AllPrimaries as i32)
            }
            Route::Random => {
                proto::routes::Value::SimpleRoutes(proto::SimpleRoutes::Random as i32)
            }
            Route::SlotKey {
                slot_type,
                slot_key,
            } => proto::routes::Value::SlotKeyRoute(proto::SlotKeyRoute {
                slot_type: slot_type.to_protobuf() as i32,
                slot_key: slot_key.clone(),
            }),
            Route::SlotId { slot_type, slot_id } => {
                proto::routes::Value::SlotIdRoute(proto::SlotIdRoute {
                    slot_type: slot_type.to_protobuf() as i32,
                    slot_id: *slot_id,
                })
            }
            Route::ByAddress { host, port } => {
                proto::routes::Value::ByAddressRoute(proto::ByAddressRoute {
                    host: host.clone(),
                    port: *port,
                })
            }
        };
        proto::Routes { value: Some(value) }
    }
}

/// Attach a route to an outgoing request, if one was given.
pub(crate) fn set_protobuf_route(
    request: &mut proto::CommandRequest,
    route: Option<&Route>,
) {
    request.route = route.map(Route::to_protobuf);
}
