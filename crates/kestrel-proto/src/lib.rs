#![deny(unsafe_code)]

//! Wire types for the kestrel IPC protocol.
//!
//! Three top-level messages travel over the Unix socket, each framed with a
//! varint length prefix (see `kestrel-codec`):
//!
//! - [`ConnectionRequest`] — sent once per session as the handshake.
//! - [`CommandRequest`] — everything the client asks of the runtime after
//!   the handshake: single commands, batches, script invocations, cluster
//!   scans, password updates and token refreshes.
//! - [`Response`] — the runtime's answer, matched back to its request by
//!   `callback_idx`, or an unsolicited push notification (`is_push`).
//!
//! The messages are hand-derived `prost` structs so the crate carries no
//! build-time protoc dependency; tags are part of the wire contract and must
//! not be renumbered.

mod messages;
mod request_type;

pub use messages::*;
pub use request_type::RequestType;
