//! # TETHER Shared
//!
//! Types both the replication server and its clients must agree on.
//!
//! ## Contents
//!
//! - [`math`]: `Vec3`, `Quaternion` and `Transform`, the value types that
//!   cross the wire by copy
//! - [`ids`]: `RemoteAvatarId` and `ConnectionId`
//! - [`protocol`]: the message catalog, the symmetric stream codec and the
//!   handler dispatcher
//!
//! ## Rule
//!
//! This crate must NEVER depend on entity storage or on a transport.
//! Both sides link it; neither side's internals belong here.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod math;
pub mod protocol;

pub use constants::{DEFAULT_COMPENSATION_FACTOR, MAX_CHAT_LEN, MAX_NICKNAME_LEN, MAX_PACKET_SIZE, TICK_RATE};
pub use ids::{ConnectionId, RemoteAvatarId};
pub use math::{Quaternion, Transform, Vec3};
pub use protocol::{
    CodecError, CodecResult, Delivery, Dispatcher, MessageId, NetMessage, ReadStream, Stream,
    WriteStream,
};
