//! # Message Channel
//!
//! Typed, versioned message catalog shared by client and server.
//!
//! ## Envelope
//!
//! ```text
//! ┌───────────────┬──────────────────────────┬──────────────────────────┐
//! │ MessageId (1) │ ServerId (8, avatar kinds)│ Payload (per message)    │
//! └───────────────┴──────────────────────────┴──────────────────────────┘
//! ```
//!
//! All integers and floats are little-endian. Strings are a `u16` length
//! followed by UTF-8 bytes.
//!
//! ## Contract
//!
//! - One symmetric `serialize` routine per message drives both encode and decode
//! - `is_valid` runs right after decode; invalid messages never reach a handler
//! - Handlers are looked up in an explicit id → handler map built at startup

mod catalog;
mod dispatch;
mod error;
mod messages;
mod stream;

pub use catalog::{Delivery, MessageId};
pub use dispatch::{DispatchOutcome, Dispatcher, Handler};
pub use error::{CodecError, CodecResult};
pub use messages::{
    AvatarAssign, AvatarDespawn, AvatarSelfUpdate, AvatarSpawn, AvatarUpdate, ChatMessage,
    Message, NetMessage, Weather, WorldState, is_valid_nickname,
};
pub use stream::{ReadStream, Stream, WriteStream};
