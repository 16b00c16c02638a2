//! # Message Definitions
//!
//! Every message kind in the catalog, plus the `NetMessage` envelope that
//! pairs a body with its avatar id.

use super::catalog::{Delivery, MessageId};
use super::error::{CodecError, CodecResult};
use super::stream::{ReadStream, Stream, WriteStream};
use crate::ids::RemoteAvatarId;
use crate::math::Transform;
use crate::{MAX_CHAT_LEN, MAX_NICKNAME_LEN};

/// A message body with a fixed serialization contract.
pub trait Message: Clone + Default + PartialEq + std::fmt::Debug {
    /// Catalog id.
    const ID: MessageId;

    /// Symmetric encode/decode.
    ///
    /// # Errors
    ///
    /// Propagates stream errors (buffer full, truncated input, bad strings).
    fn serialize<S: Stream>(&mut self, stream: &mut S) -> CodecResult<()>;

    /// Structural sanity check run immediately after decode.
    fn is_valid(&self) -> bool {
        true
    }
}

/// An avatar became relevant to the receiver.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AvatarSpawn {
    /// Model/appearance profile to spawn with. Never zero.
    pub spawn_profile: u64,
}

impl Message for AvatarSpawn {
    const ID: MessageId = MessageId::AvatarSpawn;

    fn serialize<S: Stream>(&mut self, stream: &mut S) -> CodecResult<()> {
        stream.serialize_u64(&mut self.spawn_profile)
    }

    fn is_valid(&self) -> bool {
        self.spawn_profile != 0
    }
}

/// An avatar is gone for the receiver. The id travels in the envelope.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AvatarDespawn;

impl Message for AvatarDespawn {
    const ID: MessageId = MessageId::AvatarDespawn;

    fn serialize<S: Stream>(&mut self, _stream: &mut S) -> CodecResult<()> {
        Ok(())
    }
}

/// Transform sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AvatarUpdate {
    /// Position and orientation.
    pub transform: Transform,
}

impl Message for AvatarUpdate {
    const ID: MessageId = MessageId::AvatarUpdate;

    fn serialize<S: Stream>(&mut self, stream: &mut S) -> CodecResult<()> {
        stream.serialize_transform(&mut self.transform)
    }

    fn is_valid(&self) -> bool {
        self.transform.is_well_formed()
    }
}

/// Out-of-band metadata refresh (e.g. re-skin). Never carries a transform.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AvatarSelfUpdate {
    /// New spawn profile. Never zero.
    pub spawn_profile: u64,
}

impl Message for AvatarSelfUpdate {
    const ID: MessageId = MessageId::AvatarSelfUpdate;

    fn serialize<S: Stream>(&mut self, stream: &mut S) -> CodecResult<()> {
        stream.serialize_u64(&mut self.spawn_profile)
    }

    fn is_valid(&self) -> bool {
        self.spawn_profile != 0
    }
}

/// Tells a connection which avatar is its own. Sent before that avatar's spawn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AvatarAssign;

impl Message for AvatarAssign {
    const ID: MessageId = MessageId::AvatarAssign;

    fn serialize<S: Stream>(&mut self, _stream: &mut S) -> CodecResult<()> {
        Ok(())
    }
}

/// True for a nickname that fits a chat sender field: not blank and at most
/// [`MAX_NICKNAME_LEN`] bytes.
#[must_use]
pub fn is_valid_nickname(nickname: &str) -> bool {
    !nickname.trim().is_empty() && nickname.len() <= MAX_NICKNAME_LEN
}

/// Chat line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatMessage {
    /// Sender nickname.
    pub sender: String,
    /// Message text.
    pub text: String,
}

impl Message for ChatMessage {
    const ID: MessageId = MessageId::Chat;

    fn serialize<S: Stream>(&mut self, stream: &mut S) -> CodecResult<()> {
        stream.serialize_string(&mut self.sender, MAX_NICKNAME_LEN)?;
        stream.serialize_string(&mut self.text, MAX_CHAT_LEN)
    }

    fn is_valid(&self) -> bool {
        is_valid_nickname(&self.sender) && !self.text.trim().is_empty()
    }
}

/// Weather kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Weather {
    /// Clear sky.
    Clear = 0,
    /// Overcast.
    Clouds = 1,
    /// Rain.
    Rain = 2,
    /// Thunderstorm.
    Thunder = 3,
    /// Fog.
    Fog = 4,
    /// Snow.
    Snow = 5,
}

impl Weather {
    /// Converts from the wire byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Clear),
            1 => Some(Self::Clouds),
            2 => Some(Self::Rain),
            3 => Some(Self::Thunder),
            4 => Some(Self::Fog),
            5 => Some(Self::Snow),
            _ => None,
        }
    }
}

/// World-wide environment state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldState {
    /// Raw weather byte; see [`WorldState::weather`].
    pub weather: u8,
    /// Hours since midnight, `[0, 24)`.
    pub time_of_day: f32,
}

impl WorldState {
    /// Creates a world state.
    #[must_use]
    pub fn new(weather: Weather, time_of_day: f32) -> Self {
        Self {
            weather: weather as u8,
            time_of_day,
        }
    }

    /// Decoded weather, if the byte is known.
    #[must_use]
    pub const fn weather(&self) -> Option<Weather> {
        Weather::from_u8(self.weather)
    }
}

impl Message for WorldState {
    const ID: MessageId = MessageId::WorldState;

    fn serialize<S: Stream>(&mut self, stream: &mut S) -> CodecResult<()> {
        stream.serialize_u8(&mut self.weather)?;
        stream.serialize_f32(&mut self.time_of_day)
    }

    fn is_valid(&self) -> bool {
        self.weather().is_some() && (0.0..24.0).contains(&self.time_of_day)
    }
}

/// A decoded message with its envelope.
#[derive(Clone, Debug, PartialEq)]
pub enum NetMessage {
    /// Avatar spawn.
    AvatarSpawn(RemoteAvatarId, AvatarSpawn),
    /// Avatar despawn.
    AvatarDespawn(RemoteAvatarId),
    /// Avatar transform sample.
    AvatarUpdate(RemoteAvatarId, AvatarUpdate),
    /// Avatar metadata refresh.
    AvatarSelfUpdate(RemoteAvatarId, AvatarSelfUpdate),
    /// Local-avatar designation.
    AvatarAssign(RemoteAvatarId),
    /// Chat line.
    Chat(ChatMessage),
    /// Environment state.
    WorldState(WorldState),
}

impl NetMessage {
    /// Returns the catalog id.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        match self {
            Self::AvatarSpawn(..) => MessageId::AvatarSpawn,
            Self::AvatarDespawn(..) => MessageId::AvatarDespawn,
            Self::AvatarUpdate(..) => MessageId::AvatarUpdate,
            Self::AvatarSelfUpdate(..) => MessageId::AvatarSelfUpdate,
            Self::AvatarAssign(..) => MessageId::AvatarAssign,
            Self::Chat(..) => MessageId::Chat,
            Self::WorldState(..) => MessageId::WorldState,
        }
    }

    /// Returns the envelope avatar id, if this kind carries one.
    #[must_use]
    pub const fn avatar_id(&self) -> Option<RemoteAvatarId> {
        match self {
            Self::AvatarSpawn(id, _)
            | Self::AvatarDespawn(id)
            | Self::AvatarUpdate(id, _)
            | Self::AvatarSelfUpdate(id, _)
            | Self::AvatarAssign(id) => Some(*id),
            Self::Chat(_) | Self::WorldState(_) => None,
        }
    }

    /// Lane the transport should use.
    #[must_use]
    pub const fn delivery(&self) -> Delivery {
        self.id().delivery()
    }

    /// Envelope and body structural check.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if self.avatar_id().is_some_and(RemoteAvatarId::is_null) {
            return false;
        }
        match self {
            Self::AvatarSpawn(_, body) => body.is_valid(),
            Self::AvatarDespawn(_) => AvatarDespawn.is_valid(),
            Self::AvatarUpdate(_, body) => body.is_valid(),
            Self::AvatarSelfUpdate(_, body) => body.is_valid(),
            Self::AvatarAssign(_) => AvatarAssign.is_valid(),
            Self::Chat(body) => body.is_valid(),
            Self::WorldState(body) => body.is_valid(),
        }
    }

    /// Encodes into `stream`, which is reset first.
    ///
    /// # Errors
    ///
    /// `Invalid` for a message that would be dropped on the other side,
    /// otherwise stream errors.
    pub fn write_to(&self, stream: &mut WriteStream) -> CodecResult<()> {
        if !self.is_valid() {
            return Err(CodecError::Invalid(self.id()));
        }
        stream.reset();
        let mut raw = self.id() as u8;
        stream.serialize_u8(&mut raw)?;
        if let Some(id) = self.avatar_id() {
            let mut server_id = id.0;
            stream.serialize_u64(&mut server_id)?;
        }
        match self {
            Self::AvatarSpawn(_, body) => write_body(stream, body),
            Self::AvatarDespawn(_) => write_body(stream, &AvatarDespawn),
            Self::AvatarUpdate(_, body) => write_body(stream, body),
            Self::AvatarSelfUpdate(_, body) => write_body(stream, body),
            Self::AvatarAssign(_) => write_body(stream, &AvatarAssign),
            Self::Chat(body) => write_body(stream, body),
            Self::WorldState(body) => write_body(stream, body),
        }
    }

    /// Encodes into a fresh byte vector.
    ///
    /// # Errors
    ///
    /// See [`NetMessage::write_to`].
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut stream = WriteStream::new();
        self.write_to(&mut stream)?;
        Ok(stream.as_slice().to_vec())
    }

    /// Decodes and validates one message occupying all of `bytes`.
    ///
    /// # Errors
    ///
    /// Unknown id, truncated or oversized input, or a failed `is_valid`.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut stream = ReadStream::new(bytes);
        let mut raw = 0u8;
        stream.serialize_u8(&mut raw)?;
        let kind = MessageId::from_u8(raw).ok_or(CodecError::UnknownMessage(raw))?;

        let mut server_id = 0u64;
        if kind.carries_avatar_id() {
            stream.serialize_u64(&mut server_id)?;
        }
        let id = RemoteAvatarId(server_id);

        let message = match kind {
            MessageId::AvatarSpawn => Self::AvatarSpawn(id, read_body(&mut stream)?),
            MessageId::AvatarDespawn => {
                read_body::<AvatarDespawn>(&mut stream)?;
                Self::AvatarDespawn(id)
            }
            MessageId::AvatarUpdate => Self::AvatarUpdate(id, read_body(&mut stream)?),
            MessageId::AvatarSelfUpdate => Self::AvatarSelfUpdate(id, read_body(&mut stream)?),
            MessageId::AvatarAssign => {
                read_body::<AvatarAssign>(&mut stream)?;
                Self::AvatarAssign(id)
            }
            MessageId::Chat => Self::Chat(read_body(&mut stream)?),
            MessageId::WorldState => Self::WorldState(read_body(&mut stream)?),
        };

        if stream.remaining() != 0 {
            return Err(CodecError::TrailingBytes(stream.remaining()));
        }
        if !message.is_valid() {
            return Err(CodecError::Invalid(kind));
        }
        Ok(message)
    }
}

fn write_body<M: Message>(stream: &mut WriteStream, body: &M) -> CodecResult<()> {
    let mut copy = body.clone();
    copy.serialize(stream)
}

fn read_body<M: Message>(stream: &mut ReadStream<'_>) -> CodecResult<M> {
    let mut body = M::default();
    body.serialize(stream)?;
    Ok(body)
}
