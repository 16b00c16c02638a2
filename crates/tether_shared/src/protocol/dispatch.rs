//! # Handler Dispatch
//!
//! Explicit `MessageId -> Handler` registry built once at startup.
//! No global registration, no ordering dependencies.

use super::catalog::MessageId;
use super::error::CodecError;
use super::messages::NetMessage;
use std::collections::HashMap;
use std::fmt::Debug;

/// Message handler.
///
/// `C` is the explicit context the handler mutates, `O` identifies where the
/// message came from (a connection id on the server, `()` on the client).
pub type Handler<C, O> = fn(&mut C, O, NetMessage);

/// What happened to one inbound buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Decoded, validated and handed to its handler.
    Handled(MessageId),
    /// Failed decode or validation; no handler ran.
    Malformed(CodecError),
    /// Well-formed, but nothing is registered for this id here.
    Unhandled(MessageId),
}

/// Id-keyed handler table.
pub struct Dispatcher<C, O> {
    handlers: HashMap<MessageId, Handler<C, O>>,
}

impl<C, O: Copy + Debug> Dispatcher<C, O> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::with_capacity(MessageId::ALL.len()),
        }
    }

    /// Registers `handler` for `id`, builder style. Replaces any earlier entry.
    #[must_use]
    pub fn with(mut self, id: MessageId, handler: Handler<C, O>) -> Self {
        self.handlers.insert(id, handler);
        self
    }

    /// Returns true if `id` has a handler.
    #[must_use]
    pub fn is_registered(&self, id: MessageId) -> bool {
        self.handlers.contains_key(&id)
    }

    /// Decodes `bytes` and runs the matching handler.
    ///
    /// Malformed and unhandled input is logged at debug level and dropped.
    pub fn dispatch(&self, ctx: &mut C, origin: O, bytes: &[u8]) -> DispatchOutcome {
        match NetMessage::decode(bytes) {
            Ok(message) => self.dispatch_message(ctx, origin, message),
            Err(error) => {
                tracing::debug!("Dropping malformed message from {:?}: {}", origin, error);
                DispatchOutcome::Malformed(error)
            }
        }
    }

    /// Runs the handler for an already-decoded message.
    pub fn dispatch_message(&self, ctx: &mut C, origin: O, message: NetMessage) -> DispatchOutcome {
        let id = message.id();
        match self.handlers.get(&id) {
            Some(handler) => {
                handler(ctx, origin, message);
                DispatchOutcome::Handled(id)
            }
            None => {
                tracing::debug!("No handler for {:?} from {:?}, dropping", id, origin);
                DispatchOutcome::Unhandled(id)
            }
        }
    }
}

impl<C, O: Copy + Debug> Default for Dispatcher<C, O> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RemoteAvatarId;
    use crate::protocol::messages::AvatarSpawn;

    #[derive(Default)]
    struct Counter {
        spawns: u32,
        despawns: u32,
    }

    fn on_spawn(ctx: &mut Counter, _origin: (), _message: NetMessage) {
        ctx.spawns += 1;
    }

    fn on_despawn(ctx: &mut Counter, _origin: (), _message: NetMessage) {
        ctx.despawns += 1;
    }

    #[test]
    fn test_routes_by_id() {
        let dispatcher = Dispatcher::<Counter, ()>::new()
            .with(MessageId::AvatarSpawn, on_spawn)
            .with(MessageId::AvatarDespawn, on_despawn);
        let mut ctx = Counter::default();

        let bytes = NetMessage::AvatarSpawn(RemoteAvatarId(1), AvatarSpawn { spawn_profile: 2 })
            .encode()
            .unwrap();
        assert_eq!(
            dispatcher.dispatch(&mut ctx, (), &bytes),
            DispatchOutcome::Handled(MessageId::AvatarSpawn)
        );
        assert_eq!(ctx.spawns, 1);
        assert_eq!(ctx.despawns, 0);
    }

    #[test]
    fn test_malformed_never_reaches_handler() {
        let dispatcher = Dispatcher::<Counter, ()>::new().with(MessageId::AvatarSpawn, on_spawn);
        let mut ctx = Counter::default();

        let mut bytes = vec![MessageId::AvatarSpawn as u8];
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());

        let outcome = dispatcher.dispatch(&mut ctx, (), &bytes);
        assert!(matches!(outcome, DispatchOutcome::Malformed(CodecError::Invalid(_))));
        assert_eq!(ctx.spawns, 0);
    }

    #[test]
    fn test_unregistered_id_is_dropped() {
        let dispatcher: Dispatcher<Counter, ()> = Dispatcher::new();
        let mut ctx = Counter::default();
        let bytes = NetMessage::AvatarDespawn(RemoteAvatarId(4)).encode().unwrap();
        assert_eq!(
            dispatcher.dispatch(&mut ctx, (), &bytes),
            DispatchOutcome::Unhandled(MessageId::AvatarDespawn)
        );
        assert!(!dispatcher.is_registered(MessageId::AvatarDespawn));
    }
}
