//! # Protocol Constants
//!
//! Values baked into both binaries. Changing any of them is a protocol break.

/// Default simulation and send rate (updates per second).
pub const TICK_RATE: u32 = 60;

/// Maximum encoded message size (MTU-safe).
pub const MAX_PACKET_SIZE: usize = 1200;

/// Maximum chat text length in bytes.
pub const MAX_CHAT_LEN: usize = 256;

/// Maximum nickname length in bytes.
pub const MAX_NICKNAME_LEN: usize = 32;

/// Default blend overshoot used to hide one tick of network delay.
pub const DEFAULT_COMPENSATION_FACTOR: f32 = 1.5;
