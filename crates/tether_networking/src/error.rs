//! # Error Types
//!
//! Only two things in this crate can fail in a way a caller sees: loading
//! configuration and establishing a connection. Per-message failures are
//! dropped inside their handler and never become an `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// Why a connection attempt did not produce a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// Nothing is listening at the address.
    #[error("no server reachable at {host}:{port}")]
    Unreachable {
        /// Requested host.
        host: String,
        /// Requested port.
        port: u16,
    },

    /// The server dropped the link before assigning an avatar.
    #[error("server refused the connection: {0}")]
    Refused(String),

    /// The nickname is empty or too long.
    #[error("invalid nickname: {0:?}")]
    InvalidNickname(String),

    /// A session is already active or being torn down.
    #[error("session busy in state {0}")]
    Busy(&'static str),
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed, but a value is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
