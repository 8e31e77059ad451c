//! Error types shared across the probe.

use std::fmt::{Display, Formatter};

/// Shared probe result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Probe error enumeration covering all harness failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Agent process could not be started.
    Launch(String),
    /// Write attempted after the agent's stdin closed or the process exited.
    TransportClosed(String),
    /// No matching response or completion signal within the allotted window.
    Timeout(String),
    /// The remote side reported an error descriptor.
    Remote(String),
    /// Outbound message could not be serialised, or a line exceeded framing limits.
    Codec(String),
    /// Configuration loading or validation failure.
    Config(String),
    /// Scratch repository fixture setup failure.
    Fixture(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Launch(msg) => write!(f, "launch: {msg}"),
            Self::TransportClosed(msg) => write!(f, "transport closed: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Remote(msg) => write!(f, "remote: {msg}"),
            Self::Codec(msg) => write!(f, "codec: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Fixture(msg) => write!(f, "fixture: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
