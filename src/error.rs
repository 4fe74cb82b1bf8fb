//! Error types for the NCLink engine.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::types::PortRole;

/// Result type alias for NCLink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the NCLink engine.
#[derive(Error, Debug)]
pub enum Error {
    // Transport errors
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    // Protocol errors
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // Command errors
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Transport layer errors.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("bind failed on {addr} ({role}): {reason}")]
    BindFailed {
        addr: SocketAddr,
        role: PortRole,
        reason: String,
    },

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("socket error: {0}")]
    SocketError(String),

    #[error("transport is not running")]
    NotRunning,

    #[error("transport is already running")]
    AlreadyRunning,

    #[error("cannot resolve {host}:{port}: {reason}")]
    ResolveFailed {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("datagram too large: {size} bytes (max {max})")]
    DatagramTooLarge { size: usize, max: usize },
}

/// Protocol encoding errors.
///
/// Inbound wire problems never surface here; the framer reports them as
/// [`FrameError`] or decode warnings and keeps the stream alive.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("{0} payload cannot be encoded")]
    NotEncodable(&'static str),
}

/// Outcome of strict single-frame decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("incomplete frame: need {needed} bytes, have {available}")]
    Incomplete { needed: usize, available: usize },

    #[error("bad sync bytes: {0:02x} {1:02x}")]
    BadSync(u8, u8),

    #[error("declared length {length} exceeds maximum {max}")]
    LengthOverflow { length: usize, max: usize },

    #[error("bad trailer bytes: {0:02x} {1:02x}")]
    BadTrailer(u8, u8),

    #[error("checksum mismatch: computed {computed:#04x}, received {received:#04x}")]
    ChecksumMismatch { computed: u8, received: u8 },
}

impl FrameError {
    /// `Incomplete` is a wait state, not a failure.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, FrameError::Incomplete { .. })
    }
}

/// Hard failure of a payload codec.
///
/// Fixed-size codecs never fail; only variable-length codecs can report
/// that the buffer does not hold what the header declares.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("incomplete payload: expected {expected} bytes, got {actual}")]
    Incomplete { expected: usize, actual: usize },

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Command encoding and dispatch errors.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("unknown gain: {0}")]
    UnknownGain(String),

    #[error("waypoint list is empty")]
    EmptyWaypoints,

    #[error("command sequence cancelled after {sent} sends")]
    Cancelled { sent: usize },

    #[error("invalid command argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Check if error is recoverable (should retry).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError::SendFailed(_) | TransportError::ResolveFailed { .. })
                | Error::Io(_)
        )
    }

    /// Check if error means the transport must be (re)started first.
    pub fn needs_restart(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError::NotRunning)
                | Error::Command(CommandError::Cancelled { .. })
        )
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Error::Protocol(ProtocolError::Frame(e))
    }
}

/// Where an inbound problem was observed, for log context.
#[derive(Debug, Clone, Copy)]
pub struct WireContext {
    pub role: PortRole,
    pub func_code: Option<u8>,
    pub peer: Option<SocketAddr>,
}

impl fmt::Display for WireContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "role={}", self.role)?;
        if let Some(code) = self.func_code {
            write!(f, ", func={code:#04x}")?;
        }
        if let Some(addr) = self.peer {
            write!(f, ", peer={addr}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let err = Error::from(TransportError::SendFailed("refused".into()));
        assert!(err.is_recoverable());

        let err = Error::from(TransportError::NotRunning);
        assert!(!err.is_recoverable());
        assert!(err.needs_restart());
    }

    #[test]
    fn test_frame_error_converts() {
        let err: Error = FrameError::BadTrailer(0, 1).into();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::Frame(FrameError::BadTrailer(0, 1)))
        ));
    }

    #[test]
    fn test_wire_context_display() {
        let ctx = WireContext {
            role: PortRole::Lidar,
            func_code: Some(0x50),
            peer: None,
        };
        assert_eq!(ctx.to_string(), "role=lidar, func=0x50");
    }
}
