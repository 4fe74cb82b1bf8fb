//! NCLink wire protocol.
//!
//! ## Frame Format
//!
//! ```text
//! ┌────────┬────────┬──────┬──────────────┬─────────────┬──────────┬────────┬────────┐
//! │ 0xFF   │ 0xFC   │ Func │ Length (BE16)│ Payload ... │ XOR (1)  │ 0xA1   │ 0xA2   │
//! └────────┴────────┴──────┴──────────────┴─────────────┴──────────┴────────┴────────┘
//! ```
//!
//! The checksum is the XOR of every byte from the first sync byte through
//! the last payload byte. The length is big-endian; every numeric field
//! inside a payload is little-endian.

mod codec;
mod frame;
mod framer;
pub mod message;
pub mod registry;
pub mod wire;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use codec::{FramerState, FramerStats, NclinkCodec};
pub use frame::{encode, encode_into, frame_len, peek_header, Frame};
pub use framer::StreamFramer;
pub use message::{func_code, DecodeWarning, Message, MessageKind, Payload};
pub use registry::Decoded;

use crate::error::{Error, Result};

/// Frame sync bytes.
pub const SYNC: [u8; 2] = [0xFF, 0xFC];

/// Frame trailer bytes.
pub const TRAILER: [u8; 2] = [0xA1, 0xA2];

/// Sync, function code and length.
pub const HEADER_LEN: usize = 5;

/// Header, checksum and trailer around an empty payload.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + 3;

/// Largest payload a peer may declare.
pub const MAX_PAYLOAD_LEN: usize = 16384;

/// XOR checksum over a byte range.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

/// Displays a function code as `0x42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuncCode(pub u8);

impl fmt::Display for FuncCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Framing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Largest accepted payload; may only be lowered below the protocol bound.
    #[serde(default = "default_max_payload_len")]
    pub max_payload_len: usize,

    /// Deliver frames whose checksum does not match.
    #[serde(default = "default_true")]
    pub deliver_on_checksum_mismatch: bool,

    /// Treat a bad trailer as a false sync match and rescan.
    #[serde(default = "default_true")]
    pub resync_on_bad_trailer: bool,
}

fn default_max_payload_len() -> usize {
    MAX_PAYLOAD_LEN
}
fn default_true() -> bool {
    true
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_payload_len: default_max_payload_len(),
            deliver_on_checksum_mismatch: true,
            resync_on_bad_trailer: true,
        }
    }
}

impl ProtocolConfig {
    /// Drop frames that fail the checksum instead of delivering them.
    pub fn strict() -> Self {
        Self {
            deliver_on_checksum_mismatch: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_payload_len == 0 || self.max_payload_len > MAX_PAYLOAD_LEN {
            return Err(Error::InvalidConfig(format!(
                "protocol.max_payload_len must be within 1..={MAX_PAYLOAD_LEN}, got {}",
                self.max_payload_len
            )));
        }
        Ok(())
    }
}
