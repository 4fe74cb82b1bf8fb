//! Per-port stream framer: bytes in, decoded messages out.

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::debug;

use super::codec::{FramerState, FramerStats, NclinkCodec};
use super::frame::Frame;
use super::message::{DecodeWarning, Message};
use super::{registry, FuncCode, ProtocolConfig};
use crate::types::{now_millis, PortRole};

/// Incremental parser for one port.
///
/// Datagram boundaries carry no meaning: a frame may arrive split across
/// several `feed` calls, and one call may carry several frames.
#[derive(Debug)]
pub struct StreamFramer {
    role: PortRole,
    codec: NclinkCodec,
    buffer: BytesMut,
}

impl StreamFramer {
    pub fn new(role: PortRole, config: ProtocolConfig) -> Self {
        Self {
            role,
            codec: NclinkCodec::with_config(config),
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Append bytes and return every message completed by them.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Message> {
        self.feed_at(data, now_millis())
    }

    /// Like [`feed`](Self::feed) with an explicit arrival time.
    pub fn feed_at(&mut self, data: &[u8], received_at_ms: u64) -> Vec<Message> {
        self.buffer.extend_from_slice(data);

        let mut messages = Vec::new();
        // The codec is infallible; an Err would only mean an IO-level bug.
        while let Ok(Some(frame)) = self.codec.decode(&mut self.buffer) {
            messages.push(self.to_message(frame, received_at_ms));
        }
        messages
    }

    fn to_message(&self, frame: Frame, received_at_ms: u64) -> Message {
        let (kind, decoded) = registry::decode(frame.func_code, &frame.payload);
        let checksum_valid = frame.checksum_valid();

        let mut warnings = Vec::with_capacity(decoded.warnings.len());
        if !frame.trailer_valid() {
            warnings.push(DecodeWarning::BadTrailer {
                trailer: frame.trailer,
            });
        }
        if !checksum_valid {
            warnings.push(DecodeWarning::ChecksumMismatch {
                computed: frame.computed_checksum,
                received: frame.checksum,
            });
        }
        warnings.extend(decoded.warnings);

        debug!(
            role = %self.role,
            func = %FuncCode(frame.func_code),
            kind = kind.name(),
            len = frame.payload.len(),
            "frame decoded"
        );

        Message {
            func_code: frame.func_code,
            kind,
            role: self.role,
            received_at_ms,
            checksum_valid,
            payload: decoded.payload,
            warnings,
        }
    }

    pub fn role(&self) -> PortRole {
        self.role
    }

    pub fn state(&self) -> FramerState {
        self.codec.state()
    }

    pub fn stats(&self) -> FramerStats {
        self.codec.stats()
    }

    /// Bytes held while waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
