//! Resynchronizing frame codec.

use bytes::{Buf, Bytes, BytesMut};
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace, warn};

use super::frame::{encode_into, frame_len, peek_header, Frame};
use super::{FuncCode, ProtocolConfig, SYNC};
use crate::error::FrameError;

/// Where the codec stands in the current buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FramerState {
    /// Scanning for the sync pair.
    Seeking,
    /// Synced, waiting for function code and length.
    HaveHeader,
    /// Length known, waiting for the rest of the frame.
    HaveFrame,
    /// A frame was just handed out.
    Yielded,
}

/// Framing counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FramerStats {
    pub frames: u64,
    pub checksum_failures: u64,
    pub trailer_failures: u64,
    pub length_overflows: u64,
    /// Checksum failures consumed without delivery.
    pub dropped_frames: u64,
    /// Bytes skipped while looking for sync.
    pub discarded_bytes: u64,
}

/// Tokio codec for NCLink frames.
///
/// Decoding never fails: garbage is skipped, impossible lengths are dropped,
/// and incomplete frames wait for more input.
#[derive(Debug)]
pub struct NclinkCodec {
    config: ProtocolConfig,
    state: FramerState,
    stats: FramerStats,
}

impl NclinkCodec {
    /// Create a new codec with default settings.
    pub fn new() -> Self {
        Self::with_config(ProtocolConfig::default())
    }

    pub fn with_config(config: ProtocolConfig) -> Self {
        Self {
            config,
            state: FramerState::Seeking,
            stats: FramerStats::default(),
        }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    fn discard(&mut self, src: &mut BytesMut, n: usize) {
        src.advance(n);
        self.stats.discarded_bytes += n as u64;
    }

    /// Drop bytes up to the next sync candidate.
    ///
    /// A trailing `0xFF` is kept since its partner may still be in flight.
    fn seek_sync(&mut self, src: &mut BytesMut) {
        let skip = src.windows(2).position(|w| w == SYNC).unwrap_or_else(|| {
            let keep = usize::from(src.last() == Some(&SYNC[0]));
            src.len() - keep
        });
        if skip > 0 {
            trace!(skipped = skip, "resync");
            self.discard(src, skip);
        }
    }
}

impl Default for NclinkCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for NclinkCodec {
    type Item = Frame;
    type Error = crate::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            self.state = FramerState::Seeking;
            if src.len() < SYNC.len() {
                return Ok(None);
            }
            if src[..2] != SYNC {
                self.seek_sync(src);
                continue;
            }

            self.state = FramerState::HaveHeader;
            let (code, length) = match peek_header(src, self.config.max_payload_len) {
                Ok(header) => header,
                Err(FrameError::LengthOverflow { length, max }) => {
                    warn!(length, max, "declared length exceeds maximum, dropping sync");
                    self.stats.length_overflows += 1;
                    self.discard(src, 1);
                    continue;
                }
                Err(_) => return Ok(None),
            };

            self.state = FramerState::HaveFrame;
            let total = frame_len(length);
            if src.len() < total {
                src.reserve(total - src.len());
                return Ok(None);
            }

            let frame = match Frame::parse(&src[..total], self.config.max_payload_len) {
                Ok((frame, _)) => frame,
                Err(e) => {
                    debug!(error = %e, "unparseable frame, dropping sync");
                    self.discard(src, 1);
                    continue;
                }
            };

            if !frame.trailer_valid() {
                self.stats.trailer_failures += 1;
                if self.config.resync_on_bad_trailer {
                    debug!(func = %FuncCode(code), "bad trailer, treating sync as false match");
                    self.discard(src, 1);
                    continue;
                }
                warn!(func = %FuncCode(code), trailer = ?frame.trailer, "bad trailer");
            }

            if !frame.checksum_valid() {
                self.stats.checksum_failures += 1;
                warn!(
                    func = %FuncCode(code),
                    computed = frame.computed_checksum,
                    received = frame.checksum,
                    "checksum mismatch"
                );
                if !self.config.deliver_on_checksum_mismatch {
                    src.advance(total);
                    self.stats.dropped_frames += 1;
                    continue;
                }
            }

            src.advance(total);
            self.stats.frames += 1;
            self.state = FramerState::Yielded;
            return Ok(Some(frame));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let frame = self.decode(buf)?;
        if frame.is_none() && !buf.is_empty() {
            debug!(remaining = buf.len(), "discarding partial frame at end of stream");
            let n = buf.len();
            self.discard(buf, n);
        }
        Ok(frame)
    }
}

impl Encoder<Frame> for NclinkCodec {
    type Error = crate::Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_into(item.func_code, &item.payload, self.config.max_payload_len, dst)
    }
}

impl Encoder<(u8, Bytes)> for NclinkCodec {
    type Error = crate::Error;

    fn encode(&mut self, (code, payload): (u8, Bytes), dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_into(code, &payload, self.config.max_payload_len, dst)
    }
}
