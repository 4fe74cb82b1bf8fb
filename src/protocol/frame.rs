//! Single-frame encoding and decoding.

use bytes::{BufMut, Bytes, BytesMut};

use super::{checksum, HEADER_LEN, MAX_PAYLOAD_LEN, MIN_FRAME_LEN, SYNC, TRAILER};
use crate::error::{FrameError, ProtocolError, Result};

/// A structurally complete NCLink frame.
///
/// `parse` only checks sync, length and completeness; checksum and trailer
/// are kept so the caller can apply its own delivery policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub func_code: u8,
    pub payload: Bytes,
    /// Checksum byte as received (or as computed for outbound frames).
    pub checksum: u8,
    /// XOR over sync through payload.
    pub computed_checksum: u8,
    pub trailer: [u8; 2],
}

impl Frame {
    /// Build an outbound frame.
    pub fn new(func_code: u8, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let sum = envelope_checksum(func_code, &payload);
        Self {
            func_code,
            payload,
            checksum: sum,
            computed_checksum: sum,
            trailer: TRAILER,
        }
    }

    /// Total encoded size of this frame.
    pub fn wire_len(&self) -> usize {
        frame_len(self.payload.len())
    }

    pub fn checksum_valid(&self) -> bool {
        self.checksum == self.computed_checksum
    }

    pub fn trailer_valid(&self) -> bool {
        self.trailer == TRAILER
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        encode_into(self.func_code, &self.payload, MAX_PAYLOAD_LEN, &mut buf)?;
        Ok(buf.to_vec())
    }

    /// Structural parse of the frame at the start of `data`.
    ///
    /// Returns the frame and the number of bytes it occupies.
    pub fn parse(data: &[u8], max_payload: usize) -> std::result::Result<(Self, usize), FrameError> {
        let (func_code, length) = peek_header(data, max_payload)?;
        let total = frame_len(length);
        if data.len() < total {
            return Err(FrameError::Incomplete {
                needed: total,
                available: data.len(),
            });
        }

        let payload_end = HEADER_LEN + length;
        let computed = checksum(&data[..payload_end]);
        let frame = Self {
            func_code,
            payload: Bytes::copy_from_slice(&data[HEADER_LEN..payload_end]),
            checksum: data[payload_end],
            computed_checksum: computed,
            trailer: [data[payload_end + 1], data[payload_end + 2]],
        };
        Ok((frame, total))
    }

    /// Strict decode: every check must pass.
    pub fn decode(data: &[u8]) -> std::result::Result<Self, FrameError> {
        let (frame, _) = Self::parse(data, MAX_PAYLOAD_LEN)?;
        frame.verify()?;
        Ok(frame)
    }

    /// Check trailer and checksum.
    pub fn verify(&self) -> std::result::Result<(), FrameError> {
        if !self.trailer_valid() {
            return Err(FrameError::BadTrailer(self.trailer[0], self.trailer[1]));
        }
        if !self.checksum_valid() {
            return Err(FrameError::ChecksumMismatch {
                computed: self.computed_checksum,
                received: self.checksum,
            });
        }
        Ok(())
    }
}

/// Encoded size of a frame carrying `payload_len` bytes.
pub const fn frame_len(payload_len: usize) -> usize {
    payload_len + MIN_FRAME_LEN
}

/// Read function code and declared length without consuming anything.
pub fn peek_header(data: &[u8], max_payload: usize) -> std::result::Result<(u8, usize), FrameError> {
    if data.len() < HEADER_LEN {
        return Err(FrameError::Incomplete {
            needed: MIN_FRAME_LEN,
            available: data.len(),
        });
    }
    if data[0] != SYNC[0] || data[1] != SYNC[1] {
        return Err(FrameError::BadSync(data[0], data[1]));
    }
    let length = usize::from(u16::from_be_bytes([data[3], data[4]]));
    if length > max_payload {
        return Err(FrameError::LengthOverflow {
            length,
            max: max_payload,
        });
    }
    Ok((data[2], length))
}

/// Encode a frame straight into `dst`.
pub fn encode_into(func_code: u8, payload: &[u8], max_payload: usize, dst: &mut BytesMut) -> Result<()> {
    if payload.len() > max_payload {
        return Err(ProtocolError::PayloadTooLarge {
            size: payload.len(),
            max: max_payload,
        }
        .into());
    }

    dst.reserve(frame_len(payload.len()));
    let start = dst.len();
    dst.put_slice(&SYNC);
    dst.put_u8(func_code);
    dst.put_u16(payload.len() as u16);
    dst.put_slice(payload);
    let sum = checksum(&dst[start..]);
    dst.put_u8(sum);
    dst.put_slice(&TRAILER);
    Ok(())
}

/// Encode a frame.
pub fn encode(func_code: u8, payload: &[u8]) -> Result<Vec<u8>> {
    let mut buf = BytesMut::with_capacity(frame_len(payload.len()));
    encode_into(func_code, payload, MAX_PAYLOAD_LEN, &mut buf)?;
    Ok(buf.to_vec())
}

fn envelope_checksum(func_code: u8, payload: &[u8]) -> u8 {
    let len = (payload.len() as u16).to_be_bytes();
    let head = SYNC[0] ^ SYNC[1] ^ func_code ^ len[0] ^ len[1];
    payload.iter().fold(head, |acc, b| acc ^ b)
}
