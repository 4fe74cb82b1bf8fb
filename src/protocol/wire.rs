//! Little-endian payload primitives.
//!
//! Every numeric field inside an NCLink payload is little-endian, unlike the
//! big-endian length in the frame envelope. Fixed layouts are declared with
//! [`wire_record!`], which derives the width and field order from the struct
//! definition itself.

use byteorder::{ByteOrder, LittleEndian};
use bytes::BufMut;

use super::message::DecodeWarning;

/// Cursor over a payload that zero-fills fields past the end.
#[derive(Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
    short: bool,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            short: false,
        }
    }

    /// Take the next `n` bytes.
    ///
    /// A field that does not fit marks the reader short and exhausts it, so
    /// every following field reads as zero.
    pub fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.saturating_add(n);
        if end <= self.data.len() {
            let field = &self.data[self.pos..end];
            self.pos = end;
            Some(field)
        } else {
            self.short = true;
            self.pos = self.data.len();
            None
        }
    }

    pub fn read<T: WireRecord>(&mut self) -> T {
        T::read_from(self)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn is_short(&self) -> bool {
        self.short
    }
}

/// A value with a fixed little-endian wire layout.
pub trait WireRecord: Sized {
    /// Exact encoded width in bytes.
    const WIDTH: usize;

    fn read_from(r: &mut WireReader<'_>) -> Self;

    fn write_to<B: BufMut>(&self, out: &mut B);

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::WIDTH);
        self.write_to(&mut out);
        out
    }
}

macro_rules! primitive {
    ($ty:ty, $width:expr, $get:expr, $put:ident) => {
        impl WireRecord for $ty {
            const WIDTH: usize = $width;

            fn read_from(r: &mut WireReader<'_>) -> Self {
                r.take($width).map_or_else(<$ty>::default, $get)
            }

            fn write_to<B: BufMut>(&self, out: &mut B) {
                out.$put(*self);
            }
        }
    };
}

primitive!(u8, 1, |b: &[u8]| b[0], put_u8);
primitive!(i8, 1, |b: &[u8]| b[0] as i8, put_i8);
primitive!(u16, 2, LittleEndian::read_u16, put_u16_le);
primitive!(u32, 4, LittleEndian::read_u32, put_u32_le);
primitive!(i32, 4, LittleEndian::read_i32, put_i32_le);
primitive!(u64, 8, LittleEndian::read_u64, put_u64_le);
primitive!(f32, 4, LittleEndian::read_f32, put_f32_le);
primitive!(f64, 8, LittleEndian::read_f64, put_f64_le);

impl WireRecord for bool {
    const WIDTH: usize = 1;

    fn read_from(r: &mut WireReader<'_>) -> Self {
        r.take(1).is_some_and(|b| b[0] != 0)
    }

    fn write_to<B: BufMut>(&self, out: &mut B) {
        out.put_u8(u8::from(*self));
    }
}

impl<T: WireRecord, const N: usize> WireRecord for [T; N] {
    const WIDTH: usize = T::WIDTH * N;

    fn read_from(r: &mut WireReader<'_>) -> Self {
        std::array::from_fn(|_| T::read_from(r))
    }

    fn write_to<B: BufMut>(&self, out: &mut B) {
        for item in self {
            item.write_to(out);
        }
    }
}

/// Declare a struct with a fixed little-endian layout.
///
/// Fields are encoded in declaration order with no padding.
macro_rules! wire_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Default, ::serde::Serialize, ::serde::Deserialize)]
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field: $ty, )*
        }

        impl $crate::protocol::wire::WireRecord for $name {
            const WIDTH: usize = 0 $( + <$ty as $crate::protocol::wire::WireRecord>::WIDTH )*;

            fn read_from(r: &mut $crate::protocol::wire::WireReader<'_>) -> Self {
                Self {
                    $( $field: <$ty as $crate::protocol::wire::WireRecord>::read_from(r), )*
                }
            }

            fn write_to<B: ::bytes::BufMut>(&self, out: &mut B) {
                $( $crate::protocol::wire::WireRecord::write_to(&self.$field, out); )*
            }
        }
    };
}

pub(crate) use wire_record;

/// Decode a fixed-width record, zero-filling anything the payload lacks.
///
/// Bytes beyond the declared width are ignored.
pub fn decode_fixed<T: WireRecord>(payload: &[u8]) -> (T, Option<DecodeWarning>) {
    let mut reader = WireReader::new(payload);
    let record = T::read_from(&mut reader);
    let warning = (payload.len() < T::WIDTH).then_some(DecodeWarning::ShortPayload {
        expected: T::WIDTH,
        actual: payload.len(),
    });
    (record, warning)
}

#[cfg(test)]
mod tests {
    use super::*;

    wire_record! {
        struct Sample {
            a: u16,
            b: f64,
            c: [i8; 3],
            d: bool,
        }
    }

    #[test]
    fn test_width_is_sum_of_fields() {
        assert_eq!(Sample::WIDTH, 2 + 8 + 3 + 1);
        assert_eq!(<[f64; 8]>::WIDTH, 64);
    }

    #[test]
    fn test_little_endian_layout() {
        let s = Sample {
            a: 0x0102,
            b: 1.0,
            c: [-1, 0, 1],
            d: true,
        };
        let bytes = s.to_bytes();
        assert_eq!(&bytes[..2], &[0x02, 0x01]);
        assert_eq!(&bytes[2..10], &1.0f64.to_le_bytes());
        assert_eq!(&bytes[10..], &[0xFF, 0x00, 0x01, 0x01]);
    }

    #[test]
    fn test_short_payload_zero_fills() {
        let full = Sample {
            a: 7,
            b: 2.5,
            c: [1, 2, 3],
            d: true,
        }
        .to_bytes();

        // Cut inside `b`: `a` survives, everything after is zero.
        let (decoded, warning) = decode_fixed::<Sample>(&full[..5]);
        assert_eq!(decoded.a, 7);
        assert_eq!(decoded.b, 0.0);
        assert_eq!(decoded.c, [0, 0, 0]);
        assert!(!decoded.d);
        assert_eq!(
            warning,
            Some(DecodeWarning::ShortPayload {
                expected: 14,
                actual: 5
            })
        );
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut bytes = Sample::default().to_bytes();
        bytes.extend_from_slice(&[0xAA; 4]);
        let (decoded, warning) = decode_fixed::<Sample>(&bytes);
        assert_eq!(decoded, Sample::default());
        assert!(warning.is_none());
    }

    #[test]
    fn test_empty_payload() {
        let (decoded, warning) = decode_fixed::<Sample>(&[]);
        assert_eq!(decoded, Sample::default());
        assert!(warning.is_some());
    }
}
