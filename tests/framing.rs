//! Stream framing tests.
//!
//! Covers the framer against the ways a UDP byte stream goes wrong:
//! - leading garbage and false sync bytes
//! - frames split across datagrams or packed into one
//! - corrupted checksums and impossible lengths

use bytes::BytesMut;
use proptest::prelude::*;
use tokio_util::codec::Decoder;

use nclink::error::FrameError;
use nclink::messages::FlightStates;
use nclink::protocol::wire::WireRecord;
use nclink::protocol::{
    encode, func_code, Frame, FramerState, MessageKind, NclinkCodec, Payload, ProtocolConfig,
    StreamFramer, MAX_PAYLOAD_LEN,
};
use nclink::PortRole;

// ============================================================================
// Helpers
// ============================================================================

fn framer() -> StreamFramer {
    StreamFramer::new(PortRole::Telemetry, ProtocolConfig::default())
}

/// Raw frames pulled out of `bytes` as (func code, payload).
fn frames_of(bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut codec = NclinkCodec::new();
    let mut buf = BytesMut::from(bytes);
    let mut out = Vec::new();
    while let Some(frame) = codec.decode(&mut buf).unwrap() {
        out.push((frame.func_code, frame.payload.to_vec()));
    }
    out
}

fn states_frame(lat: f64, lon: f64, height: f32) -> Vec<u8> {
    let states = FlightStates {
        lat,
        lon,
        height,
        ..Default::default()
    };
    encode(func_code::STATES, &states.to_bytes()).unwrap()
}

prop_compose! {
    /// A frame with an unregistered code and arbitrary payload.
    fn arb_frame()(code in 0x00u8..0x3F, payload in prop::collection::vec(any::<u8>(), 0..300)) -> (u8, Vec<u8>) {
        (code, payload)
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_resync_after_garbage(
        // Without 0xFF the garbage cannot hold a false sync.
        garbage in prop::collection::vec(0x00u8..0xFF, 0..512),
        (code, payload) in arb_frame(),
    ) {
        let mut stream = garbage.clone();
        stream.extend(encode(code, &payload).unwrap());

        prop_assert_eq!(frames_of(&stream), vec![(code, payload)]);
    }

    #[test]
    fn prop_fragmentation_independent(
        frames in prop::collection::vec(arb_frame(), 1..8),
        chunks in prop::collection::vec(1usize..97, 1..32),
    ) {
        let stream: Vec<u8> = frames
            .iter()
            .flat_map(|(code, payload)| encode(*code, payload).unwrap())
            .collect();

        let mut whole = framer();
        let expected = whole.feed_at(&stream, 0);

        let mut split = framer();
        let mut got = Vec::new();
        let mut rest = stream.as_slice();
        for size in chunks.iter().cycle() {
            if rest.is_empty() {
                break;
            }
            let (head, tail) = rest.split_at((*size).min(rest.len()));
            got.extend(split.feed_at(head, 0));
            rest = tail;
        }

        prop_assert_eq!(got.len(), frames.len());
        prop_assert_eq!(got, expected);
        prop_assert_eq!(split.buffered(), 0);
    }

    #[test]
    fn prop_checksum_mismatch_never_stalls(
        (code, payload) in arb_frame(),
        flip in any::<u8>().prop_filter("must change the byte", |b| *b != 0),
    ) {
        let mut bad = encode(code, &payload).unwrap();
        let checksum_at = bad.len() - 3;
        bad[checksum_at] ^= flip;
        bad.extend(states_frame(1.0, 2.0, 3.0));

        let messages = framer().feed(&bad);
        prop_assert_eq!(messages.len(), 2);
        prop_assert!(!messages[0].checksum_valid);
        prop_assert!(messages[1].checksum_valid);
        prop_assert_eq!(messages[1].kind, MessageKind::States);
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_flight_states_example() {
    let bytes = states_frame(31.23, 121.47, 50.0);
    assert_eq!(bytes.len(), 64);
    assert_eq!(&bytes[..5], &[0xFF, 0xFC, 0x42, 0x00, 0x38]);
    assert_eq!(&bytes[62..], &[0xA1, 0xA2]);

    let messages = framer().feed(&bytes);
    assert_eq!(messages.len(), 1);
    let states = messages[0].states().unwrap();
    assert_eq!(states.lat, 31.23);
    assert_eq!(states.lon, 121.47);
    assert_eq!(states.height, 50.0);
}

#[test]
fn test_coalesced_frames_in_order() {
    let mut datagram = states_frame(1.0, 0.0, 0.0);
    datagram.extend(encode(func_code::AVOIDANCE_FLAG, &[1, 0, 1]).unwrap());
    datagram.extend(states_frame(2.0, 0.0, 0.0));

    let messages = framer().feed(&datagram);
    let kinds: Vec<_> = messages.iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        [MessageKind::States, MessageKind::AvoidanceFlag, MessageKind::States]
    );
    assert_eq!(messages[2].states().map(|s| s.lat), Some(2.0));
}

#[test]
fn test_frame_held_until_last_byte() {
    let bytes = states_frame(5.0, 6.0, 7.0);
    let mut f = framer();

    assert!(f.feed(&bytes[..bytes.len() - 1]).is_empty());
    assert_eq!(f.state(), FramerState::HaveFrame);

    let messages = f.feed(&bytes[bytes.len() - 1..]);
    assert_eq!(messages.len(), 1);
}

#[test]
fn test_length_overflow_rejected_without_waiting() {
    let mut stream = vec![0xFF, 0xFC, 0x42, 0x7F, 0xFF];
    stream.extend(states_frame(9.0, 9.0, 9.0));

    let mut f = framer();
    let messages = f.feed(&stream);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].states().map(|s| s.lat), Some(9.0));
    assert_eq!(f.stats().length_overflows, 1);
}

#[test]
fn test_false_sync_inside_garbage() {
    // Declares a 3-byte payload; the trailer check exposes it.
    let mut stream = vec![0x10, 0xFF, 0xFC, 0x45, 0x00, 0x03, 0x01, 0x02, 0x03, 0x00, 0x00, 0x00];
    stream.extend(states_frame(4.0, 0.0, 0.0));

    let mut f = framer();
    let messages = f.feed(&stream);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind, MessageKind::States);
    assert_eq!(f.stats().trailer_failures, 1);
}

#[test]
fn test_strict_mode_drops_corrupt_frames() {
    let mut bad = states_frame(1.0, 1.0, 1.0);
    bad[20] ^= 0x40;
    bad.extend(states_frame(2.0, 2.0, 2.0));

    let mut f = StreamFramer::new(PortRole::Telemetry, ProtocolConfig::strict());
    let messages = f.feed(&bad);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].states().map(|s| s.lat), Some(2.0));
    assert_eq!(f.stats().dropped_frames, 1);
}

#[test]
fn test_unknown_code_is_not_fatal() {
    let mut stream = encode(0x99, &[0x5A; 40]).unwrap();
    stream.extend(states_frame(3.0, 0.0, 0.0));

    let messages = framer().feed(&stream);
    assert_eq!(messages.len(), 2);
    assert!(matches!(messages[0].payload, Payload::Unknown { length: 40, .. }));
    assert_eq!(messages[1].kind, MessageKind::States);
}

#[test]
fn test_empty_payload_frame() {
    let bytes = encode(0x3A, &[]).unwrap();
    assert_eq!(bytes.len(), 8);
    assert_eq!(frames_of(&bytes), vec![(0x3A, vec![])]);
}

// ============================================================================
// Strict single-frame decode
// ============================================================================

#[test]
fn test_strict_decode_errors() {
    let good = states_frame(1.0, 2.0, 3.0);

    assert!(matches!(
        Frame::decode(&good[..10]),
        Err(FrameError::Incomplete { .. })
    ));

    let mut bad_sync = good.clone();
    bad_sync[1] = 0xFD;
    assert_eq!(Frame::decode(&bad_sync), Err(FrameError::BadSync(0xFF, 0xFD)));

    let mut bad_sum = good.clone();
    bad_sum[30] ^= 0x01;
    assert!(matches!(
        Frame::decode(&bad_sum),
        Err(FrameError::ChecksumMismatch { .. })
    ));

    let mut bad_trailer = good.clone();
    let last = bad_trailer.len() - 1;
    bad_trailer[last] = 0x00;
    assert_eq!(Frame::decode(&bad_trailer), Err(FrameError::BadTrailer(0xA1, 0x00)));

    let overflow = [0xFF, 0xFC, 0x42, 0x40, 0x01];
    assert!(matches!(
        Frame::decode(&overflow),
        Err(FrameError::LengthOverflow { length: 0x4001, max: MAX_PAYLOAD_LEN })
    ));
}

#[test]
fn test_oversized_payload_not_encodable() {
    assert!(encode(0x42, &vec![0u8; MAX_PAYLOAD_LEN + 1]).is_err());
    assert!(encode(0x42, &vec![0u8; MAX_PAYLOAD_LEN]).is_ok());
}
