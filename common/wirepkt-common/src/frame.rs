//! Frame format, before stuffing:
//! ```txt
//! | DELIMITER | id | length | payload         | crc |
//! | 0x7e      | +1 | +2     | +3:(length)     | +1  |
//! ```
//! Every byte after the delimiter whose value is [`DELIMITER`](crate::DELIMITER) or
//! [`ESCAPE_MARKER`](crate::ESCAPE_MARKER) is sent as `ESCAPE_MARKER, value ^ ESCAPE_MARKER`.
//! The CRC covers the unstuffed `id`, `length` and payload.

/// Provides functionality for picking packets out of a byte stream.
mod decode;
pub use decode::{CursorState, Feed, Packet, PacketDecoder, PacketError};

/// Provides functionality for writing out stuffed frames.
mod encode;
pub use encode::{encoded_len_bound, EncodeError, FrameEncoder};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::checksum;
    use crate::{DELIMITER, ESCAPE_MARKER, MAX_PAYLOAD};
    use rand::{Rng, RngCore};

    fn stuff(out: &mut Vec<u8>, byte: u8) {
        if byte == DELIMITER || byte == ESCAPE_MARKER {
            out.push(ESCAPE_MARKER);
            out.push(byte ^ ESCAPE_MARKER);
        } else {
            out.push(byte);
        }
    }

    fn encode(id: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = [0u8; encoded_len_bound(MAX_PAYLOAD)];
        let mut enc = FrameEncoder::new(&mut buf);
        enc.write_frame(id, payload)
            .expect("should be able to encode frame")
            .to_vec()
    }

    /// Feeds `bytes` and returns the result of the last byte, asserting every earlier byte is
    /// `Ok(false)`.
    fn feed_all(dec: &mut PacketDecoder, bytes: &[u8]) -> Result<bool, PacketError> {
        let (last, init) = bytes.split_last().expect("empty input");
        for (j, &b) in init.iter().enumerate() {
            assert_eq!(dec.consume(b), Ok(false), "unexpected result at position {j}");
        }
        dec.consume(*last)
    }

    /// DELIMITER, id=0x01, length=0x02, data={0x10, 0x7e}, where 0x7e must be stuffed.
    #[test]
    fn test_stuffed_delimiter_in_payload() {
        let crc = checksum(0x01, &[0x10, 0x7e]);
        assert_eq!(crc, 0xe5);
        let wire = [DELIMITER, 0x01, 0x02, 0x10, ESCAPE_MARKER, 0x7e ^ ESCAPE_MARKER, crc];
        assert_eq!(wire.to_vec(), encode(0x01, &[0x10, 0x7e]));

        let mut dec = PacketDecoder::new();
        assert_eq!(feed_all(&mut dec, &wire), Ok(true));
        assert_eq!(dec.id(), 0x01);
        assert_eq!(dec.len(), 2);
        assert_eq!(dec.payload(), &[0x10, 0x7e]);
        assert_eq!(dec.state(), CursorState::Idle);
    }

    #[test]
    fn test_state_transitions() {
        let mut dec = PacketDecoder::new();
        assert_eq!(dec.state(), CursorState::Idle);
        let wire = encode(0x07, &[1, 2, 3]);
        let expected = [
            CursorState::AwaitingId,
            CursorState::AwaitingLength,
            CursorState::PayloadIndex(0),
            CursorState::PayloadIndex(1),
            CursorState::PayloadIndex(2),
            CursorState::AwaitingChecksum,
        ];
        for (&b, state) in wire.iter().zip(expected) {
            assert_eq!(dec.consume(b), Ok(false));
            assert_eq!(dec.state(), state);
        }
        assert_eq!(dec.consume(wire[6]), Ok(true));
        assert_eq!(dec.state(), CursorState::Idle);
    }

    #[test]
    fn test_zero_length() {
        let mut dec = PacketDecoder::new();
        let wire = encode(0x33, &[]);
        assert_eq!(wire.len(), 4);
        dec.consume(wire[0]).unwrap();
        dec.consume(wire[1]).unwrap();
        assert_eq!(dec.consume(wire[2]), Ok(false));
        assert_eq!(dec.state(), CursorState::AwaitingChecksum);
        assert_eq!(dec.consume(wire[3]), Ok(true));
        assert!(dec.is_empty());
        assert_eq!(dec.payload(), &[] as &[u8]);
    }

    /// A literal delimiter restarts the frame from any point, including mid-escape.
    #[test]
    fn test_delimiter_always_restarts() {
        let wire = encode(0xa5, &[0x7e, 0xa5, 9, 9]);
        for cut in 0..wire.len() {
            let mut dec = PacketDecoder::new();
            for &b in &wire[..cut] {
                let _ = dec.consume(b);
            }
            assert_eq!(dec.consume(DELIMITER), Ok(false));
            assert_eq!(dec.state(), CursorState::AwaitingId, "cut at {cut}");
            assert!(!dec.is_escape_pending(), "cut at {cut}");
        }

        let mut dec = PacketDecoder::new();
        dec.consume(DELIMITER).unwrap();
        dec.consume(ESCAPE_MARKER).unwrap();
        assert!(dec.is_escape_pending());
        dec.consume(DELIMITER).unwrap();
        assert!(!dec.is_escape_pending());
        assert_eq!(dec.state(), CursorState::AwaitingId);
    }

    #[test]
    fn test_length_overflow() {
        for declared in (MAX_PAYLOAD as u8 + 1)..=u8::MAX {
            let mut dec = PacketDecoder::new();
            let mut wire = vec![DELIMITER, 0x01];
            stuff(&mut wire, declared);
            assert_eq!(
                feed_all(&mut dec, &wire),
                Err(PacketError::LengthOverflow { declared })
            );
            assert_eq!(dec.state(), CursorState::Idle);
            // payload bytes that follow are noise
            for b in 0..8 {
                assert_eq!(dec.consume(b), Ok(false));
            }
            assert_eq!(dec.state(), CursorState::Idle);
            assert!(dec.packet().is_none());
        }
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut wire = encode(0x02, b"abc");
        let last = wire.len() - 1;
        let good = wire[last];
        wire[last] = good ^ 0x01;

        let mut dec = PacketDecoder::new();
        assert_eq!(
            feed_all(&mut dec, &wire),
            Err(PacketError::ChecksumMismatch {
                computed: good,
                received: good ^ 0x01
            })
        );
        assert_eq!(dec.state(), CursorState::Idle);
        assert!(dec.packet().is_none());
    }

    #[test]
    fn test_corrupted_payload_is_rejected() {
        let mut wire = encode(0x02, b"abcdef");
        wire[4] ^= 0x40;
        let mut dec = PacketDecoder::new();
        assert!(matches!(
            feed_all(&mut dec, &wire),
            Err(PacketError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_idle_noise_ignored() {
        let mut dec = PacketDecoder::new();
        for b in [0x00, 0x01, 0xff, 0x33, 0xdb] {
            assert_eq!(dec.consume(b), Ok(false));
            assert_eq!(dec.state(), CursorState::Idle);
        }
        assert_eq!(feed_all(&mut dec, &encode(0x05, b"x")), Ok(true));
        assert_eq!(dec.payload(), b"x");
    }

    /// Test that random payloads, including reserved byte values, survive stuffing.
    #[test]
    fn test_round_trip() {
        let mut rng = rand::thread_rng();
        let mut dec = PacketDecoder::new();
        for _ in 0..256 {
            let id: u8 = rng.gen();
            let len = rng.gen_range(0..=MAX_PAYLOAD);
            let mut payload = vec![0u8; len];
            rng.fill_bytes(&mut payload);
            if len > 1 {
                payload[0] = DELIMITER;
                payload[len - 1] = ESCAPE_MARKER;
            }
            let wire = encode(id, &payload);
            assert_eq!(wire.iter().filter(|&&b| b == DELIMITER).count(), 1);
            assert!(wire.len() <= encoded_len_bound(len));

            assert_eq!(feed_all(&mut dec, &wire), Ok(true));
            let packet = dec.packet().expect("packet should be ready");
            assert_eq!(packet.id, id);
            assert_eq!(packet.len(), len);
            assert_eq!(packet.payload(), &payload[..]);
        }
    }

    /// Test that garbage of any kind never prevents the next good frame from parsing.
    #[test]
    fn test_resync_after_garbage() {
        let mut rng = rand::thread_rng();
        let good = encode(0x01, &[0x7e, 0x00, 0xa5, 0x42]);
        for _ in 0..512 {
            let mut garbage = vec![0u8; rng.gen_range(0..64)];
            rng.fill_bytes(&mut garbage);
            if rng.gen_bool(0.5) {
                garbage.push(ESCAPE_MARKER);
            }
            let mut dec = PacketDecoder::new();
            for &b in &garbage {
                let _ = dec.consume(b);
            }
            assert_eq!(feed_all(&mut dec, &good), Ok(true));
            assert_eq!(dec.id(), 0x01);
            assert_eq!(dec.payload(), &[0x7e, 0x00, 0xa5, 0x42]);
        }
    }

    #[test]
    fn test_feed() {
        let mut stream = vec![0x11, 0x22];
        stream.extend(encode(0x01, b"first"));
        let mut bad = encode(0x02, b"second");
        *bad.last_mut().unwrap() ^= 0xff;
        stream.extend(bad);
        stream.extend([DELIMITER, 0x03, 0x40]);
        stream.extend(encode(0x04, b""));
        // truncated frame, cut off by the one after it
        stream.extend(&encode(0x05, b"lost")[..4]);
        stream.extend(encode(0x06, b"last"));

        let mut dec = PacketDecoder::new();
        let results: Vec<_> = dec.feed(&stream).collect();
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].as_ref().map(|p| p.id), Ok(0x01));
        assert_eq!(results[0].as_ref().map(|p| p.payload()), Ok(&b"first"[..]));
        assert!(matches!(
            results[1],
            Err(PacketError::ChecksumMismatch { .. })
        ));
        assert_eq!(
            results[2],
            Err(PacketError::LengthOverflow { declared: 0x40 })
        );
        assert_eq!(results[3].map(|p| (p.id, p.len())), Ok((0x04, 0)));
        assert_eq!(results[4].as_ref().map(|p| p.payload()), Ok(&b"last"[..]));
    }

    #[test]
    fn test_packet_cleared_by_next_frame() {
        let mut dec = PacketDecoder::new();
        assert!(dec.packet().is_none());
        assert_eq!(feed_all(&mut dec, &encode(0x09, b"hi")), Ok(true));
        assert!(dec.packet().is_some());
        // noise after completion leaves the packet readable
        dec.consume(0x00).unwrap();
        assert!(dec.packet().is_some());
        dec.consume(DELIMITER).unwrap();
        assert!(dec.packet().is_none());
    }

    #[test]
    fn test_reset() {
        let mut dec = PacketDecoder::new();
        let wire = encode(0x09, b"hello");
        for &b in &wire[..5] {
            dec.consume(b).unwrap();
        }
        dec.reset();
        assert_eq!(dec.state(), CursorState::Idle);
        for &b in &wire[5..] {
            assert_eq!(dec.consume(b), Ok(false));
        }
        assert_eq!(feed_all(&mut dec, &wire), Ok(true));
    }

    #[test]
    fn test_encode_errors() {
        let mut buf = [0u8; 8];
        let mut enc = FrameEncoder::new(&mut buf);
        assert_eq!(
            enc.write_frame(0x01, &[0u8; MAX_PAYLOAD + 1]),
            Err(EncodeError::PayloadTooLong {
                len: MAX_PAYLOAD + 1
            })
        );
        // delimiter + id + len + 4 bytes (one stuffed) + crc
        assert_eq!(
            enc.write_frame(0x01, &[1, 2, 3, 0x7e]).map(|w| w.len()),
            Err(EncodeError::BufferTooSmall {
                needed: 1 + 1 + 1 + 5 + crc_len(0x01, &[1, 2, 3, 0x7e]),
                available: 8
            })
        );
        assert!(enc.write_frame(0x01, &[1, 2]).is_ok());
    }

    fn crc_len(id: u8, payload: &[u8]) -> usize {
        let crc = checksum(id, payload);
        if crc == DELIMITER || crc == ESCAPE_MARKER {
            2
        } else {
            1
        }
    }
}
