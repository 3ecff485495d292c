use crate::checksum::checksum;
use crate::{DELIMITER, ESCAPE_MARKER, MAX_PAYLOAD};
use thiserror::Error;

/// Worst-case size on the wire of a frame carrying `payload_len` bytes: every stuffed byte doubles.
pub const fn encoded_len_bound(payload_len: usize) -> usize {
    1 + 2 * (3 + payload_len)
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum EncodeError {
    #[error("payload of {len} bytes exceeds maximum of {}", MAX_PAYLOAD)]
    PayloadTooLong { len: usize },
    #[error("output buffer too small: needed {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

fn needs_escape(byte: u8) -> bool {
    byte == DELIMITER || byte == ESCAPE_MARKER
}

fn stuffed_len(byte: u8) -> usize {
    if needs_escape(byte) {
        2
    } else {
        1
    }
}

/// Writes stuffed frames into a borrowed buffer.
#[derive(Debug)]
pub struct FrameEncoder<'a> {
    buf: &'a mut [u8],
    cursor: usize,
}
impl<'a> FrameEncoder<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    fn push_stuffed(&mut self, byte: u8) {
        if needs_escape(byte) {
            self.buf[self.cursor] = ESCAPE_MARKER;
            self.buf[self.cursor + 1] = byte ^ ESCAPE_MARKER;
            self.cursor += 2;
        } else {
            self.buf[self.cursor] = byte;
            self.cursor += 1;
        }
    }

    /// Encodes one frame, overwriting whatever the buffer held. Returns the bytes to put on the
    /// wire.
    pub fn write_frame(&mut self, id: u8, payload: &[u8]) -> Result<&[u8], EncodeError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(EncodeError::PayloadTooLong { len: payload.len() });
        }
        let length = payload.len() as u8;
        let crc = checksum(id, payload);

        let needed = 1
            + [id, length, crc]
                .into_iter()
                .chain(payload.iter().copied())
                .map(stuffed_len)
                .sum::<usize>();
        if needed > self.buf.len() {
            return Err(EncodeError::BufferTooSmall {
                needed,
                available: self.buf.len(),
            });
        }

        self.cursor = 0;
        self.buf[0] = DELIMITER;
        self.cursor += 1;
        self.push_stuffed(id);
        self.push_stuffed(length);
        payload.iter().for_each(|&b| self.push_stuffed(b));
        self.push_stuffed(crc);

        Ok(&self.buf[..self.cursor])
    }
}
