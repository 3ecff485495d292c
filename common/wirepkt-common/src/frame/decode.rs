use crate::checksum::PacketCrc;
use crate::{DELIMITER, ESCAPE_MARKER, MAX_PAYLOAD};
use thiserror::Error;

/// Position of the decoder in the frame grammar, i.e. what the next (unstuffed) byte means.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorState {
    /// Next byte is `payload[i]`.
    PayloadIndex(u8),
    AwaitingChecksum,
    AwaitingId,
    AwaitingLength,
    /// No frame in progress; bytes are noise until the next delimiter.
    Idle,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum PacketError {
    #[error("declared length {declared} exceeds maximum payload of {}", MAX_PAYLOAD)]
    LengthOverflow { declared: u8 },
    #[error("invalid CRC: calculated {computed:02x}, received {received:02x}")]
    ChecksumMismatch { computed: u8, received: u8 },
}

/// A complete, verified packet copied out of the decoder.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Packet {
    pub id: u8,
    length: u8,
    payload: [u8; MAX_PAYLOAD],
}
impl Packet {
    pub fn len(&self) -> usize {
        self.length as usize
    }
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.length as usize]
    }
}
impl core::fmt::Debug for Packet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Packet")
            .field("id", &self.id)
            .field("payload", &self.payload())
            .finish()
    }
}

/// Incremental decoder for `DELIMITER ID LEN DATA[LEN] CHECKSUM` frames.
///
/// One instance per byte stream. The payload buffer is reused for every frame, and the fields of
/// the last complete packet stay readable until the next delimiter arrives.
#[derive(Debug)]
pub struct PacketDecoder {
    id: u8,
    length: u8,
    payload: [u8; MAX_PAYLOAD],
    cursor_state: CursorState,
    escape_pending: bool,
    crc: PacketCrc,
    ready: bool,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self {
            id: 0,
            length: 0,
            payload: [0; MAX_PAYLOAD],
            cursor_state: CursorState::Idle,
            escape_pending: false,
            crc: PacketCrc::new(),
            ready: false,
        }
    }

    /// Abandon any frame in progress. Bytes are ignored until the next delimiter.
    pub fn reset(&mut self) {
        self.cursor_state = CursorState::Idle;
        self.escape_pending = false;
        self.crc.reset();
    }

    fn restart(&mut self) {
        self.cursor_state = CursorState::AwaitingId;
        self.escape_pending = false;
        self.ready = false;
        self.crc.reset();
    }

    /// Consumes one byte from the wire.
    ///
    /// Returns `Ok(true)` if `byte` completed a frame whose checksum verified; the packet can then
    /// be read through [`id`](Self::id) and [`payload`](Self::payload). Returns `Ok(false)` if more
    /// bytes are needed. Returns `Err` if the frame in progress was discarded; the decoder is idle
    /// afterwards and picks up again at the next delimiter.
    pub fn consume(&mut self, byte: u8) -> Result<bool, PacketError> {
        // A raw delimiter can never be part of a stuffed frame, so it always starts a new one.
        if byte == DELIMITER {
            if self.cursor_state != CursorState::Idle {
                log::trace!("delimiter in state {:?}, restarting frame", self.cursor_state);
            }
            self.restart();
            return Ok(false);
        }

        let byte = if self.escape_pending {
            self.escape_pending = false;
            byte ^ ESCAPE_MARKER
        } else if byte == ESCAPE_MARKER {
            self.escape_pending = true;
            return Ok(false);
        } else {
            byte
        };

        match self.cursor_state {
            CursorState::PayloadIndex(i) => {
                self.payload[i as usize] = byte;
                self.crc.write_u8(byte);
                let next = i + 1;
                self.cursor_state = if next == self.length {
                    CursorState::AwaitingChecksum
                } else {
                    CursorState::PayloadIndex(next)
                };
                Ok(false)
            }
            CursorState::AwaitingId => {
                self.id = byte;
                self.crc.write_u8(byte);
                self.cursor_state = CursorState::AwaitingLength;
                Ok(false)
            }
            CursorState::AwaitingLength => {
                if byte as usize > MAX_PAYLOAD {
                    log::debug!("discarding frame {:02x}: length {byte} too long", self.id);
                    self.reset();
                    return Err(PacketError::LengthOverflow { declared: byte });
                }
                self.length = byte;
                self.crc.write_u8(byte);
                self.cursor_state = if byte == 0 {
                    CursorState::AwaitingChecksum
                } else {
                    CursorState::PayloadIndex(0)
                };
                Ok(false)
            }
            CursorState::AwaitingChecksum => {
                let computed = self.crc.finish();
                self.cursor_state = CursorState::Idle;
                if computed == byte {
                    log::trace!("frame {:02x} complete, {} bytes", self.id, self.length);
                    self.ready = true;
                    Ok(true)
                } else {
                    log::debug!(
                        "discarding frame {:02x}: CRC {computed:02x} != {byte:02x}",
                        self.id
                    );
                    Err(PacketError::ChecksumMismatch {
                        computed,
                        received: byte,
                    })
                }
            }
            CursorState::Idle => Ok(false),
        }
    }

    /// Consumes a chunk of bytes, yielding every completed packet and every discarded frame.
    pub fn feed<'d, 'b>(&'d mut self, bytes: &'b [u8]) -> Feed<'d, 'b> {
        Feed {
            decoder: self,
            bytes: bytes.iter(),
        }
    }

    pub fn state(&self) -> CursorState {
        self.cursor_state
    }
    pub fn is_escape_pending(&self) -> bool {
        self.escape_pending
    }
    pub fn id(&self) -> u8 {
        self.id
    }
    pub fn len(&self) -> usize {
        self.length as usize
    }
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.length as usize]
    }

    /// The last complete packet, if no frame has been started since.
    pub fn packet(&self) -> Option<Packet> {
        self.ready.then(|| Packet {
            id: self.id,
            length: self.length,
            payload: self.payload,
        })
    }
}
impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`PacketDecoder::feed`].
#[derive(Debug)]
pub struct Feed<'d, 'b> {
    decoder: &'d mut PacketDecoder,
    bytes: core::slice::Iter<'b, u8>,
}
impl Iterator for Feed<'_, '_> {
    type Item = Result<Packet, PacketError>;

    fn next(&mut self) -> Option<Self::Item> {
        for &byte in self.bytes.by_ref() {
            match self.decoder.consume(byte) {
                Ok(false) => {}
                Ok(true) => return self.decoder.packet().map(Ok),
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}
