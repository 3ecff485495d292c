#![cfg_attr(not(any(test, feature = "std")), no_std)]
//! Packet framing shared by the device firmware and the `wirepkt` host tool.

/// Byte that unconditionally starts a new frame.
pub const DELIMITER: u8 = 0x7e;

/// Byte that marks the following byte as stuffed (XORed with this value).
pub const ESCAPE_MARKER: u8 = 0xa5;

/// Capacity of a packet payload, in bytes.
pub const MAX_PAYLOAD: usize = 32;

/// Baud rate the controller firmware listens at.
pub const BAUD_RATE: u32 = 19200;

// A stuffed byte must never look like a reserved byte on the wire, otherwise the
// escape-unaware delimiter check would cut frames in half.
const _: () = {
    assert!(DELIMITER != ESCAPE_MARKER);
    assert!(DELIMITER ^ ESCAPE_MARKER != DELIMITER);
    assert!(DELIMITER ^ ESCAPE_MARKER != ESCAPE_MARKER);
    assert!(ESCAPE_MARKER ^ ESCAPE_MARKER != DELIMITER);
    assert!(ESCAPE_MARKER ^ ESCAPE_MARKER != ESCAPE_MARKER);
    assert!(MAX_PAYLOAD <= u8::MAX as usize);
};

/// Command payloads understood by the controller.
pub mod command;
/// CRC-8 used as the trailing integrity check.
pub mod checksum;
/// Frame encoding and decoding, for both sides.
pub mod frame;

/// Packet id enumeration.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum MessageId {
    /// Corresponds to [`Command::SetPosition`](command::Command::SetPosition).
    SetPosition = 1,
    /// Corresponds to [`Command::Echo`](command::Command::Echo).
    Echo = 2,
}
impl TryFrom<u8> for MessageId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::SetPosition,
            2 => Self::Echo,
            other => return Err(other),
        })
    }
}
