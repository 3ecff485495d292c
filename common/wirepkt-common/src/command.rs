use crate::frame::Packet;
use crate::{MessageId, MAX_PAYLOAD};
use thiserror::Error;

/// Size of a [`Command::SetPosition`] payload: X, Y, Z as little-endian `i32`s.
pub const SET_POSITION_LEN: usize = 3 * size_of::<i32>();

#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum CommandError {
    #[error("unknown message id: {0:02x}")]
    UnknownId(u8),
    #[error("bad payload length for {id:?}: expected {expected}, got {found}")]
    BadLength {
        id: MessageId,
        expected: usize,
        found: usize,
    },
}

/// Commands sent from the host to the controller.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Command<'a> {
    /// Move the machine to absolute X, Y, Z positions.
    SetPosition { position: [i32; 3] },
    /// Ask the controller to send `message` back.
    Echo { message: &'a [u8] },
}

impl<'a> Command<'a> {
    pub fn id(&self) -> MessageId {
        match self {
            Command::SetPosition { .. } => MessageId::SetPosition,
            Command::Echo { .. } => MessageId::Echo,
        }
    }

    /// Writes the payload into `buf` and returns its length. Echo messages longer than
    /// [`MAX_PAYLOAD`] are truncated.
    pub fn write_payload(&self, buf: &mut [u8; MAX_PAYLOAD]) -> usize {
        match self {
            Command::SetPosition { position } => {
                for (chunk, axis) in buf.chunks_exact_mut(4).zip(position) {
                    chunk.copy_from_slice(&axis.to_le_bytes());
                }
                SET_POSITION_LEN
            }
            Command::Echo { message } => {
                let n = message.len().min(MAX_PAYLOAD);
                buf[..n].copy_from_slice(&message[..n]);
                n
            }
        }
    }

    pub fn parse(packet: &'a Packet) -> Result<Self, CommandError> {
        let id = MessageId::try_from(packet.id).map_err(CommandError::UnknownId)?;
        let payload = packet.payload();
        match id {
            MessageId::SetPosition => {
                if payload.len() != SET_POSITION_LEN {
                    return Err(CommandError::BadLength {
                        id,
                        expected: SET_POSITION_LEN,
                        found: payload.len(),
                    });
                }
                let mut position = [0i32; 3];
                for (axis, chunk) in position.iter_mut().zip(payload.chunks_exact(4)) {
                    *axis = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                }
                Ok(Command::SetPosition { position })
            }
            MessageId::Echo => Ok(Command::Echo { message: payload }),
        }
    }
}
