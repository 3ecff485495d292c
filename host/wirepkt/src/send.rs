use crate::tty::Tty;
use eyre::{ensure, eyre, Result, WrapErr};
use std::io::Write;
use wirepkt_common::command::Command;
use wirepkt_common::frame::{encoded_len_bound, FrameEncoder};
use wirepkt_common::MAX_PAYLOAD;

/// Builds the bytes that go on the wire for one frame.
pub fn frame_bytes(id: u8, payload: &[u8]) -> Result<Vec<u8>> {
    let mut buf = [0u8; encoded_len_bound(MAX_PAYLOAD)];
    let mut encoder = FrameEncoder::new(&mut buf);
    let wire = encoder
        .write_frame(id, payload)
        .wrap_err(eyre!("failed to encode frame {id:02x}"))?;
    Ok(wire.to_vec())
}

pub fn send(command: &Command, tty: &mut Tty) -> Result<()> {
    let mut payload = [0u8; MAX_PAYLOAD];
    let len = command.write_payload(&mut payload);
    let wire = frame_bytes(command.id() as u8, &payload[..len])?;
    tracing::debug!("> {command:?}: {}", hex::encode(&wire));

    tty.write_all(&wire)
        .wrap_err(eyre!("failed to write {command:?}"))?;
    // make sure to flush
    tty.flush()
        .wrap_err(eyre!("failed to flush {command:?}"))?;
    Ok(())
}

/// Parses a payload given on the command line, e.g. `0102ff`.
pub fn parse_payload(payload: &str) -> Result<Vec<u8>> {
    let bytes = hex::decode(payload.trim()).wrap_err("payload is not valid hex")?;
    ensure!(
        bytes.len() <= MAX_PAYLOAD,
        "payload of {} bytes exceeds maximum of {MAX_PAYLOAD}",
        bytes.len()
    );
    Ok(bytes)
}
