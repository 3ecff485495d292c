use crate::tty::Tty;
use eyre::{Result, WrapErr};
use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;
use std::time::Instant;
use wirepkt_common::command::Command;
use wirepkt_common::frame::{CursorState, Packet, PacketDecoder, PacketError};

/// Tally of what came off the wire.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Stats {
    pub packets: usize,
    pub length_overflows: usize,
    pub checksum_mismatches: usize,
}
impl Stats {
    /// Counts `result`, logging discarded frames, and hands back the packet if there is one.
    pub fn record(&mut self, result: Result<Packet, PacketError>) -> Option<Packet> {
        match result {
            Ok(packet) => {
                self.packets += 1;
                Some(packet)
            }
            Err(e) => {
                match e {
                    PacketError::LengthOverflow { .. } => self.length_overflows += 1,
                    PacketError::ChecksumMismatch { .. } => self.checksum_mismatches += 1,
                }
                tracing::warn!("discarded frame: {e}");
                None
            }
        }
    }
}

/// One-line rendering of a packet, decoded as a [`Command`] where possible.
pub fn describe(packet: &Packet) -> String {
    match Command::parse(packet) {
        Ok(Command::SetPosition { position: [x, y, z] }) => {
            format!("set-position x={x} y={y} z={z}")
        }
        Ok(Command::Echo { message }) => {
            format!("echo {:?}", String::from_utf8_lossy(message))
        }
        Err(e) => {
            tracing::trace!("not a command: {e}");
            format!(
                "id={:02x} len={} payload={}",
                packet.id,
                packet.len(),
                hex::encode(packet.payload())
            )
        }
    }
}

/// Decodes a finite capture of wire bytes, writing one line per packet to `out`.
pub fn decode_reader<R: Read, W: Write>(mut reader: R, out: &mut W) -> Result<Stats> {
    let mut decoder = PacketDecoder::new();
    let mut stats = Stats::default();
    let mut buf = [0u8; 4096];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).wrap_err("failed to read capture"),
        };
        for result in decoder.feed(&buf[..n]) {
            if let Some(packet) = stats.record(result) {
                writeln!(out, "{}", describe(&packet))?;
            }
        }
    }
    if decoder.state() != CursorState::Idle {
        tracing::warn!("capture ended mid-frame in state {:?}", decoder.state());
    }
    Ok(stats)
}

pub fn decode_file(path: &Path) -> Result<Stats> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if path.as_os_str() == "-" {
        decode_reader(io::stdin().lock(), &mut out)
    } else {
        let file = File::open(path).wrap_err_with(|| format!("failed to open {}", path.display()))?;
        decode_reader(file, &mut out)
    }
}

/// Prints packets from the device until `deadline` passes, or forever if there is none.
///
/// A read timeout in the middle of a frame abandons that frame.
pub fn listen(tty: &mut Tty, deadline: Option<Instant>) -> Result<Stats> {
    let mut decoder = PacketDecoder::new();
    let mut stats = Stats::default();
    let stdout = io::stdout();
    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(stats);
        }
        let byte = match tty.read8() {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::TimedOut => {
                if decoder.state() != CursorState::Idle {
                    tracing::debug!("timed out in state {:?}, abandoning frame", decoder.state());
                    decoder.reset();
                }
                continue;
            }
            Err(e) => {
                return Err(e).wrap_err_with(|| format!("failed to read {}", tty.path().display()))
            }
        };
        tracing::trace!("< {byte:02x}");
        let result = match decoder.consume(byte) {
            Ok(false) => continue,
            Ok(true) => match decoder.packet() {
                Some(packet) => Ok(packet),
                None => continue,
            },
            Err(e) => Err(e),
        };
        if let Some(packet) = stats.record(result) {
            writeln!(stdout.lock(), "{}", describe(&packet))?;
        }
    }
}
