mod args;
mod listen;
mod send;
mod tty;

use crate::args::{Args, Cmd};
use crate::tty::Tty;
use clap::Parser;
use eyre::{ensure, eyre, Result};
use std::fs::DirEntry;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileTypeExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::util::SubscriberInitExt;
use wirepkt_common::command::Command;
use wirepkt_common::MAX_PAYLOAD;

/// Read timeout used while waiting for replies to a command.
const REPLY_TIMEOUT: Duration = Duration::from_millis(100);

fn main() {
    color_eyre::install().expect("Failed to install `color_eyre`");
    let args = Args::parse();

    let level = match (args.quiet, args.verbose) {
        (true, _) => LevelFilter::OFF,
        (false, 0) => LevelFilter::INFO,
        (false, 1) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt::Subscriber::builder()
        .without_time()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .finish()
        .init();

    if let Err(e) = run(args) {
        tracing::error!("{e:?}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let open_tty = |timeout: Duration| -> Result<Tty> {
        let device = resolve_device(args.device.clone())?;
        Tty::new(device, args.baud, args.parity, timeout)
    };

    match args.command {
        Cmd::SetPosition { x, y, z } => {
            let mut tty = open_tty(REPLY_TIMEOUT)?;
            send::send(&Command::SetPosition { position: [x, y, z] }, &mut tty)
        }
        Cmd::Echo { message, wait_ms } => {
            ensure!(
                message.len() <= MAX_PAYLOAD,
                "message of {} bytes exceeds maximum of {MAX_PAYLOAD}",
                message.len()
            );
            let mut tty = open_tty(REPLY_TIMEOUT)?;
            send::send(
                &Command::Echo {
                    message: message.as_bytes(),
                },
                &mut tty,
            )?;
            let deadline = Instant::now() + Duration::from_millis(wait_ms);
            let stats = listen::listen(&mut tty, Some(deadline))?;
            if stats.packets == 0 {
                tracing::warn!("no reply within {wait_ms}ms");
            }
            Ok(())
        }
        Cmd::Listen { timeout_ms } => {
            let mut tty = open_tty(Duration::from_millis(timeout_ms))?;
            listen::listen(&mut tty, None).map(|_| ())
        }
        Cmd::Decode { file } => {
            let stats = listen::decode_file(&file)?;
            tracing::info!(
                "{} packets, {} bad lengths, {} bad checksums",
                stats.packets,
                stats.length_overflows,
                stats.checksum_mismatches
            );
            Ok(())
        }
        Cmd::Encode { id, payload } => {
            let payload = send::parse_payload(&payload)?;
            println!("{}", hex::encode(send::frame_bytes(id, &payload)?));
            Ok(())
        }
    }
}

fn resolve_device(device: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(device) = device {
        return Ok(device);
    }
    tracing::warn!("no device specified, searching for suitable TTY");
    let device = find_most_recent_tty().ok_or_else(|| {
        eyre!(
            "failed to find suitable TTY device; expected device in /dev like one of: {}",
            PATTERNS.map(|p| p.to_string() + "*").join(", ")
        )
    })?;
    tracing::info!("using device {}", device.display());
    Ok(device)
}

static PATTERNS: [&str; 6] = [
    "ttyUSB",
    "ttyACM",
    "tty.usbserial",
    "cu.usbserial",
    "tty.SLAB_USB",
    "cu.SLAB_USB",
];
fn find_most_recent_tty() -> Option<PathBuf> {
    let Some(dev) = std::fs::read_dir("/dev").ok() else {
        tracing::error!("Failed to open /dev");
        return None;
    };
    dev.filter_map(|entry| -> Option<(DirEntry, std::fs::Metadata)> {
        entry.ok().and_then(|e| {
            let metadata = e.metadata().ok()?;

            let ft = e.file_type().ok()?;
            if !ft.is_char_device() {
                return None;
            };

            let path_buf = e.path();
            let file_name = path_buf.file_name()?;
            if !PATTERNS.iter().any(|pattern| {
                std::str::from_utf8(file_name.as_bytes())
                    .map(|f| f.starts_with(pattern))
                    .unwrap_or(false)
            }) {
                return None;
            };
            Some((e, metadata))
        })
    })
    .max_by_key(|(_, m)| m.modified().ok())
    .map(|(e, _)| e.path())
}
