use std::fmt::{Display, Formatter};
use std::path::PathBuf;

#[derive(clap::ValueEnum, Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Parity {
    #[default]
    Even,
    Odd,
    None,
}
impl Display for Parity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Parity::Even => write!(f, "even"),
            Parity::Odd => write!(f, "odd"),
            Parity::None => write!(f, "none"),
        }
    }
}

#[derive(clap::Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// USB device to talk to; will try to autodetect if not specified
    #[arg(short, long, global = true)]
    pub(crate) device: Option<PathBuf>,

    /// Baud rate to use
    #[arg(short, long, global = true, default_value_t = wirepkt_common::BAUD_RATE)]
    pub(crate) baud: u32,

    /// Parity bit setting of the serial line
    #[arg(long, global = true, default_value_t)]
    pub(crate) parity: Parity,

    /// Increase message verbosity
    #[arg(short = 'v', global = true, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,

    /// Silence all output except packets
    #[arg(short, long, global = true)]
    pub(crate) quiet: bool,

    #[command(subcommand)]
    pub(crate) command: Cmd,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Command the machine to absolute X, Y, Z positions
    SetPosition {
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
        #[arg(allow_negative_numbers = true)]
        z: i32,
    },
    /// Send a message for the controller to echo back, and print the replies
    Echo {
        message: String,

        /// How long to wait for replies, in milliseconds
        #[arg(long, default_value_t = 1000)]
        wait_ms: u64,
    },
    /// Print every packet received from the device
    Listen {
        /// Abandon a partial frame after this many milliseconds without a byte
        #[arg(long, default_value_t = 100)]
        timeout_ms: u64,
    },
    /// Decode a capture of raw wire bytes; `-` reads stdin
    Decode { file: PathBuf },
    /// Print the wire bytes of a frame as hex
    Encode {
        #[arg(value_parser = clap_num::maybe_hex::<u8>)]
        id: u8,
        /// Payload, as hex
        #[arg(default_value = "")]
        payload: String,
    },
}
