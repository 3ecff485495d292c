use crate::args::Parity;
use eyre::{bail, Result, WrapErr};
use nix::sys::termios::{
    self, BaudRate, ControlFlags, FlushArg, InputFlags, SetArg, SpecialCharacterIndices,
};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serial device in raw 8-bit mode, with reads that give up after a timeout.
pub struct Tty {
    file: File,
    path: PathBuf,
}

fn baud_rate(baud: u32) -> Result<BaudRate> {
    Ok(match baud {
        1200 => BaudRate::B1200,
        2400 => BaudRate::B2400,
        4800 => BaudRate::B4800,
        9600 => BaudRate::B9600,
        19200 => BaudRate::B19200,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        115200 => BaudRate::B115200,
        230400 => BaudRate::B230400,
        _ => bail!("unsupported baud rate: {baud}"),
    })
}

/// `VTIME` counts tenths of a second and has to fit in a byte.
fn deciseconds(timeout: Duration) -> u8 {
    (timeout.as_millis() / 100).clamp(1, u8::MAX as u128) as u8
}

impl Tty {
    pub fn new<P: AsRef<Path>>(
        path: P,
        baud: u32,
        parity: Parity,
        timeout: Duration,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(nix::libc::O_NOCTTY)
            .open(path)
            .wrap_err_with(|| format!("failed to open {}", path.display()))?;
        let mut this = Self {
            file,
            path: path.to_path_buf(),
        };
        this.configure(baud, parity, timeout)?;
        this.clear_input()?;
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn configure(&mut self, baud: u32, parity: Parity, timeout: Duration) -> Result<()> {
        let mut tios = termios::tcgetattr(&self.file).wrap_err("failed to tcgetattr")?;

        // no line editing, echo, signals or output processing
        termios::cfmakeraw(&mut tios);
        termios::cfsetspeed(&mut tios, baud_rate(baud)?).wrap_err("failed to set speed")?;

        // 8 data bits, 1 stop bit, no hardware flow control
        tios.control_flags &= !(ControlFlags::CSIZE
            | ControlFlags::CSTOPB
            | ControlFlags::PARENB
            | ControlFlags::PARODD
            | ControlFlags::CRTSCTS);
        tios.control_flags |= ControlFlags::CS8 | ControlFlags::CREAD | ControlFlags::CLOCAL;
        match parity {
            Parity::Even => tios.control_flags |= ControlFlags::PARENB,
            Parity::Odd => tios.control_flags |= ControlFlags::PARENB | ControlFlags::PARODD,
            Parity::None => {}
        }
        // no XON/XOFF: both values can show up inside frames
        tios.input_flags &= !(InputFlags::IXON | InputFlags::IXOFF | InputFlags::IXANY);

        // MIN=0 TIME>0: read returns as soon as a byte is available, or 0 after the timeout
        tios.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
        tios.control_chars[SpecialCharacterIndices::VTIME as usize] = deciseconds(timeout);

        termios::tcsetattr(&self.file, SetArg::TCSADRAIN, &tios)
            .wrap_err("failed to tcsetattr")?;
        tracing::debug!(
            "configured {} at {baud} baud, 8{}1",
            self.path.display(),
            match parity {
                Parity::Even => 'E',
                Parity::Odd => 'O',
                Parity::None => 'N',
            }
        );
        Ok(())
    }

    pub fn clear_input(&mut self) -> Result<()> {
        termios::tcflush(&self.file, FlushArg::TCIFLUSH).wrap_err("failed to tcflush")?;
        Ok(())
    }

    /// Reads a single byte; fails with [`io::ErrorKind::TimedOut`] if none arrives in time.
    pub fn read8(&mut self) -> io::Result<u8> {
        let mut b = [0u8];
        match self.file.read(&mut b)? {
            0 => Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out")),
            _ => Ok(b[0]),
        }
    }
}

impl Write for Tty {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        termios::tcdrain(&self.file).map_err(io::Error::from)
    }
}
