// Command channel: Bluetooth/USB serial port or stdin/stdout.
//
// A blocking reader thread forwards raw bytes into a tokio channel; the control
// loop drains it without blocking and writes replies straight to the port.

use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, warn};

/// Read timeout of the serial reader thread
const READ_TIMEOUT_MS: u64 = 20;
/// Chunks buffered between reader thread and control loop
const CHANNEL_DEPTH: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command channel closed")]
    Closed,
}

/// Where commands come from and replies go to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSource {
    Serial { port: String, baudrate: u32 },
    Stdio,
}

pub struct CommandLink {
    rx: mpsc::Receiver<Vec<u8>>,
    writer: Box<dyn Write + Send>,
}

impl CommandLink {
    pub fn open(source: &CommandSource) -> Result<Self, LinkError> {
        match source {
            CommandSource::Serial { port, baudrate } => Self::serial(port, *baudrate),
            CommandSource::Stdio => Ok(Self::stdio()),
        }
    }

    /// Serial port (e.g. /dev/rfcomm0 for a paired Bluetooth module)
    pub fn serial(port_name: &str, baudrate: u32) -> Result<Self, LinkError> {
        info!("Opening command channel on {} @ {}", port_name, baudrate);
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(READ_TIMEOUT_MS))
            .open()?;
        let reader = port.try_clone()?;
        Ok(Self::spawn(reader, Box::new(port)))
    }

    /// Commands on stdin, replies on stdout
    pub fn stdio() -> Self {
        info!("Reading commands from stdin");
        Self::spawn(std::io::stdin(), Box::new(std::io::stdout()))
    }

    /// Build a link from any reader/writer pair
    pub fn spawn<R>(reader: R, writer: Box<dyn Write + Send>) -> Self
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        thread::spawn(move || forward_bytes(reader, tx));
        Self { rx, writer }
    }

    /// Next chunk of received bytes, if any arrived
    pub fn try_recv(&mut self) -> Result<Option<Vec<u8>>, LinkError> {
        match self.rx.try_recv() {
            Ok(bytes) => Ok(Some(bytes)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LinkError::Closed),
        }
    }

    /// Write one reply line, newline terminated
    pub fn send_line(&mut self, line: &str) -> Result<(), LinkError> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

fn forward_bytes<R: Read>(mut reader: R, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; 256];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                debug!("Command source reached end of input");
                break;
            }
            Ok(n) => {
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    break; // control loop is gone
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Command channel read failed: {}", e);
                break;
            }
        }
    }
}
