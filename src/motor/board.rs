// Serial protocol for the motor/sensor I/O board
//
// Request:  [0xFF, 0xFF, Instruction, Length, Params..., Checksum]
// Response: [0xFF, 0xFF, Instruction, Length, Status, Params..., Checksum]
// Length counts every byte after itself. Checksum is !sum over the bytes
// between header and checksum.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, info, warn};

use super::kinematics::DirectionPins;
use super::{DifferentialDrive, HBridge};
use crate::config::LINE_POSITION_MAX;
use crate::line::LineSensor;

/// Default serial timeout for board replies
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Instruction set
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Ping = 0x01,
    SetBridge = 0x10,
    SetSpeeds = 0x11,
    ReadLine = 0x20,
    CalibrateStep = 0x21,
}

/// Error types for board communication
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response to {instruction:?}: {reason}")]
    InvalidResponse {
        instruction: Instruction,
        reason: String,
    },

    #[error("Checksum mismatch in response to {instruction:?}")]
    ChecksumMismatch { instruction: Instruction },

    #[error("Board rejected {instruction:?} with status 0x{status:02X}")]
    Status { instruction: Instruction, status: u8 },

    #[error("Timeout waiting for response to {instruction:?}")]
    Timeout { instruction: Instruction },
}

pub type Result<T> = std::result::Result<T, BoardError>;

/// I/O board bus - owns the serial link to the H-bridge and sensor array
pub struct BoardBus<P = Box<dyn SerialPort>> {
    port: P,
}

impl BoardBus {
    /// Open a connection to the board
    pub fn open(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    /// Open the board and make sure it answers before anything is driven
    pub fn connect(port_name: &str, baudrate: u32) -> Result<Self> {
        info!("Opening board bus on {} @ {}", port_name, baudrate);
        let mut bus = Self::open(port_name, baudrate)?;
        match bus.ping() {
            Ok(true) => debug!("Board responding"),
            Ok(false) => {
                warn!("Board not responding to ping");
                return Err(BoardError::Timeout {
                    instruction: Instruction::Ping,
                });
            }
            Err(e) => return Err(e),
        }
        info!("Board ready");
        Ok(bus)
    }
}

impl<P: Read + Write> BoardBus<P> {
    /// Wrap an already opened byte stream
    pub fn with_port(port: P) -> Self {
        Self { port }
    }

    /// Calculate checksum for a packet (excluding header)
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    /// Build a packet with header and checksum
    fn build_packet(instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 1) as u8; // params + checksum
        let mut packet = Vec::with_capacity(5 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(instruction as u8);
        packet.push(length);
        packet.extend_from_slice(params);

        let checksum = Self::checksum(&packet[2..]);
        packet.push(checksum);

        packet
    }

    fn read_exact(&mut self, buf: &mut [u8], instruction: Instruction) -> Result<()> {
        self.port.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                BoardError::Timeout { instruction }
            } else {
                BoardError::Io(e)
            }
        })
    }

    /// Read a response packet and return its parameters
    fn read_response(&mut self, instruction: Instruction) -> Result<Vec<u8>> {
        let mut header = [0u8; 2];
        self.read_exact(&mut header, instruction)?;

        if header != HEADER {
            return Err(BoardError::InvalidResponse {
                instruction,
                reason: format!("Invalid header: {:02X?}", header),
            });
        }

        let mut instr_length = [0u8; 2];
        self.read_exact(&mut instr_length, instruction)?;
        let [echoed, length] = instr_length;

        if echoed != instruction as u8 {
            return Err(BoardError::InvalidResponse {
                instruction,
                reason: format!("Instruction mismatch: got 0x{:02X}", echoed),
            });
        }
        if length < 2 {
            return Err(BoardError::InvalidResponse {
                instruction,
                reason: format!("Length {} too short", length),
            });
        }

        // status + params + checksum
        let mut remaining = vec![0u8; length as usize];
        self.read_exact(&mut remaining, instruction)?;

        let (body, checksum) = remaining.split_at(remaining.len() - 1);
        let mut checksum_data = vec![echoed, length];
        checksum_data.extend_from_slice(body);
        if Self::checksum(&checksum_data) != checksum[0] {
            return Err(BoardError::ChecksumMismatch { instruction });
        }

        let status = body[0];
        if status != 0 {
            return Err(BoardError::Status {
                instruction,
                status,
            });
        }

        Ok(body[1..].to_vec())
    }

    /// Send a request and wait for its reply
    fn transact(&mut self, instruction: Instruction, params: &[u8]) -> Result<Vec<u8>> {
        let packet = Self::build_packet(instruction, params);
        self.port.write_all(&packet)?;
        self.port.flush()?;
        self.read_response(instruction)
    }

    /// Check that the board answers
    pub fn ping(&mut self) -> Result<bool> {
        match self.transact(Instruction::Ping, &[]) {
            Ok(_) => Ok(true),
            Err(BoardError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Drive the H-bridge: pin nibble then little-endian PWM for A and B
    pub fn set_bridge(&mut self, pins: DirectionPins, pwm_a: u16, pwm_b: u16) -> Result<()> {
        let [a_lo, a_hi] = pwm_a.to_le_bytes();
        let [b_lo, b_hi] = pwm_b.to_le_bytes();
        let params = [pins.bits(), a_lo, a_hi, b_lo, b_hi];
        debug!("Bridge: pins={:04b}, pwm_a={}, pwm_b={}", pins.bits(), pwm_a, pwm_b);
        self.transact(Instruction::SetBridge, &params)?;
        Ok(())
    }

    /// Signed wheel speeds for the differential drive
    pub fn write_speeds(&mut self, left: i16, right: i16) -> Result<()> {
        let [l_lo, l_hi] = encode_sign_magnitude(left).to_le_bytes();
        let [r_lo, r_hi] = encode_sign_magnitude(right).to_le_bytes();
        self.transact(Instruction::SetSpeeds, &[l_lo, l_hi, r_lo, r_hi])?;
        Ok(())
    }

    /// Calibrated line position, clamped to [0, 5000]
    pub fn read_line(&mut self) -> Result<u16> {
        let response = self.transact(Instruction::ReadLine, &[])?;
        if response.len() < 2 {
            return Err(BoardError::InvalidResponse {
                instruction: Instruction::ReadLine,
                reason: format!("Expected 2 bytes, got {}", response.len()),
            });
        }
        let position = u16::from_le_bytes([response[0], response[1]]);
        Ok(position.min(LINE_POSITION_MAX))
    }

    /// One min/max sampling pass of the sensor calibration
    pub fn sample_calibration(&mut self) -> Result<()> {
        self.transact(Instruction::CalibrateStep, &[])?;
        Ok(())
    }
}

impl<P: Read + Write> HBridge for BoardBus<P> {
    fn write_bridge(&mut self, pins: DirectionPins, pwm_a: u16, pwm_b: u16) -> Result<()> {
        self.set_bridge(pins, pwm_a, pwm_b)
    }
}

impl<P: Read + Write> DifferentialDrive for BoardBus<P> {
    fn set_speeds(&mut self, left: i16, right: i16) -> Result<()> {
        self.write_speeds(left, right)
    }
}

impl<P: Read + Write> LineSensor for BoardBus<P> {
    fn calibrate_step(&mut self) -> Result<()> {
        self.sample_calibration()
    }

    fn read_position(&mut self) -> Result<u16> {
        self.read_line()
    }
}

/// Encode a signed value to sign-magnitude format
/// Bit 15 = sign (1 = negative), Bits 0-14 = magnitude
fn encode_sign_magnitude(value: i16) -> u16 {
    if value >= 0 {
        value as u16
    } else {
        0x8000 | (value.unsigned_abs() & 0x7FFF)
    }
}
