// Line-oriented command protocol of the line follower
//
// START | STOP | PID:<kp>,<kd> | SPEED:<n> | INTERVAL:<ms> | PARAMS
// Lines end with '\n' or '\r'; keywords are case-sensitive.

use std::num::IntErrorKind;

use crate::config::{MAX_SPEED_LIMIT, TELEMETRY_MS_MAX, TELEMETRY_MS_MIN};
use crate::messages::Reply;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineCommand {
    Start,
    Stop,
    SetPid { kp: f64, kd: f64 },
    SetSpeed(u16),
    SetInterval(u32),
    Params,
}

/// Rejected command lines. The Display text is what goes back to the host.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Formato: PID:kp,kd")]
    PidFormat,

    #[error("Formato: SPEED:n")]
    SpeedFormat,

    #[error("Rango SPEED: 0-{}", MAX_SPEED_LIMIT)]
    SpeedRange(i64),

    #[error("Formato: INTERVAL:ms")]
    IntervalFormat,

    #[error("Rango INTERVAL: {}-{}", TELEMETRY_MS_MIN, TELEMETRY_MS_MAX)]
    IntervalRange(i64),

    #[error("Unknown command: {0}")]
    Unknown(String),
}

impl ProtocolError {
    /// Status line reporting this error
    pub fn reply(&self) -> Reply {
        match self {
            ProtocolError::Unknown(cmd) => Reply::Unknown { cmd: cmd.clone() },
            other => Reply::Error {
                msg: other.to_string(),
            },
        }
    }
}

/// Parse one trimmed command line
pub fn parse(line: &str) -> Result<LineCommand, ProtocolError> {
    let line = line.trim();

    if let Some(args) = line.strip_prefix("PID:") {
        return parse_pid(args);
    }
    if let Some(arg) = line.strip_prefix("SPEED:") {
        let speed = parse_integer(arg).ok_or(ProtocolError::SpeedFormat)?;
        return u16::try_from(speed)
            .ok()
            .filter(|s| *s <= MAX_SPEED_LIMIT)
            .map(LineCommand::SetSpeed)
            .ok_or(ProtocolError::SpeedRange(speed));
    }
    if let Some(arg) = line.strip_prefix("INTERVAL:") {
        let ms = parse_integer(arg).ok_or(ProtocolError::IntervalFormat)?;
        return u32::try_from(ms)
            .ok()
            .filter(|ms| (TELEMETRY_MS_MIN..=TELEMETRY_MS_MAX).contains(ms))
            .map(LineCommand::SetInterval)
            .ok_or(ProtocolError::IntervalRange(ms));
    }

    match line {
        "START" => Ok(LineCommand::Start),
        "STOP" => Ok(LineCommand::Stop),
        "PARAMS" => Ok(LineCommand::Params),
        other => Err(ProtocolError::Unknown(other.to_string())),
    }
}

/// Integer argument; values too large for i64 saturate so they fail the range check
fn parse_integer(arg: &str) -> Option<i64> {
    match arg.trim().parse::<i64>() {
        Ok(value) => Some(value),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

fn parse_pid(args: &str) -> Result<LineCommand, ProtocolError> {
    let (kp, kd) = args.split_once(',').ok_or(ProtocolError::PidFormat)?;
    let gain = |s: &str| {
        s.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or(ProtocolError::PidFormat)
    };
    Ok(LineCommand::SetPid {
        kp: gain(kp)?,
        kd: gain(kd)?,
    })
}

/// Splits a byte stream into command lines on '\n' or '\r'
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
    overflowed: bool,
}

/// Longest line kept; anything longer is dropped up to the next terminator
const MAX_LINE: usize = 128;

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns every completed, non-blank line
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            match byte {
                b'\n' | b'\r' => {
                    if !std::mem::take(&mut self.overflowed) {
                        let line = String::from_utf8_lossy(&self.buf).trim().to_string();
                        if !line.is_empty() {
                            lines.push(line);
                        }
                    }
                    self.buf.clear();
                }
                _ if self.overflowed => {}
                _ if self.buf.len() >= MAX_LINE => {
                    self.buf.clear();
                    self.overflowed = true;
                }
                _ => self.buf.push(byte),
            }
        }
        lines
    }
}
