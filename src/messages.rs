// Message types crossing the command channel

use serde::Serialize;

/// Discrete motion command for the sumo drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotorCommand {
    Forward,
    Backward,
    #[default]
    Stop,
    Left,
    Right,
    ForwardLeft,
    ForwardRight,
    BackLeft,
    BackRight,
}

/// Which way the chassis travels along its long axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Forward,
    Backward,
    /// Stop and in-place turns
    Neutral,
}

impl MotorCommand {
    pub const ALL: [MotorCommand; 9] = [
        MotorCommand::Forward,
        MotorCommand::Backward,
        MotorCommand::Stop,
        MotorCommand::Left,
        MotorCommand::Right,
        MotorCommand::ForwardLeft,
        MotorCommand::ForwardRight,
        MotorCommand::BackLeft,
        MotorCommand::BackRight,
    ];

    pub fn from_letter(letter: u8) -> Option<Self> {
        match letter {
            b'F' => Some(Self::Forward),
            b'B' => Some(Self::Backward),
            b'S' => Some(Self::Stop),
            b'L' => Some(Self::Left),
            b'R' => Some(Self::Right),
            b'G' => Some(Self::ForwardLeft),
            b'I' => Some(Self::ForwardRight),
            b'H' => Some(Self::BackLeft),
            b'J' => Some(Self::BackRight),
            _ => None,
        }
    }

    pub fn sense(self) -> Sense {
        match self {
            Self::Forward | Self::ForwardLeft | Self::ForwardRight => Sense::Forward,
            Self::Backward | Self::BackLeft | Self::BackRight => Sense::Backward,
            Self::Stop | Self::Left | Self::Right => Sense::Neutral,
        }
    }

    /// True when switching between `self` and `other` reverses the chassis
    pub fn is_opposite(self, other: MotorCommand) -> bool {
        matches!(
            (self.sense(), other.sense()),
            (Sense::Forward, Sense::Backward) | (Sense::Backward, Sense::Forward)
        )
    }
}

/// Acknowledgement and status lines emitted by the line follower
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reply {
    Calibrating,
    CalibrationDone,
    Ready { msg: String },
    Running,
    Stopped,
    PidOk { kp: f64, kd: f64 },
    SpeedOk { max_speed: u16 },
    IntervalOk { interval_ms: u32 },
    Error { msg: String },
    Unknown { cmd: String },
}

/// Snapshot answered to `PARAMS`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamsReport {
    pub params: u8,
    #[serde(serialize_with = "four_places")]
    pub kp: f64,
    #[serde(serialize_with = "four_places")]
    pub kd: f64,
    pub max_speed: u16,
    pub interval_ms: u32,
}

/// Periodic status frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Telemetry {
    pub telem: u8,
    pub pos: u16,
    pub err: i32,
    pub m1: i16,
    pub m2: i16,
    #[serde(serialize_with = "four_places")]
    pub kp: f64,
    #[serde(serialize_with = "four_places")]
    pub kd: f64,
    pub spd: u16,
    pub run: u8,
    pub t: u64,
}

/// Anything the line follower writes back, one JSON object per line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Status(Reply),
    Params(ParamsReport),
    Telemetry(Telemetry),
}

impl From<Reply> for Outbound {
    fn from(reply: Reply) -> Self {
        Outbound::Status(reply)
    }
}

impl Outbound {
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn four_places<S: serde::Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64((value * 10_000.0).round() / 10_000.0)
}
