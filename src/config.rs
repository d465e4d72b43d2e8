// Loop rates, drive limits, PID defaults and the optional JSON tuning file
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// Runtime loop frequencies
pub const SUMO_LOOP_HZ: u64 = 500; // ramp steps are 8 ms apart, poll well above that
pub const LINE_LOOP_HZ: u64 = 200;

// Dual H-bridge (TB6612FNG class) limits
pub const MAX_PWM: u16 = 255;
pub const RAMP_STEP: u16 = 4;
pub const RAMP_STEP_DELAY: Duration = Duration::from_millis(8);
pub const BRAKE_DELAY: Duration = Duration::from_millis(60);

// Per-robot calibration, tuned on the sumo chassis
pub const TURN_FACTOR: f32 = 0.85;
pub const CURVE_FACTOR: f32 = 0.5;

// Line follower
pub const LINE_CENTER: i32 = 2500;
pub const LINE_POSITION_MAX: u16 = 5000;
pub const DEFAULT_KP: f64 = 0.25;
pub const DEFAULT_KD: f64 = 6.0;
pub const DEFAULT_MAX_SPEED: u16 = 400;
pub const MAX_SPEED_LIMIT: u16 = 400;
pub const DEFAULT_TELEMETRY_MS: u32 = 100;
pub const TELEMETRY_MS_MIN: u32 = 10;
pub const TELEMETRY_MS_MAX: u32 = 10_000;

// Startup calibration sweep
pub const CALIBRATION_CYCLES: u32 = 80;
pub const CALIBRATION_SPEED: i16 = 200;

// Serial defaults
pub const CMD_BAUDRATE: u32 = 115_200;
pub const BOARD_BAUDRATE: u32 = 115_200;
pub const BOARD_PORT: &str = "/dev/ttyACM0";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read tuning file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid tuning file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid tuning value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Sumo driver tuning. Every field falls back to the compiled default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveTuning {
    pub max_pwm: u16,
    pub ramp_step: u16,
    pub ramp_step_ms: u64,
    pub brake_ms: u64,
    pub turn_factor: f32,
    pub curve_factor: f32,
}

impl Default for DriveTuning {
    fn default() -> Self {
        Self {
            max_pwm: MAX_PWM,
            ramp_step: RAMP_STEP,
            ramp_step_ms: RAMP_STEP_DELAY.as_millis() as u64,
            brake_ms: BRAKE_DELAY.as_millis() as u64,
            turn_factor: TURN_FACTOR,
            curve_factor: CURVE_FACTOR,
        }
    }
}

impl DriveTuning {
    pub fn ramp_step_delay(&self) -> Duration {
        Duration::from_millis(self.ramp_step_ms)
    }

    pub fn brake_delay(&self) -> Duration {
        Duration::from_millis(self.brake_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pwm == 0 {
            return Err(invalid("max_pwm", "must be positive"));
        }
        if self.ramp_step == 0 {
            return Err(invalid("ramp_step", "must be positive"));
        }
        for (field, factor) in [("turn_factor", self.turn_factor), ("curve_factor", self.curve_factor)] {
            if !(0.0..=1.0).contains(&factor) {
                return Err(invalid(field, format!("{} is outside 0.0-1.0", factor)));
            }
        }
        Ok(())
    }
}

/// Line follower startup parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineTuning {
    pub kp: f64,
    pub kd: f64,
    pub max_speed: u16,
    pub interval_ms: u32,
    pub calibration_cycles: u32,
    pub calibration_speed: i16,
}

impl Default for LineTuning {
    fn default() -> Self {
        Self {
            kp: DEFAULT_KP,
            kd: DEFAULT_KD,
            max_speed: DEFAULT_MAX_SPEED,
            interval_ms: DEFAULT_TELEMETRY_MS,
            calibration_cycles: CALIBRATION_CYCLES,
            calibration_speed: CALIBRATION_SPEED,
        }
    }
}

impl LineTuning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.kp.is_finite() || !self.kd.is_finite() {
            return Err(invalid("kp/kd", "must be finite"));
        }
        if self.max_speed > MAX_SPEED_LIMIT {
            return Err(invalid("max_speed", format!("{} exceeds {}", self.max_speed, MAX_SPEED_LIMIT)));
        }
        if !(TELEMETRY_MS_MIN..=TELEMETRY_MS_MAX).contains(&self.interval_ms) {
            return Err(invalid(
                "interval_ms",
                format!("{} is outside {}-{}", self.interval_ms, TELEMETRY_MS_MIN, TELEMETRY_MS_MAX),
            ));
        }
        if !(1..=MAX_SPEED_LIMIT as i16).contains(&self.calibration_speed) {
            return Err(invalid(
                "calibration_speed",
                format!("{} is outside 1-{}", self.calibration_speed, MAX_SPEED_LIMIT),
            ));
        }
        Ok(())
    }
}

/// Tuning file layout: `{"drive": {...}, "line": {...}}`, both sections optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub drive: DriveTuning,
    pub line: LineTuning,
}

impl Tuning {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let tuning: Tuning = serde_json::from_str(text)?;
        tuning.drive.validate()?;
        tuning.line.validate()?;
        Ok(tuning)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
