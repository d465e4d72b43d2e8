// Simulated I/O board for running without hardware.
//
// Bridge writes and wheel speeds are logged and kept as state. The line
// position follows a slowly wandering track and is pulled back toward the
// centre by the differential wheel speed, which is enough for the PD loop to
// have something to correct.

use tracing::trace;

use super::kinematics::DirectionPins;
use super::{BoardError, DifferentialDrive, HBridge};
use crate::config::{LINE_CENTER, LINE_POSITION_MAX};
use crate::line::LineSensor;

/// Position shift per unit of (left - right) wheel speed, per read
const STEER_GAIN: f32 = 0.02;
/// Peak drift of the simulated track per read
const TRACK_DRIFT: f32 = 30.0;

#[derive(Debug, Default)]
pub struct SimBoard {
    pub bridge: (DirectionPins, u16, u16),
    pub speeds: (i16, i16),
    pub bridge_writes: u64,
    pub calibration_steps: u32,
    offset: f32,
    reads: u64,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HBridge for SimBoard {
    fn write_bridge(&mut self, pins: DirectionPins, pwm_a: u16, pwm_b: u16) -> Result<(), BoardError> {
        trace!("sim bridge: pins={:04b} a={} b={}", pins.bits(), pwm_a, pwm_b);
        self.bridge = (pins, pwm_a, pwm_b);
        self.bridge_writes += 1;
        Ok(())
    }
}

impl DifferentialDrive for SimBoard {
    fn set_speeds(&mut self, left: i16, right: i16) -> Result<(), BoardError> {
        trace!("sim speeds: left={} right={}", left, right);
        self.speeds = (left, right);
        Ok(())
    }
}

impl LineSensor for SimBoard {
    fn calibrate_step(&mut self) -> Result<(), BoardError> {
        self.calibration_steps += 1;
        Ok(())
    }

    fn read_position(&mut self) -> Result<u16, BoardError> {
        self.reads += 1;
        let drift = TRACK_DRIFT * (self.reads as f32 * 0.01).sin();
        let steer = (self.speeds.0 as f32 - self.speeds.1 as f32) * STEER_GAIN;
        let half = LINE_CENTER as f32;
        self.offset = (self.offset + drift - steer).clamp(-half, half);

        let position = (LINE_CENTER as f32 + self.offset).round() as u16;
        Ok(position.min(LINE_POSITION_MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_stays_in_range() {
        let mut sim = SimBoard::new();
        sim.set_speeds(400, 0).unwrap();
        for _ in 0..5_000 {
            let pos = sim.read_position().unwrap();
            assert!(pos <= LINE_POSITION_MAX);
        }
    }

    #[test]
    fn test_steering_moves_line() {
        let mut sim = SimBoard::new();
        sim.set_speeds(0, 400).unwrap();
        let first = sim.read_position().unwrap();
        for _ in 0..10 {
            sim.read_position().unwrap();
        }
        assert!(sim.read_position().unwrap() > first);
    }

    #[test]
    fn test_records_bridge_output() {
        let mut sim = SimBoard::new();
        sim.write_bridge(DirectionPins::RELEASED, 0, 0).unwrap();
        sim.calibrate_step().unwrap();
        assert_eq!(sim.bridge_writes, 1);
        assert_eq!(sim.calibration_steps, 1);
    }
}
