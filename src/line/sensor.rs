// Reflectance sensor array contract and the startup calibration sweep

use tracing::{debug, info};

use crate::config::{CALIBRATION_CYCLES, CALIBRATION_SPEED};
use crate::motor::{BoardError, DifferentialDrive};

/// Calibrated line sensor. Positions are 0..=5000 with 2500 centred.
pub trait LineSensor {
    /// Sample every sensor once, widening its min/max calibration range
    fn calibrate_step(&mut self) -> Result<(), BoardError>;

    fn read_position(&mut self) -> Result<u16, BoardError>;
}

impl<T: LineSensor + ?Sized> LineSensor for &mut T {
    fn calibrate_step(&mut self) -> Result<(), BoardError> {
        (**self).calibrate_step()
    }

    fn read_position(&mut self) -> Result<u16, BoardError> {
        (**self).read_position()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationPlan {
    pub cycles: u32,
    pub speed: i16,
}

impl Default for CalibrationPlan {
    fn default() -> Self {
        Self {
            cycles: CALIBRATION_CYCLES,
            speed: CALIBRATION_SPEED,
        }
    }
}

impl CalibrationPlan {
    /// Wheel speeds for cycle `i`: the second and fourth eighths spin
    /// counter-clockwise, everything else clockwise, so the array sweeps across
    /// the line in both directions and ends up roughly where it started.
    pub fn spin_for(&self, i: u32) -> (i16, i16) {
        let n = self.cycles;
        let ccw = (n / 8..3 * n / 8).contains(&i) || (5 * n / 8..7 * n / 8).contains(&i);
        let speed = self.speed.saturating_abs();
        if ccw {
            (-speed, speed)
        } else {
            (speed, -speed)
        }
    }
}

/// Spin in place while sampling the sensor calibration, then stop
pub fn calibrate<B>(board: &mut B, plan: &CalibrationPlan) -> Result<(), BoardError>
where
    B: LineSensor + DifferentialDrive,
{
    info!("Calibrating line sensors ({} cycles)", plan.cycles);
    for i in 0..plan.cycles {
        let (left, right) = plan.spin_for(i);
        board.set_speeds(left, right)?;
        board.calibrate_step()?;
    }
    board.set_speeds(0, 0)?;
    debug!("Calibration sweep finished");
    Ok(())
}
