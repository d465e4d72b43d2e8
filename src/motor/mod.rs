// Motor control for the two-wheel chassis
//
// Provides:
// - Command -> PWM/pin mapping for the dual H-bridge
// - Slew-limited PWM ramp with a timed brake phase
// - Serial protocol for the motor/sensor I/O board, plus a simulated board

mod driver;
pub mod board;
pub mod kinematics;
pub mod ramp;
pub mod sim;

pub use board::{BoardBus, BoardError};
pub use driver::{DriveState, DualMotorDriver};
pub use kinematics::{motion_target, DirectionPins, MotionTarget, Polarity};
pub use sim::SimBoard;

/// Dual H-bridge output: direction pins plus one PWM duty per motor
pub trait HBridge {
    fn write_bridge(&mut self, pins: DirectionPins, pwm_a: u16, pwm_b: u16) -> Result<(), BoardError>;
}

/// Signed wheel speeds, applied as-is (no ramp)
pub trait DifferentialDrive {
    fn set_speeds(&mut self, left: i16, right: i16) -> Result<(), BoardError>;
}

impl<T: HBridge + ?Sized> HBridge for &mut T {
    fn write_bridge(&mut self, pins: DirectionPins, pwm_a: u16, pwm_b: u16) -> Result<(), BoardError> {
        (**self).write_bridge(pins, pwm_a, pwm_b)
    }
}

impl<T: DifferentialDrive + ?Sized> DifferentialDrive for &mut T {
    fn set_speeds(&mut self, left: i16, right: i16) -> Result<(), BoardError> {
        (**self).set_speeds(left, right)
    }
}
