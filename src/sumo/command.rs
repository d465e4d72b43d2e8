// Single-byte command protocol and direction transition rule

use crate::messages::MotorCommand;
use crate::motor::kinematics::percent_to_pwm;

/// One decoded command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// New speed scale, already mapped to PWM units
    Scale(u16),
    Go(MotorCommand),
}

/// Decode one byte. Letters are case-insensitive; unknown bytes yield None.
pub fn interpret(byte: u8, max_pwm: u16) -> Option<Directive> {
    match byte.to_ascii_uppercase() {
        digit @ b'0'..=b'9' => Some(Directive::Scale(percent_to_pwm((digit - b'0') * 10, max_pwm))),
        b'Q' => Some(Directive::Scale(max_pwm)),
        letter => MotorCommand::from_letter(letter).map(Directive::Go),
    }
}

/// How the driver moves from the current direction to the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Immediate stop, no ramp
    Halt,
    /// Retarget pins and ramp directly
    Direct,
    /// Reversal: stop, hold the brake delay, then ramp into the new direction
    BrakeThen,
}

pub fn transition(current: MotorCommand, next: MotorCommand) -> Transition {
    if next == MotorCommand::Stop {
        Transition::Halt
    } else if current.is_opposite(next) {
        Transition::BrakeThen
    } else {
        Transition::Direct
    }
}
