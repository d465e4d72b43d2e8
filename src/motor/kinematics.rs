// Direction command -> per-motor PWM targets and H-bridge pin states.
// Motor A is the left wheel, motor B the right wheel.

use crate::config::DriveTuning;
use crate::messages::MotorCommand;

/// Drive direction of one motor. Each variant maps to exactly one legal
/// IN1/IN2 pair, so both pins can never be asserted together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    #[default]
    Off,
    Forward,
    Reverse,
}

impl Polarity {
    /// (IN1, IN2)
    pub fn pins(self) -> (bool, bool) {
        match self {
            Polarity::Off => (false, false),
            Polarity::Forward => (true, false),
            Polarity::Reverse => (false, true),
        }
    }
}

/// Direction pins of both motors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectionPins {
    pub a: Polarity,
    pub b: Polarity,
}

impl DirectionPins {
    pub const RELEASED: DirectionPins = DirectionPins {
        a: Polarity::Off,
        b: Polarity::Off,
    };

    pub fn new(a: Polarity, b: Polarity) -> Self {
        Self { a, b }
    }

    /// Returns pins as array [AIN1, AIN2, BIN1, BIN2]
    pub fn as_array(&self) -> [bool; 4] {
        let (a1, a2) = self.a.pins();
        let (b1, b2) = self.b.pins();
        [a1, a2, b1, b2]
    }

    /// Packs the pins into the low nibble, AIN1 in bit 0
    pub fn bits(&self) -> u8 {
        self.as_array()
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &on)| acc | ((on as u8) << i))
    }
}

/// What the driver should converge to for one command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotionTarget {
    pub pwm_a: u16,
    pub pwm_b: u16,
    pub pins: DirectionPins,
}

impl MotionTarget {
    pub fn stop() -> Self {
        Self::default()
    }
}

fn scaled(scale: u16, factor: f32) -> u16 {
    (scale as f32 * factor.clamp(0.0, 1.0)) as u16
}

/// Map a command at the given speed scale to motor targets
///
/// Straight motions run both motors at `scale`. In-place turns run both at
/// `turn_factor * scale` with opposite polarity. Curves keep the outer motor at
/// `scale` and slow the inner one to `curve_factor * scale`.
pub fn motion_target(cmd: MotorCommand, scale: u16, tuning: &DriveTuning) -> MotionTarget {
    use Polarity::{Forward as Fwd, Reverse as Rev};

    let full = scale.min(tuning.max_pwm);
    let turn = scaled(full, tuning.turn_factor);
    let inner = scaled(full, tuning.curve_factor);

    let (pwm_a, pwm_b, a, b) = match cmd {
        MotorCommand::Stop => return MotionTarget::stop(),
        MotorCommand::Forward => (full, full, Fwd, Fwd),
        MotorCommand::Backward => (full, full, Rev, Rev),
        MotorCommand::Left => (turn, turn, Rev, Fwd),
        MotorCommand::Right => (turn, turn, Fwd, Rev),
        MotorCommand::ForwardLeft => (inner, full, Fwd, Fwd),
        MotorCommand::ForwardRight => (full, inner, Fwd, Fwd),
        MotorCommand::BackLeft => (inner, full, Rev, Rev),
        MotorCommand::BackRight => (full, inner, Rev, Rev),
    };

    MotionTarget {
        pwm_a,
        pwm_b,
        pins: DirectionPins::new(a, b),
    }
}

/// Linear 0-100 % to 0-max mapping, truncating like the integer `map()` on the
/// firmware side
pub fn percent_to_pwm(percent: u8, max_pwm: u16) -> u16 {
    (percent.min(100) as u32 * max_pwm as u32 / 100) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> DriveTuning {
        DriveTuning::default()
    }

    #[test]
    fn test_stop_releases_everything() {
        let target = motion_target(MotorCommand::Stop, 255, &tuning());
        assert_eq!(target, MotionTarget::stop());
        assert_eq!(target.pins.as_array(), [false; 4]);
    }

    #[test]
    fn test_straight_motion_full_scale() {
        let fwd = motion_target(MotorCommand::Forward, 200, &tuning());
        assert_eq!((fwd.pwm_a, fwd.pwm_b), (200, 200));
        assert_eq!(fwd.pins.as_array(), [true, false, true, false]);

        let back = motion_target(MotorCommand::Backward, 200, &tuning());
        assert_eq!((back.pwm_a, back.pwm_b), (200, 200));
        assert_eq!(back.pins.as_array(), [false, true, false, true]);
    }

    #[test]
    fn test_turns_reduced_and_opposed() {
        let left = motion_target(MotorCommand::Left, 200, &tuning());
        assert_eq!((left.pwm_a, left.pwm_b), (170, 170));
        assert_eq!(left.pins, DirectionPins::new(Polarity::Reverse, Polarity::Forward));

        let right = motion_target(MotorCommand::Right, 200, &tuning());
        assert_eq!((right.pwm_a, right.pwm_b), (170, 170));
        assert_eq!(right.pins, DirectionPins::new(Polarity::Forward, Polarity::Reverse));
    }

    #[test]
    fn test_curves_slow_inner_wheel() {
        let cases = [
            (MotorCommand::ForwardLeft, (100, 200), Polarity::Forward),
            (MotorCommand::ForwardRight, (200, 100), Polarity::Forward),
            (MotorCommand::BackLeft, (100, 200), Polarity::Reverse),
            (MotorCommand::BackRight, (200, 100), Polarity::Reverse),
        ];
        for (cmd, pwm, polarity) in cases {
            let target = motion_target(cmd, 200, &tuning());
            assert_eq!((target.pwm_a, target.pwm_b), pwm, "{:?}", cmd);
            assert_eq!(target.pins, DirectionPins::new(polarity, polarity), "{:?}", cmd);
        }
    }

    #[test]
    fn test_custom_factors() {
        let tuning = DriveTuning {
            turn_factor: 0.5,
            curve_factor: 0.25,
            ..DriveTuning::default()
        };
        let left = motion_target(MotorCommand::Left, 200, &tuning);
        assert_eq!(left.pwm_a, 100);
        let curve = motion_target(MotorCommand::ForwardLeft, 200, &tuning);
        assert_eq!((curve.pwm_a, curve.pwm_b), (50, 200));
    }

    #[test]
    fn test_scale_clamped_to_max_pwm() {
        let target = motion_target(MotorCommand::Forward, 1000, &tuning());
        assert_eq!((target.pwm_a, target.pwm_b), (255, 255));
    }

    #[test]
    fn test_pins_never_both_high() {
        for cmd in MotorCommand::ALL {
            let pins = motion_target(cmd, 255, &tuning()).pins.as_array();
            assert!(!(pins[0] && pins[1]), "motor A shorted for {:?}", cmd);
            assert!(!(pins[2] && pins[3]), "motor B shorted for {:?}", cmd);
        }
    }

    #[test]
    fn test_percent_mapping() {
        assert_eq!(percent_to_pwm(0, 255), 0);
        assert_eq!(percent_to_pwm(50, 255), 127);
        assert_eq!(percent_to_pwm(90, 255), 229);
        assert_eq!(percent_to_pwm(100, 255), 255);
        assert_eq!(percent_to_pwm(150, 255), 255);
    }

    #[test]
    fn test_pin_bits() {
        let pins = DirectionPins::new(Polarity::Forward, Polarity::Reverse);
        assert_eq!(pins.bits(), 0b1001);
        assert_eq!(DirectionPins::RELEASED.bits(), 0);
    }
}
