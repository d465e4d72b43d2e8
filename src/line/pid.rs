// PD correction for the line follower.
//
// No integral term: the reflectance array only resolves the line coarsely and
// an integrator winds up on every sharp curve.

use crate::config::LINE_CENTER;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdGains {
    pub kp: f64,
    pub kd: f64,
}

/// Result of one control cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correction {
    pub error: i32,
    pub speed_diff: i32,
    /// m1
    pub left: i16,
    /// m2
    pub right: i16,
}

#[derive(Debug, Clone)]
pub struct PdCorrector {
    gains: PdGains,
    last_error: i32,
}

impl PdCorrector {
    pub fn new(gains: PdGains) -> Self {
        Self {
            gains,
            last_error: 0,
        }
    }

    pub fn gains(&self) -> PdGains {
        self.gains
    }

    pub fn set_gains(&mut self, gains: PdGains) {
        self.gains = gains;
    }

    pub fn last_error(&self) -> i32 {
        self.last_error
    }

    pub fn reset(&mut self) {
        self.last_error = 0;
    }

    /// Signed offset from the centred position
    pub fn error_for(position: u16) -> i32 {
        position as i32 - LINE_CENTER
    }

    /// One PD step. Wheel speeds are clamped to [0, max_speed].
    pub fn compute(&mut self, position: u16, max_speed: u16) -> Correction {
        let error = Self::error_for(position);
        let derivative = (error - self.last_error) as f64;
        // truncates toward zero, saturating on overflow
        let speed_diff = (self.gains.kp * error as f64 + self.gains.kd * derivative) as i32;
        self.last_error = error;

        let max = max_speed as i32;
        let left = max.saturating_add(speed_diff).clamp(0, max) as i16;
        let right = max.saturating_sub(speed_diff).clamp(0, max) as i16;

        Correction {
            error,
            speed_diff,
            left,
            right,
        }
    }
}
