// High-level driver for the sumo chassis
//
// Combines the command mapping and the PWM ramp on top of any H-bridge output.
// Direction pins change immediately; PWM follows the slew limit. Stop is the
// only immediate PWM change.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::kinematics::{DirectionPins, MotionTarget};
use super::ramp::DualRamp;
use super::{BoardError, HBridge};
use crate::config::DriveTuning;

/// Snapshot of what the driver is currently outputting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveState {
    pub pins: DirectionPins,
    pub applied: (u16, u16),
    pub target: (u16, u16),
    pub braking: bool,
}

/// Ramped dual-motor driver
pub struct DualMotorDriver<B: HBridge> {
    bridge: B,
    ramp: DualRamp,
    pins: DirectionPins,
    brake_delay: Duration,
    // (release time, motion to enter once released)
    pending: Option<(Instant, MotionTarget)>,
}

impl<B: HBridge> DualMotorDriver<B> {
    pub fn new(bridge: B, tuning: &DriveTuning) -> Self {
        Self {
            bridge,
            ramp: DualRamp::new(tuning.ramp_step, tuning.max_pwm, tuning.ramp_step_delay()),
            pins: DirectionPins::RELEASED,
            brake_delay: tuning.brake_delay(),
            pending: None,
        }
    }

    /// Set direction pins now and start ramping toward the target PWM
    pub fn apply(&mut self, target: MotionTarget, now: Instant) -> Result<(), BoardError> {
        self.pending = None;
        self.pins = target.pins;
        self.ramp.retarget(target.pwm_a, target.pwm_b, now);
        self.ramp.advance(now);
        self.flush()
    }

    /// Zero both motors and release all pins immediately
    pub fn stop(&mut self) -> Result<(), BoardError> {
        if self.pending.take().is_some() {
            debug!("Pending motion after brake cancelled");
        }
        self.ramp.halt();
        self.pins = DirectionPins::RELEASED;
        self.flush()
    }

    /// Stop now, hold for the brake delay, then apply `target`
    pub fn brake_then(&mut self, target: MotionTarget, now: Instant) -> Result<(), BoardError> {
        self.stop()?;
        info!("Braking for {}ms before reversing", self.brake_delay.as_millis());
        self.pending = Some((now + self.brake_delay, target));
        Ok(())
    }

    /// While a brake is held, swap the motion entered on release. The release
    /// time is kept. Returns false when no brake is pending.
    pub fn replace_pending(&mut self, target: MotionTarget) -> bool {
        match self.pending.as_mut() {
            Some((_, next)) => {
                *next = target;
                true
            }
            None => false,
        }
    }

    /// Advance the brake hold and the ramp; call every loop iteration
    pub fn tick(&mut self, now: Instant) -> Result<(), BoardError> {
        if let Some((release_at, next)) = self.pending {
            if now < release_at {
                return Ok(());
            }
            debug!("Brake released");
            return self.apply(next, now);
        }

        if self.ramp.advance(now) {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BoardError> {
        let (pwm_a, pwm_b) = self.ramp.applied();
        self.bridge.write_bridge(self.pins, pwm_a, pwm_b)
    }

    /// True while braking or ramping
    pub fn is_busy(&self) -> bool {
        self.pending.is_some() || !self.ramp.is_settled()
    }

    /// Worst-case time until the current motion is fully applied
    pub fn settle_time(&self, now: Instant) -> Duration {
        match self.pending {
            Some((release_at, _)) => release_at.saturating_duration_since(now),
            None => self.ramp.remaining(),
        }
    }

    pub fn state(&self) -> DriveState {
        DriveState {
            pins: self.pins,
            applied: self.ramp.applied(),
            target: self.ramp.target(),
            braking: self.pending.is_some(),
        }
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }
}

impl<B: HBridge> Drop for DualMotorDriver<B> {
    fn drop(&mut self) {
        // Try to stop motors when driver is dropped (safety measure)
        if let Err(e) = self.stop() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}
