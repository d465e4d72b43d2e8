// Slew-rate limiter for the H-bridge PWM outputs.
//
// Instead of a blocking step/delay loop, the ramp is advanced by the control
// loop: `advance(now)` performs at most one step per elapsed step delay, so the
// PWM rate of change stays bounded no matter how often the loop polls.

use std::time::{Duration, Instant};

/// Applied/target PWM of a single motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmRamp {
    applied: u16,
    target: u16,
    step: u16,
    max: u16,
}

impl PwmRamp {
    pub fn new(step: u16, max: u16) -> Self {
        Self {
            applied: 0,
            target: 0,
            step: step.max(1),
            max,
        }
    }

    /// Target is clamped into [0, max]
    pub fn set_target(&mut self, target: u16) {
        self.target = target.min(self.max);
    }

    /// Jump straight to `value` (bypasses the slew limit)
    pub fn force(&mut self, value: u16) {
        self.applied = value.min(self.max);
        self.target = self.applied;
    }

    /// Move one step toward the target without overshooting it
    pub fn step(&mut self) -> u16 {
        if self.applied < self.target {
            self.applied = self.applied.saturating_add(self.step).min(self.target);
        } else if self.applied > self.target {
            self.applied = self.applied.saturating_sub(self.step).max(self.target);
        }
        self.applied
    }

    pub fn applied(&self) -> u16 {
        self.applied
    }

    pub fn target(&self) -> u16 {
        self.target
    }

    pub fn is_settled(&self) -> bool {
        self.applied == self.target
    }
}

/// Both motors ramped in lockstep on a shared step clock
#[derive(Debug, Clone)]
pub struct DualRamp {
    a: PwmRamp,
    b: PwmRamp,
    step_delay: Duration,
    last_step_at: Option<Instant>,
    next_step_at: Option<Instant>,
}

impl DualRamp {
    pub fn new(step: u16, max: u16, step_delay: Duration) -> Self {
        Self {
            a: PwmRamp::new(step, max),
            b: PwmRamp::new(step, max),
            step_delay,
            last_step_at: None,
            next_step_at: None,
        }
    }

    /// Set new targets. The first step is due now, unless the previous step was
    /// less than one step delay ago.
    pub fn retarget(&mut self, pwm_a: u16, pwm_b: u16, now: Instant) {
        self.a.set_target(pwm_a);
        self.b.set_target(pwm_b);

        if self.is_settled() {
            self.next_step_at = None;
        } else if self.next_step_at.is_none() {
            let earliest = self
                .last_step_at
                .map(|t| (t + self.step_delay).max(now))
                .unwrap_or(now);
            self.next_step_at = Some(earliest);
        }
    }

    /// Zero both motors immediately
    pub fn halt(&mut self) {
        self.a.force(0);
        self.b.force(0);
        self.next_step_at = None;
    }

    /// Perform one step if one is due. Returns true when the applied PWM changed.
    pub fn advance(&mut self, now: Instant) -> bool {
        match self.next_step_at {
            Some(due) if now >= due => {
                self.a.step();
                self.b.step();
                self.last_step_at = Some(now);
                self.next_step_at = if self.is_settled() {
                    None
                } else {
                    Some(now + self.step_delay)
                };
                true
            }
            _ => false,
        }
    }

    pub fn applied(&self) -> (u16, u16) {
        (self.a.applied(), self.b.applied())
    }

    pub fn target(&self) -> (u16, u16) {
        (self.a.target(), self.b.target())
    }

    pub fn is_settled(&self) -> bool {
        self.a.is_settled() && self.b.is_settled()
    }

    /// Time left until both motors reach target, assuming steps happen on time
    pub fn remaining(&self) -> Duration {
        let steps = |r: &PwmRamp| r.applied().abs_diff(r.target()).div_ceil(r.step) as u32;
        let count = steps(&self.a).max(steps(&self.b));
        if count == 0 {
            Duration::ZERO
        } else {
            self.step_delay * (count - 1)
        }
    }
}
