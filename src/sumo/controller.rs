// Sumo controller: command bytes -> direction state -> ramped dual-motor driver

use std::time::Instant;

use tracing::{debug, info};

use super::command::{interpret, transition, Directive, Transition};
use crate::config::DriveTuning;
use crate::messages::MotorCommand;
use crate::motor::{motion_target, BoardError, DriveState, DualMotorDriver, HBridge};

pub struct SumoController<B: HBridge> {
    driver: DualMotorDriver<B>,
    tuning: DriveTuning,
    direction: MotorCommand,
    scale: u16,
}

impl<B: HBridge> SumoController<B> {
    /// Starts stopped at full speed scale
    pub fn new(bridge: B, tuning: DriveTuning) -> Self {
        Self {
            driver: DualMotorDriver::new(bridge, &tuning),
            scale: tuning.max_pwm,
            tuning,
            direction: MotorCommand::Stop,
        }
    }

    /// Feed one byte from the command channel
    pub fn on_byte(&mut self, byte: u8, now: Instant) -> Result<(), BoardError> {
        match interpret(byte, self.tuning.max_pwm) {
            Some(Directive::Scale(scale)) => {
                debug!("Speed scale {} -> {}", self.scale, scale);
                self.scale = scale;
                // same direction, new speed
                self.issue(self.direction, now)
            }
            Some(Directive::Go(cmd)) => self.issue(cmd, now),
            None => {
                debug!("Ignoring byte {:#04x}", byte);
                Ok(())
            }
        }
    }

    /// Move to `next`, braking first when it reverses the chassis
    pub fn issue(&mut self, next: MotorCommand, now: Instant) -> Result<(), BoardError> {
        let target = motion_target(next, self.scale, &self.tuning);
        let step = transition(self.direction, next);
        if next != self.direction {
            info!("Direction {:?} -> {:?} ({:?})", self.direction, next, step);
        }
        self.direction = next;

        match step {
            Transition::Halt => return self.driver.stop(),
            // motors stay at zero until the running brake hold ends
            _ if self.driver.replace_pending(target) => {
                debug!("Brake held, {:?} queued for release", next);
                return Ok(());
            }
            Transition::Direct => self.driver.apply(target, now)?,
            Transition::BrakeThen => self.driver.brake_then(target, now)?,
        }

        if self.driver.is_busy() {
            debug!("{:?} settles in {:?}", next, self.driver.settle_time(now));
        }
        Ok(())
    }

    /// Advance ramp and brake timing
    pub fn tick(&mut self, now: Instant) -> Result<(), BoardError> {
        self.driver.tick(now)
    }

    pub fn direction(&self) -> MotorCommand {
        self.direction
    }

    pub fn scale(&self) -> u16 {
        self.scale
    }

    pub fn drive_state(&self) -> DriveState {
        self.driver.state()
    }

    pub fn driver(&self) -> &DualMotorDriver<B> {
        &self.driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::{DirectionPins, Polarity};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingBridge {
        writes: Vec<(DirectionPins, u16, u16)>,
    }

    impl HBridge for RecordingBridge {
        fn write_bridge(&mut self, pins: DirectionPins, pwm_a: u16, pwm_b: u16) -> Result<(), BoardError> {
            self.writes.push((pins, pwm_a, pwm_b));
            Ok(())
        }
    }

    const LOOP: Duration = Duration::from_millis(2);

    fn controller() -> SumoController<RecordingBridge> {
        SumoController::new(RecordingBridge::default(), DriveTuning::default())
    }

    /// Tick the controller every 2 ms for `span`
    fn run_for(ctl: &mut SumoController<RecordingBridge>, start: Instant, span: Duration) -> Instant {
        let mut now = start;
        while now < start + span {
            now += LOOP;
            ctl.tick(now).unwrap();
        }
        now
    }

    fn send(ctl: &mut SumoController<RecordingBridge>, bytes: &[u8], now: Instant) {
        for &b in bytes {
            ctl.on_byte(b, now).unwrap();
        }
    }

    #[test]
    fn test_initial_state_is_stop() {
        let ctl = controller();
        assert_eq!(ctl.direction(), MotorCommand::Stop);
        assert_eq!(ctl.scale(), 255);
        assert_eq!(ctl.drive_state().applied, (0, 0));
    }

    #[test]
    fn test_forward_ramps_to_full_scale() {
        let t0 = Instant::now();
        let mut ctl = controller();
        send(&mut ctl, b"F", t0);
        run_for(&mut ctl, t0, Duration::from_millis(600));
        let state = ctl.drive_state();
        assert_eq!(state.applied, (255, 255));
        assert_eq!(state.pins, DirectionPins::new(Polarity::Forward, Polarity::Forward));
    }

    #[test]
    fn test_scale_change_keeps_direction() {
        let t0 = Instant::now();
        let mut ctl = controller();
        send(&mut ctl, b"l", t0);
        let t1 = run_for(&mut ctl, t0, Duration::from_millis(600));
        assert_eq!(ctl.drive_state().applied, (216, 216));

        send(&mut ctl, b"5", t1);
        assert_eq!(ctl.direction(), MotorCommand::Left);
        assert_eq!(ctl.scale(), 127);
        run_for(&mut ctl, t1, Duration::from_millis(600));
        assert_eq!(ctl.drive_state().applied, (107, 107));
    }

    #[test]
    fn test_scale_change_while_stopped_stays_stopped() {
        let t0 = Instant::now();
        let mut ctl = controller();
        send(&mut ctl, b"7", t0);
        run_for(&mut ctl, t0, Duration::from_millis(100));
        assert_eq!(ctl.direction(), MotorCommand::Stop);
        assert_eq!(ctl.drive_state().applied, (0, 0));
    }

    #[test]
    fn test_unknown_bytes_change_nothing() {
        let t0 = Instant::now();
        let mut ctl = controller();
        send(&mut ctl, b"F", t0);
        let before = ctl.drive_state();
        let writes = ctl.driver().bridge().writes.len();
        send(&mut ctl, b"xz?\r\n", t0);
        assert_eq!(ctl.drive_state(), before);
        assert_eq!(ctl.direction(), MotorCommand::Forward);
        assert_eq!(ctl.driver().bridge().writes.len(), writes);
    }

    #[test]
    fn test_stop_is_idempotent_and_immediate() {
        let t0 = Instant::now();
        let mut ctl = controller();
        send(&mut ctl, b"F", t0);
        let t1 = run_for(&mut ctl, t0, Duration::from_millis(100));
        send(&mut ctl, b"SS", t1);
        assert_eq!(ctl.drive_state().applied, (0, 0));
        assert_eq!(ctl.drive_state().pins, DirectionPins::RELEASED);
        assert_eq!(ctl.direction(), MotorCommand::Stop);
    }

    #[test]
    fn test_every_reversal_passes_through_stop() {
        let forward_family = [
            MotorCommand::Forward,
            MotorCommand::ForwardLeft,
            MotorCommand::ForwardRight,
        ];
        let backward_family = [
            MotorCommand::Backward,
            MotorCommand::BackLeft,
            MotorCommand::BackRight,
        ];
        let pairs = forward_family
            .iter()
            .flat_map(|f| backward_family.iter().map(move |b| (*f, *b)))
            .flat_map(|(f, b)| [(f, b), (b, f)]);

        for (from, to) in pairs {
            let t0 = Instant::now();
            let mut ctl = controller();
            ctl.issue(from, t0).unwrap();
            let t1 = run_for(&mut ctl, t0, Duration::from_millis(600));
            let from_pins = ctl.drive_state().pins;
            let mark = ctl.driver().bridge().writes.len();

            ctl.issue(to, t1).unwrap();
            assert!(ctl.drive_state().braking, "{:?} -> {:?}", from, to);
            let t2 = run_for(&mut ctl, t1, Duration::from_millis(58));
            assert_eq!(ctl.drive_state().applied, (0, 0));
            run_for(&mut ctl, t2, Duration::from_millis(600));

            let writes = &ctl.driver().bridge().writes[mark..];
            let first_new = writes
                .iter()
                .position(|w| w.0 != from_pins && w.0 != DirectionPins::RELEASED)
                .unwrap();
            assert_eq!(writes[0], (DirectionPins::RELEASED, 0, 0), "{:?} -> {:?}", from, to);
            assert!(writes[..first_new].iter().all(|w| w.1 == 0 && w.2 == 0));
            assert_eq!(ctl.direction(), to);
        }
    }

    #[test]
    fn test_brake_lasts_sixty_ms() {
        let t0 = Instant::now();
        let mut ctl = controller();
        send(&mut ctl, b"F", t0);
        let t1 = run_for(&mut ctl, t0, Duration::from_millis(600));
        send(&mut ctl, b"B", t1);

        ctl.tick(t1 + Duration::from_millis(59)).unwrap();
        assert!(ctl.drive_state().braking);
        ctl.tick(t1 + Duration::from_millis(60)).unwrap();
        let state = ctl.drive_state();
        assert!(!state.braking);
        assert_eq!(state.pins, DirectionPins::new(Polarity::Reverse, Polarity::Reverse));
        assert_eq!(state.applied, (4, 4));
    }

    /// Full speed forward, then `B` at t1 followed by `extra` 2 ms later
    fn reverse_with_repeat(extra: &[u8]) -> (SumoController<RecordingBridge>, Instant) {
        let t0 = Instant::now();
        let mut ctl = controller();
        send(&mut ctl, b"F", t0);
        let t1 = run_for(&mut ctl, t0, Duration::from_millis(600));
        send(&mut ctl, b"B", t1);
        send(&mut ctl, extra, t1 + LOOP);
        (ctl, t1)
    }

    #[test]
    fn test_repeated_letter_keeps_brake() {
        let (mut ctl, t1) = reverse_with_repeat(b"BBB");
        let state = ctl.drive_state();
        assert!(state.braking);
        assert_eq!(state.pins, DirectionPins::RELEASED);
        assert_eq!(state.applied, (0, 0));

        run_for(&mut ctl, t1, Duration::from_millis(58));
        assert!(ctl.drive_state().braking);
        assert_eq!(ctl.drive_state().applied, (0, 0));

        ctl.tick(t1 + Duration::from_millis(60)).unwrap();
        let state = ctl.drive_state();
        assert!(!state.braking);
        assert_eq!(state.pins, DirectionPins::new(Polarity::Reverse, Polarity::Reverse));
        assert_eq!(state.target, (255, 255));
    }

    #[test]
    fn test_scale_digit_during_brake_keeps_brake() {
        let (mut ctl, t1) = reverse_with_repeat(b"7");
        assert!(ctl.drive_state().braking);
        assert_eq!(ctl.drive_state().applied, (0, 0));
        assert_eq!(ctl.direction(), MotorCommand::Backward);

        ctl.tick(t1 + Duration::from_millis(59)).unwrap();
        assert!(ctl.drive_state().braking);
        ctl.tick(t1 + Duration::from_millis(60)).unwrap();
        let state = ctl.drive_state();
        assert_eq!(state.pins, DirectionPins::new(Polarity::Reverse, Polarity::Reverse));
        assert_eq!(state.target, (178, 178));
    }

    #[test]
    fn test_stop_after_repeat_stays_released() {
        let (mut ctl, t1) = reverse_with_repeat(b"S");
        assert!(!ctl.drive_state().braking);
        run_for(&mut ctl, t1, Duration::from_millis(200));
        assert_eq!(ctl.drive_state().pins, DirectionPins::RELEASED);
        assert_eq!(ctl.drive_state().applied, (0, 0));
    }

    #[test]
    fn test_turn_then_reverse_needs_no_brake() {
        let t0 = Instant::now();
        let mut ctl = controller();
        send(&mut ctl, b"FL", t0);
        send(&mut ctl, b"B", t0 + Duration::from_millis(50));
        assert!(!ctl.drive_state().braking);
        assert_eq!(ctl.direction(), MotorCommand::Backward);
    }

    #[test]
    fn test_stop_during_brake_cancels_reversal() {
        let t0 = Instant::now();
        let mut ctl = controller();
        send(&mut ctl, b"F", t0);
        let t1 = run_for(&mut ctl, t0, Duration::from_millis(100));
        send(&mut ctl, b"BS", t1);
        run_for(&mut ctl, t1, Duration::from_millis(200));
        assert_eq!(ctl.drive_state().applied, (0, 0));
        assert_eq!(ctl.drive_state().pins, DirectionPins::RELEASED);
    }
}
