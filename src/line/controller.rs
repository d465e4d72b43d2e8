// Line follower controller: sensor sample -> PD correction -> wheel speeds,
// plus the command handlers and the telemetry frame

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::pid::{PdCorrector, PdGains};
use super::protocol::{parse, LineCommand};
use super::sensor::LineSensor;
use super::telemetry::TelemetryTimer;
use crate::config::{LineTuning, LINE_POSITION_MAX};
use crate::messages::{Outbound, ParamsReport, Reply, Telemetry};
use crate::motor::{BoardError, DifferentialDrive};

pub struct LineController<B: LineSensor + DifferentialDrive> {
    board: B,
    pid: PdCorrector,
    max_speed: u16,
    timer: TelemetryTimer,
    running: bool,
    position: u16,
    error: i32,
    speeds: (i16, i16),
    boot: Instant,
}

impl<B: LineSensor + DifferentialDrive> LineController<B> {
    /// Starts stopped. `boot` is the reference for the telemetry timestamp.
    pub fn new(board: B, tuning: &LineTuning, boot: Instant) -> Self {
        Self {
            board,
            pid: PdCorrector::new(PdGains {
                kp: tuning.kp,
                kd: tuning.kd,
            }),
            max_speed: tuning.max_speed,
            timer: TelemetryTimer::new(Duration::from_millis(tuning.interval_ms as u64)),
            running: false,
            position: LINE_POSITION_MAX / 2,
            error: 0,
            speeds: (0, 0),
            boot,
        }
    }

    /// Parse and execute one command line, returning the reply to send
    pub fn handle_line(&mut self, line: &str) -> Result<Outbound, BoardError> {
        match parse(line) {
            Ok(cmd) => {
                info!("Received command: {:?}", cmd);
                self.execute(cmd)
            }
            Err(e) => {
                warn!("Rejected command {:?}: {}", line, e);
                Ok(e.reply().into())
            }
        }
    }

    pub fn execute(&mut self, cmd: LineCommand) -> Result<Outbound, BoardError> {
        let reply = match cmd {
            LineCommand::Start => {
                self.running = true;
                self.pid.reset();
                Reply::Running
            }
            LineCommand::Stop => {
                self.running = false;
                self.speeds = (0, 0);
                self.board.set_speeds(0, 0)?;
                Reply::Stopped
            }
            LineCommand::SetPid { kp, kd } => {
                self.pid.set_gains(PdGains { kp, kd });
                Reply::PidOk { kp, kd }
            }
            LineCommand::SetSpeed(max_speed) => {
                self.max_speed = max_speed;
                Reply::SpeedOk { max_speed }
            }
            LineCommand::SetInterval(interval_ms) => {
                self.timer.set_interval(Duration::from_millis(interval_ms as u64));
                Reply::IntervalOk { interval_ms }
            }
            LineCommand::Params => return Ok(Outbound::Params(self.params())),
        };
        Ok(reply.into())
    }

    /// One control cycle: sample, correct (when running), drive
    pub fn tick(&mut self) -> Result<(), BoardError> {
        self.position = self.board.read_position()?.min(LINE_POSITION_MAX);

        if self.running {
            let c = self.pid.compute(self.position, self.max_speed);
            debug!(
                "pos={} err={} diff={} m1={} m2={}",
                self.position, c.error, c.speed_diff, c.left, c.right
            );
            self.error = c.error;
            self.speeds = (c.left, c.right);
        } else {
            self.error = PdCorrector::error_for(self.position);
            self.speeds = (0, 0);
        }

        self.board.set_speeds(self.speeds.0, self.speeds.1)
    }

    /// Telemetry frame if the interval has elapsed
    pub fn telemetry(&mut self, now: Instant) -> Option<Telemetry> {
        if !self.timer.due(now) {
            return None;
        }
        Some(self.snapshot(now))
    }

    pub fn snapshot(&self, now: Instant) -> Telemetry {
        let gains = self.pid.gains();
        Telemetry {
            telem: 1,
            pos: self.position,
            err: self.error,
            m1: self.speeds.0,
            m2: self.speeds.1,
            kp: gains.kp,
            kd: gains.kd,
            spd: self.max_speed,
            run: self.running as u8,
            t: now.saturating_duration_since(self.boot).as_millis() as u64,
        }
    }

    pub fn params(&self) -> ParamsReport {
        let gains = self.pid.gains();
        ParamsReport {
            params: 1,
            kp: gains.kp,
            kd: gains.kd,
            max_speed: self.max_speed,
            interval_ms: self.timer.interval().as_millis() as u32,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn speeds(&self) -> (i16, i16) {
        self.speeds
    }

    pub fn board(&self) -> &B {
        &self.board
    }
}

impl<B: LineSensor + DifferentialDrive> Drop for LineController<B> {
    fn drop(&mut self) {
        if let Err(e) = self.board.set_speeds(0, 0) {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}
