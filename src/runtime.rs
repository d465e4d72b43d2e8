// Control loops. Each tick drains the command channel without blocking, runs
// one control cycle and, for the line follower, emits telemetry when due.

use std::time::{Duration, Instant};

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::cli::{Cli, Mode};
use crate::config::{DriveTuning, LINE_LOOP_HZ, LineTuning, SUMO_LOOP_HZ, Tuning};
use crate::line::{calibrate, CalibrationPlan, LineCommand, LineController, LineFramer, LineSensor};
use crate::link::{CommandLink, LinkError};
use crate::messages::{Outbound, Reply};
use crate::motor::{BoardBus, DifferentialDrive, HBridge, SimBoard};
use crate::sumo::SumoController;

pub type RunResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const READY_MSG: &str = "Envia START para iniciar";

/// Resolve the CLI into a board, a command link and tuning, then run the loop
pub async fn run(cli: Cli) -> RunResult {
    let tuning = match &cli.tuning {
        Some(path) => {
            info!("Loading tuning from {}", path.display());
            Tuning::load(path)?
        }
        None => Tuning::default(),
    };
    let link = CommandLink::open(&cli.command_source())?;

    match (cli.mode, cli.simulate) {
        (Mode::Sumo, true) => run_sumo(link, SimBoard::new(), tuning.drive).await,
        (Mode::Sumo, false) => {
            let board = BoardBus::connect(&cli.board_port, cli.board_baud)?;
            run_sumo(link, board, tuning.drive).await
        }
        (Mode::Line { skip_calibration }, true) => {
            run_line(link, SimBoard::new(), tuning.line, !skip_calibration).await
        }
        (Mode::Line { skip_calibration }, false) => {
            let board = BoardBus::connect(&cli.board_port, cli.board_baud)?;
            run_line(link, board, tuning.line, !skip_calibration).await
        }
    }
}

pub async fn run_sumo<B: HBridge>(mut link: CommandLink, bridge: B, tuning: DriveTuning) -> RunResult {
    let mut controller = SumoController::new(bridge, tuning);
    let mut tick = interval(Duration::from_millis(1000 / SUMO_LOOP_HZ));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Sumo runtime started: {}Hz loop, ramp {} per {}ms, {}ms brake",
        SUMO_LOOP_HZ, tuning.ramp_step, tuning.ramp_step_ms, tuning.brake_ms
    );

    loop {
        tick.tick().await;
        let now = Instant::now();

        // 1. Drain all pending command bytes (non-blocking), in arrival order
        loop {
            match link.try_recv() {
                Ok(Some(bytes)) => {
                    for byte in bytes {
                        controller.on_byte(byte, now)?;
                    }
                }
                Ok(None) => break,
                Err(LinkError::Closed) => {
                    info!("Command channel closed, stopping");
                    return Ok(()); // driver stops the motors on drop
                }
                Err(e) => return Err(e.into()),
            }
        }

        // 2. Advance ramp / brake hold
        controller.tick(now)?;
    }
}

pub async fn run_line<B>(mut link: CommandLink, mut board: B, tuning: LineTuning, calibrate_first: bool) -> RunResult
where
    B: LineSensor + DifferentialDrive,
{
    let boot = Instant::now();

    if calibrate_first {
        send(&mut link, &Reply::Calibrating.into())?;
        let plan = CalibrationPlan {
            cycles: tuning.calibration_cycles,
            speed: tuning.calibration_speed,
        };
        calibrate(&mut board, &plan)?;
        send(&mut link, &Reply::CalibrationDone.into())?;
    } else {
        info!("Skipping sensor calibration");
    }
    send(
        &mut link,
        &Reply::Ready {
            msg: READY_MSG.to_string(),
        }
        .into(),
    )?;

    let mut controller = LineController::new(board, &tuning, boot);
    let mut framer = LineFramer::new();
    let mut tick = interval(Duration::from_millis(1000 / LINE_LOOP_HZ));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Line runtime started: {}Hz loop, kp={} kd={} max_speed={}, telemetry every {}ms",
        LINE_LOOP_HZ, tuning.kp, tuning.kd, tuning.max_speed, tuning.interval_ms
    );

    loop {
        tick.tick().await;

        // 1. Drain commands; every complete line gets exactly one reply
        loop {
            match link.try_recv() {
                Ok(Some(bytes)) => {
                    for line in framer.push(&bytes) {
                        let reply = controller.handle_line(&line)?;
                        send(&mut link, &reply)?;
                    }
                }
                Ok(None) => break,
                Err(LinkError::Closed) => {
                    info!("Command channel closed, stopping");
                    controller.execute(LineCommand::Stop)?;
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }

        // 2. Sample, correct, drive
        controller.tick()?;

        // 3. Telemetry
        if let Some(frame) = controller.telemetry(Instant::now()) {
            send(&mut link, &Outbound::Telemetry(frame))?;
        }
    }
}

fn send(link: &mut CommandLink, msg: &Outbound) -> RunResult {
    let line = msg.to_line()?;
    link.send_line(&line)?;
    Ok(())
}
