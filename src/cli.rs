// Command line: which controller to run and where it talks to

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{BOARD_BAUDRATE, BOARD_PORT, CMD_BAUDRATE};
use crate::link::CommandSource;

#[derive(Debug, Parser)]
#[command(name = "twinwheel", about = "Dual-motor sumo driver and PD line follower")]
pub struct Cli {
    /// Command channel serial port (e.g. /dev/rfcomm0); stdin/stdout when omitted
    #[arg(long, global = true)]
    pub cmd_port: Option<String>,

    #[arg(long, global = true, default_value_t = CMD_BAUDRATE)]
    pub baud: u32,

    /// Serial port of the motor/sensor board
    #[arg(long, global = true, default_value = BOARD_PORT)]
    pub board_port: String,

    #[arg(long, global = true, default_value_t = BOARD_BAUDRATE)]
    pub board_baud: u32,

    /// Drive a simulated board instead of hardware
    #[arg(long, global = true)]
    pub simulate: bool,

    /// JSON tuning file, see `config::Tuning`
    #[arg(long, global = true)]
    pub tuning: Option<PathBuf>,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Mode {
    /// Single-byte driving commands with ramped, brake-protected reversals
    Sumo,
    /// PD line follower with JSON tuning and telemetry
    Line {
        /// Start without the sensor calibration sweep
        #[arg(long)]
        skip_calibration: bool,
    },
}

impl Cli {
    pub fn command_source(&self) -> CommandSource {
        match &self.cmd_port {
            Some(port) => CommandSource::Serial {
                port: port.clone(),
                baudrate: self.baud,
            },
            None => CommandSource::Stdio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_use_stdio_and_hardware() {
        let cli = Cli::try_parse_from(["twinwheel", "sumo"]).unwrap();
        assert_eq!(cli.mode, Mode::Sumo);
        assert_eq!(cli.command_source(), CommandSource::Stdio);
        assert_eq!(cli.board_port, BOARD_PORT);
        assert_eq!(cli.board_baud, BOARD_BAUDRATE);
        assert!(!cli.simulate);
        assert!(cli.tuning.is_none());
    }

    #[test]
    fn test_line_options() {
        let cli = Cli::try_parse_from([
            "twinwheel",
            "line",
            "--skip-calibration",
            "--cmd-port",
            "/dev/rfcomm0",
            "--baud",
            "9600",
            "--simulate",
        ])
        .unwrap();
        assert_eq!(
            cli.mode,
            Mode::Line {
                skip_calibration: true
            }
        );
        assert_eq!(
            cli.command_source(),
            CommandSource::Serial {
                port: "/dev/rfcomm0".into(),
                baudrate: 9600
            }
        );
        assert!(cli.simulate);
    }

    #[test]
    fn test_mode_required() {
        assert!(Cli::try_parse_from(["twinwheel"]).is_err());
    }
}
