// Line follower: PD steering on a calibrated reflectance array, tuned and
// monitored over a line-oriented JSON serial protocol

mod controller;
pub mod pid;
pub mod protocol;
pub mod sensor;
pub mod telemetry;

pub use controller::LineController;
pub use pid::{Correction, PdCorrector, PdGains};
pub use protocol::{parse, LineCommand, LineFramer, ProtocolError};
pub use sensor::{calibrate, CalibrationPlan, LineSensor};
pub use telemetry::TelemetryTimer;
