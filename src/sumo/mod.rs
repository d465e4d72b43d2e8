// Sumo drive: single-character commands over Bluetooth serial driving a
// dual H-bridge through the slew-limited ramp

pub mod command;
mod controller;

pub use command::{interpret, transition, Directive, Transition};
pub use controller::SumoController;
