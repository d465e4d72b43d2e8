pub mod cli;
pub mod config;
pub mod line;
pub mod link;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod sumo;
