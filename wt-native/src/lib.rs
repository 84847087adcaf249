//! Process level glue for hosting [wt_server]: logging, configuration, and an acknowledging handler.
mod ack;
mod config;
mod log;

pub use ack::*;
pub use config::*;
pub use log::*;
