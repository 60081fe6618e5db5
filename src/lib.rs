//! Bridge between a GAN Bluetooth smart timer and a host timing session.

pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use domain::context::TimerContext;
pub use domain::models::{
    ConnectionStatus, ElapsedTimePair, HardwareEvent, InspectionPenalty, ModuleCommand,
    ModuleEvent, SessionPhase,
};
pub use infrastructure::bluetooth::{GanTimerModule, TimerDriver};
