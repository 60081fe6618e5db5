//! Bluetooth Module
//!
//! Connects the GAN smart timer to the host's timing session.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     GanTimerModule                       │
//! │   (dispatch loop + connection lifecycle, public API)     │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼──────────────┐
//!         │             │              │
//!         ▼             ▼              ▼
//! ┌────────────┐  ┌────────────┐  ┌─────────────┐
//! │   Driver   │  │ Reconnect  │  │    State    │
//! │            │  │            │  │   machine   │
//! │ - link     │  │ - delayed  │  │ - session   │
//! │ - events   │  │   retry    │  │ - display   │
//! └────────────┘  └────────────┘  └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`driver`] - Driver contract the transport implements
//! - [`simulated`] - In-process driver for demos and tests
//! - [`reconnect`] - Cancelable delayed reconnect
//! - [`service`] - Module coordinator

pub mod driver;
pub mod reconnect;
pub mod service;
pub mod simulated;

pub use driver::{DriverError, TimerDriver};
pub use service::{ConnectPrompt, GanTimerModule, ModuleInbox, PromptReply};
