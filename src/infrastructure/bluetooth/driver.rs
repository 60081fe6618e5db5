//! Timer driver contract
//!
//! A driver owns the Bluetooth link to the smart timer, decodes its
//! notifications and pushes them as [`HardwareEvent`]s onto the sink it
//! was given.

use crate::domain::models::HardwareEvent;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("No timer device found")]
    DeviceNotFound,
    #[error("Connection failed: {0}")]
    Connection(String),
}

#[allow(async_fn_in_trait)]
pub trait TimerDriver {
    /// Open the link. `reconnect` is set for automatic attempts after a drop,
    /// letting the driver reuse the last device instead of asking the user.
    async fn connect(&mut self, reconnect: bool) -> Result<(), DriverError>;

    /// Close the link. Must succeed when already disconnected.
    async fn disconnect(&mut self) -> Result<(), DriverError>;

    fn is_connected(&self) -> bool;

    /// Where decoded events go from now on. Replaces any previous sink.
    fn set_event_sink(&mut self, sink: mpsc::UnboundedSender<HardwareEvent>);
}
