//! In-process timer driver
//!
//! Stands in for the Bluetooth transport: the paired
//! [`SimulatedDriverHandle`] plays the physical timer, pushing events and
//! deciding whether connection attempts succeed.

use crate::domain::models::HardwareEvent;
use crate::infrastructure::bluetooth::driver::{DriverError, TimerDriver};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct SimulatedState {
    connected: bool,
    sink: Option<mpsc::UnboundedSender<HardwareEvent>>,
    connect_attempts: Vec<bool>,
    disconnect_calls: usize,
    connect_failures: VecDeque<DriverError>,
}

fn lock(state: &Mutex<SimulatedState>) -> MutexGuard<'_, SimulatedState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct SimulatedDriver {
    state: Arc<Mutex<SimulatedState>>,
    connect_latency: Duration,
}

impl SimulatedDriver {
    pub fn new() -> (Self, SimulatedDriverHandle) {
        let state = Arc::new(Mutex::new(SimulatedState::default()));
        let driver = Self {
            state: state.clone(),
            connect_latency: Duration::ZERO,
        };
        (driver, SimulatedDriverHandle { state })
    }

    /// Time a connect attempt takes before it resolves
    pub fn with_connect_latency(mut self, latency: Duration) -> Self {
        self.connect_latency = latency;
        self
    }
}

impl TimerDriver for SimulatedDriver {
    async fn connect(&mut self, reconnect: bool) -> Result<(), DriverError> {
        info!("Simulated timer connecting (reconnect: {})", reconnect);
        if !self.connect_latency.is_zero() {
            tokio::time::sleep(self.connect_latency).await;
        }

        let mut state = lock(&self.state);
        state.connect_attempts.push(reconnect);
        if let Some(err) = state.connect_failures.pop_front() {
            debug!("Simulated connect failing: {}", err);
            return Err(err);
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DriverError> {
        let mut state = lock(&self.state);
        state.disconnect_calls += 1;
        if state.connected {
            info!("Simulated timer disconnected");
            state.connected = false;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    fn set_event_sink(&mut self, sink: mpsc::UnboundedSender<HardwareEvent>) {
        lock(&self.state).sink = Some(sink);
    }
}

/// The "device" side of a [`SimulatedDriver`]
#[derive(Clone)]
pub struct SimulatedDriverHandle {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedDriverHandle {
    /// Push an event as the device would. Only delivered while connected;
    /// returns whether it reached the sink.
    pub fn emit(&self, event: HardwareEvent) -> bool {
        let mut state = lock(&self.state);
        if !state.connected {
            debug!("Simulated timer offline, {:?} not sent", event);
            return false;
        }
        if event == HardwareEvent::Disconnect {
            state.connected = false;
        }
        state
            .sink
            .as_ref()
            .map(|sink| sink.send(event).is_ok())
            .unwrap_or(false)
    }

    /// Switch the device off, dropping the link
    pub fn power_off(&self) -> bool {
        self.emit(HardwareEvent::Disconnect)
    }

    /// Make the next connect attempt fail with `err`. Queues if called repeatedly.
    pub fn fail_next_connect(&self, err: DriverError) {
        lock(&self.state).connect_failures.push_back(err);
    }

    /// `reconnect` flag of every connect attempt so far
    pub fn connect_attempts(&self) -> Vec<bool> {
        lock(&self.state).connect_attempts.clone()
    }

    pub fn disconnect_calls(&self) -> usize {
        lock(&self.state).disconnect_calls
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }
}
