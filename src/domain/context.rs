//! Shared state for the event handler and the connection lifecycle.

use crate::domain::display::DisplayFeedback;
use crate::domain::models::ModuleEvent;
use crate::domain::session::{Clock, SessionState};
use crate::domain::settings::SettingsService;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Everything the timer module reads and mutates while handling events.
///
/// Owned by the module and lent to the state machine for each event, so
/// the enabled flag a handler sees is always the latest one set by the
/// toggle.
pub struct TimerContext {
    pub(crate) enabled: bool,
    pub(crate) session: SessionState,
    pub(crate) display: Box<dyn DisplayFeedback>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) settings: Arc<Mutex<SettingsService>>,
    pub(crate) events: mpsc::UnboundedSender<ModuleEvent>,
}

impl TimerContext {
    pub fn new(
        display: Box<dyn DisplayFeedback>,
        clock: Arc<dyn Clock>,
        settings: Arc<Mutex<SettingsService>>,
        events: mpsc::UnboundedSender<ModuleEvent>,
    ) -> Self {
        Self {
            enabled: false,
            session: SessionState::default(),
            display,
            clock,
            settings,
            events,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn use_inspection(&self) -> bool {
        self.settings
            .lock()
            .map(|s| s.get().use_inspection)
            .unwrap_or(false)
    }

    /// Publish to the host; a closed bus just means nobody is listening
    pub fn publish(&self, event: ModuleEvent) {
        let _ = self.events.send(event);
    }
}
