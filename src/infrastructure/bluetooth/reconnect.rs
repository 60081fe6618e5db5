//! Delayed reconnect after the timer drops.

use crate::domain::models::ModuleCommand;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Single outstanding reconnect timer.
///
/// When the delay elapses it posts [`ModuleCommand::Reconnect`] to the
/// module, so the attempt itself runs on the dispatch loop.
pub struct ReconnectScheduler {
    commands: mpsc::UnboundedSender<ModuleCommand>,
    pending: Option<JoinHandle<()>>,
}

impl ReconnectScheduler {
    pub fn new(commands: mpsc::UnboundedSender<ModuleCommand>) -> Self {
        Self {
            commands,
            pending: None,
        }
    }

    /// Arm the timer, replacing any one already armed
    pub fn arm(&mut self, delay: Duration) {
        self.cancel();
        debug!("Reconnect armed in {:?}", delay);

        let commands = self.commands.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("Reconnect timer fired");
            let _ = commands.send(ModuleCommand::Reconnect);
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            if !task.is_finished() {
                debug!("Pending reconnect cancelled");
            }
            task.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Forget a timer that already fired
    pub(crate) fn mark_fired(&mut self) {
        self.pending = None;
    }
}

impl Drop for ReconnectScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
