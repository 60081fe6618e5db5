//! GAN Timer Service
//!
//! Owns the driver and the timer context, runs the dispatch loop and
//! applies the connection policy: prompt before connecting, surface failed
//! manual connects, retry silently after the timer drops.

use crate::domain::context::TimerContext;
use crate::domain::models::{
    ConnectionStatus, HardwareEvent, MessageSeverity, ModuleCommand, ModuleEvent, StatusMessage,
};
use crate::domain::settings::RECONNECT_DELAY_MS;
use crate::domain::state_machine::{self, EventOutcome};
use crate::infrastructure::bluetooth::driver::TimerDriver;
use crate::infrastructure::bluetooth::reconnect::ReconnectScheduler;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Value of the host's input-mode toggle that selects the smart timer
pub const ENABLE_INPUT_MODE: &str = "b";

/// Key code that opens the connection prompt while disconnected
pub const SPACE_KEY_CODE: u32 = 32;

/// Host-side confirmation shown before connecting
pub trait ConnectPrompt: Send {
    /// Present the prompt; call [`PromptReply::confirm`] once the user accepts.
    /// Dropping the reply without confirming cancels.
    fn show(&mut self, reply: PromptReply);
}

/// Answer channel for a [`ConnectPrompt`]
#[derive(Debug)]
pub struct PromptReply {
    commands: mpsc::UnboundedSender<ModuleCommand>,
}

impl PromptReply {
    pub fn confirm(self) {
        let _ = self.commands.send(ModuleCommand::ConfirmConnect);
    }
}

/// Receiving ends of the module's channels, consumed by [`GanTimerModule::run`]
pub struct ModuleInbox {
    pub events: mpsc::UnboundedReceiver<HardwareEvent>,
    pub commands: mpsc::UnboundedReceiver<ModuleCommand>,
}

pub struct GanTimerModule<D: TimerDriver> {
    driver: D,
    ctx: TimerContext,
    prompt: Box<dyn ConnectPrompt>,
    reconnect: ReconnectScheduler,
    status: ConnectionStatus,
    event_tx: mpsc::UnboundedSender<HardwareEvent>,
    command_tx: mpsc::UnboundedSender<ModuleCommand>,
}

impl<D: TimerDriver> GanTimerModule<D> {
    pub fn new(driver: D, ctx: TimerContext, prompt: Box<dyn ConnectPrompt>) -> (Self, ModuleInbox) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let module = Self {
            driver,
            ctx,
            prompt,
            reconnect: ReconnectScheduler::new(command_tx.clone()),
            status: ConnectionStatus::Disconnected,
            event_tx,
            command_tx,
        };
        let inbox = ModuleInbox {
            events: event_rx,
            commands: command_rx,
        };
        (module, inbox)
    }

    /// Sender for UI commands
    pub fn commands(&self) -> mpsc::UnboundedSender<ModuleCommand> {
        self.command_tx.clone()
    }

    pub fn context(&self) -> &TimerContext {
        &self.ctx
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_reconnect_pending(&self) -> bool {
        self.reconnect.is_armed()
    }

    /// Process events and commands one at a time until shutdown
    pub async fn run(mut self, mut inbox: ModuleInbox) {
        info!("GAN timer module running");
        loop {
            tokio::select! {
                Some(event) = inbox.events.recv() => self.on_hardware_event(event),
                command = inbox.commands.recv() => match command {
                    Some(ModuleCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
            }
        }
        self.teardown().await;
        info!("GAN timer module stopped");
    }

    pub async fn handle_command(&mut self, command: ModuleCommand) {
        debug!("Command: {:?}", command);
        match command {
            ModuleCommand::SetEnabled(raw) => self.toggle_enabled(&raw).await,
            ModuleCommand::KeyUp(key_code) => self.on_key_up(key_code).await,
            ModuleCommand::ConfirmConnect => {
                self.connect(false).await;
            }
            ModuleCommand::Reconnect => {
                self.reconnect.mark_fired();
                if !self.ctx.enabled {
                    debug!("Module disabled, skipping reconnect");
                    return;
                }
                // a fresh connect may have landed after the timer fired
                if self.status != ConnectionStatus::Disconnected || self.driver.is_connected() {
                    debug!("Link already {:?}, dropping stale reconnect", self.status);
                    return;
                }
                info!("Attempting to reconnect timer device");
                self.connect(true).await;
            }
            ModuleCommand::Shutdown => self.teardown().await,
        }
    }

    pub fn on_hardware_event(&mut self, event: HardwareEvent) {
        let outcome = state_machine::handle(&mut self.ctx, event);
        if event == HardwareEvent::Disconnect {
            warn!("Timer device disconnected");
            self.set_status(ConnectionStatus::Disconnected);
        }
        if outcome == EventOutcome::ReconnectRequested {
            self.schedule_reconnect();
        }
    }

    /// Open the link. A failed manual attempt is reported to the user, a
    /// failed automatic one only logged.
    pub async fn connect(&mut self, reconnect: bool) -> ConnectionStatus {
        if !reconnect {
            self.reconnect.cancel();
        }
        self.set_status(ConnectionStatus::Connecting);

        match self.driver.connect(reconnect).await {
            Ok(()) => {
                info!("Timer device successfully connected");
                self.driver.set_event_sink(self.event_tx.clone());
                self.ctx.session.reset_idle();
                self.ctx.display.reset_timer_display();
                self.ctx.display.refresh_utility();
                self.ctx.display.force_redraw(false, true);
                self.set_status(ConnectionStatus::Connected);
                self.ctx.publish(ModuleEvent::LogMessage(StatusMessage {
                    message: "Connected to GAN Smart Timer".to_string(),
                    severity: MessageSeverity::Success,
                }));
            }
            Err(e) => {
                warn!("Failed to connect to timer: {}", e);
                self.set_status(ConnectionStatus::Disconnected);
                if !reconnect {
                    self.ctx.publish(ModuleEvent::LogMessage(StatusMessage {
                        message: e.to_string(),
                        severity: MessageSeverity::Error,
                    }));
                }
            }
        }
        self.status
    }

    /// Close the link. Safe to call when already disconnected.
    pub async fn disconnect(&mut self) {
        if let Err(e) = self.driver.disconnect().await {
            warn!("Failed to disconnect timer: {}", e);
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    pub fn schedule_reconnect(&mut self) {
        let delay = Duration::from_millis(RECONNECT_DELAY_MS);
        self.reconnect.arm(delay);
    }

    pub async fn toggle_enabled(&mut self, raw: &str) {
        let enable = raw == ENABLE_INPUT_MODE;
        info!("GAN timer {}", if enable { "enabled" } else { "disabled" });
        self.ctx.enabled = enable;

        if enable {
            self.ctx.session.set_hard_time_ms(None);
            self.show_connection_prompt().await;
        } else {
            self.reconnect.cancel();
            self.disconnect().await;
        }
    }

    pub async fn on_key_up(&mut self, key_code: u32) {
        if key_code == SPACE_KEY_CODE && !self.driver.is_connected() {
            self.show_connection_prompt().await;
        }
    }

    /// Drop any current link, then ask the user before connecting again
    pub async fn show_connection_prompt(&mut self) {
        self.disconnect().await;
        self.prompt.show(PromptReply {
            commands: self.command_tx.clone(),
        });
    }

    /// Disable and disconnect, leaving nothing scheduled
    pub async fn teardown(&mut self) {
        self.ctx.enabled = false;
        self.reconnect.cancel();
        self.disconnect().await;
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status == status {
            return;
        }
        debug!("Connection status {:?} -> {:?}", self.status, status);
        self.status = status;
        self.ctx.publish(ModuleEvent::ConnectionStatus(status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::display::testing::RecordingDisplay;
    use crate::domain::models::{ElapsedTimePair, SessionPhase};
    use crate::domain::session::ManualClock;
    use crate::domain::settings::{Settings, SettingsService};
    use crate::infrastructure::bluetooth::driver::DriverError;
    use crate::infrastructure::bluetooth::simulated::{SimulatedDriver, SimulatedDriverHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    /// Confirms every prompt straight away and counts them
    #[derive(Clone, Default)]
    struct CountingPrompt {
        shown: Arc<AtomicUsize>,
        confirm: bool,
    }

    impl ConnectPrompt for CountingPrompt {
        fn show(&mut self, reply: PromptReply) {
            self.shown.fetch_add(1, Ordering::SeqCst);
            if self.confirm {
                reply.confirm();
            }
        }
    }

    struct Harness {
        module: GanTimerModule<SimulatedDriver>,
        inbox: ModuleInbox,
        device: SimulatedDriverHandle,
        prompt: CountingPrompt,
        clock: ManualClock,
        bus: mpsc::UnboundedReceiver<ModuleEvent>,
    }

    fn harness(use_inspection: bool) -> Harness {
        harness_with(use_inspection, true)
    }

    fn harness_with(use_inspection: bool, confirm: bool) -> Harness {
        let (driver, device) = SimulatedDriver::new();
        let clock = ManualClock::new(0);
        let settings = SettingsService::in_memory(Settings {
            use_inspection,
            ..Settings::default()
        });
        let (bus_tx, bus) = mpsc::unbounded_channel();
        let ctx = TimerContext::new(
            Box::new(RecordingDisplay::default()),
            Arc::new(clock.clone()),
            Arc::new(Mutex::new(settings)),
            bus_tx,
        );
        let prompt = CountingPrompt {
            confirm,
            ..CountingPrompt::default()
        };
        let (module, inbox) = GanTimerModule::new(driver, ctx, Box::new(prompt.clone()));
        Harness {
            module,
            inbox,
            device,
            prompt,
            clock,
            bus,
        }
    }

    impl Harness {
        /// Enable and accept the prompt
        async fn enable(&mut self) {
            self.module.toggle_enabled(ENABLE_INPUT_MODE).await;
            let confirm = self.inbox.commands.recv().await.unwrap();
            assert_eq!(confirm, ModuleCommand::ConfirmConnect);
            self.module.handle_command(confirm).await;
        }

        /// Forward everything the device emitted
        fn pump_events(&mut self) {
            while let Ok(event) = self.inbox.events.try_recv() {
                self.module.on_hardware_event(event);
            }
        }

        fn drain_bus(&mut self) -> Vec<ModuleEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.bus.try_recv() {
                events.push(event);
            }
            events
        }
    }

    #[tokio::test]
    async fn test_enable_prompts_and_connects() {
        let mut h = harness(false);
        h.enable().await;

        assert_eq!(h.prompt.shown.load(Ordering::SeqCst), 1);
        assert_eq!(h.device.connect_attempts(), vec![false]);
        assert_eq!(h.module.status(), ConnectionStatus::Connected);
        assert!(h.module.context().is_enabled());

        let session = h.module.context().session();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.hard_time_ms(), Some(0));

        assert_eq!(
            h.drain_bus(),
            vec![
                ModuleEvent::ConnectionStatus(ConnectionStatus::Connecting),
                ModuleEvent::ConnectionStatus(ConnectionStatus::Connected),
                ModuleEvent::LogMessage(StatusMessage {
                    message: "Connected to GAN Smart Timer".to_string(),
                    severity: MessageSeverity::Success,
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_prompt_declined_leaves_disconnected() {
        let mut h = harness_with(false, false);

        h.module.toggle_enabled(ENABLE_INPUT_MODE).await;

        assert_eq!(h.prompt.shown.load(Ordering::SeqCst), 1);
        assert!(h.inbox.commands.try_recv().is_err());
        assert!(h.device.connect_attempts().is_empty());
        assert_eq!(h.module.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_enable_clears_hard_time() {
        let mut h = harness_with(false, false);
        h.module.ctx.session.set_hard_time_ms(Some(5_000));

        h.module.toggle_enabled(ENABLE_INPUT_MODE).await;
        assert_eq!(h.module.context().session().hard_time_ms(), None);
    }

    #[tokio::test]
    async fn test_other_input_mode_disables() {
        let mut h = harness(false);
        h.enable().await;
        h.drain_bus();

        h.module.toggle_enabled("t").await;

        assert!(!h.module.context().is_enabled());
        assert!(!h.device.is_connected());
        assert_eq!(
            h.drain_bus(),
            vec![ModuleEvent::ConnectionStatus(ConnectionStatus::Disconnected)]
        );
    }

    #[tokio::test]
    async fn test_failed_manual_connect_is_reported() {
        let mut h = harness(false);
        h.device
            .fail_next_connect(DriverError::Connection("pairing rejected".to_string()));

        h.enable().await;

        assert_eq!(h.module.status(), ConnectionStatus::Disconnected);
        let alerts: Vec<_> = h
            .drain_bus()
            .into_iter()
            .filter_map(|e| match e {
                ModuleEvent::LogMessage(msg) => Some(msg),
                _ => None,
            })
            .collect();
        assert_eq!(
            alerts,
            vec![StatusMessage {
                message: "Connection failed: pairing rejected".to_string(),
                severity: MessageSeverity::Error,
            }]
        );
    }

    #[tokio::test]
    async fn test_failed_reconnect_is_silent() {
        let mut h = harness(false);
        h.enable().await;
        h.drain_bus();
        h.device.fail_next_connect(DriverError::DeviceNotFound);

        let status = h.module.connect(true).await;

        assert_eq!(status, ConnectionStatus::Disconnected);
        assert!(h
            .drain_bus()
            .iter()
            .all(|e| !matches!(e, ModuleEvent::LogMessage(_))));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let mut h = harness(false);

        h.module.disconnect().await;
        h.module.disconnect().await;

        assert_eq!(h.module.status(), ConnectionStatus::Disconnected);
        assert_eq!(h.device.disconnect_calls(), 2);
        assert!(h.drain_bus().is_empty());
    }

    #[tokio::test]
    async fn test_space_prompts_only_while_disconnected() {
        let mut h = harness_with(false, false);

        h.module.on_key_up(SPACE_KEY_CODE).await;
        assert_eq!(h.prompt.shown.load(Ordering::SeqCst), 1);

        h.module.on_key_up(13).await;
        assert_eq!(h.prompt.shown.load(Ordering::SeqCst), 1);

        h.module.connect(false).await;
        h.module.on_key_up(SPACE_KEY_CODE).await;
        assert_eq!(h.prompt.shown.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_full_solve_through_driver() {
        let mut h = harness(true);
        h.enable().await;
        h.drain_bus();

        h.device.emit(HardwareEvent::Idle);
        h.pump_events();
        h.clock.advance(16_000);
        h.device.emit(HardwareEvent::HandsOn);
        h.device.emit(HardwareEvent::GetSet);
        h.device.emit(HardwareEvent::Running);
        h.pump_events();
        assert_eq!(
            h.module.context().session().phase(),
            SessionPhase::StopwatchRunning
        );

        h.device.emit(HardwareEvent::Stopped {
            recorded_duration_ms: 12_345,
        });
        h.pump_events();

        assert_eq!(
            h.drain_bus(),
            vec![ModuleEvent::Time(ElapsedTimePair {
                penalty_ms: 2_000,
                duration_ms: Some(12_345),
            })]
        );
        assert_eq!(h.module.context().session().phase(), SessionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_reconnects_after_delay() {
        let mut h = harness(false);
        h.enable().await;
        h.drain_bus();

        h.device.power_off();
        h.pump_events();

        assert!(h.module.is_reconnect_pending());
        assert_eq!(h.module.context().session().hard_time_ms(), None);
        assert_eq!(
            h.drain_bus(),
            vec![ModuleEvent::ConnectionStatus(ConnectionStatus::Disconnected)]
        );

        let start = Instant::now();
        let fired = h.inbox.commands.recv().await.unwrap();
        assert_eq!(fired, ModuleCommand::Reconnect);
        assert_eq!(start.elapsed(), Duration::from_millis(2500));

        h.module.handle_command(fired).await;
        assert_eq!(h.device.connect_attempts(), vec![false, true]);
        assert_eq!(h.module.status(), ConnectionStatus::Connected);
        assert!(!h.module.is_reconnect_pending());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(h.inbox.commands.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_reconnect_superseded_by_fresh_connect() {
        let mut h = harness(false);
        h.enable().await;
        h.device.power_off();
        h.pump_events();

        // timer fires, its command waits behind the user's confirmation
        tokio::time::sleep(Duration::from_millis(2600)).await;
        h.module.handle_command(ModuleCommand::ConfirmConnect).await;
        assert_eq!(h.module.status(), ConnectionStatus::Connected);

        h.device.emit(HardwareEvent::Running);
        h.pump_events();
        assert_eq!(
            h.module.context().session().phase(),
            SessionPhase::StopwatchRunning
        );

        let queued = h.inbox.commands.try_recv().unwrap();
        assert_eq!(queued, ModuleCommand::Reconnect);
        h.module.handle_command(queued).await;

        assert_eq!(h.device.connect_attempts(), vec![false, false]);
        assert_eq!(
            h.module.context().session().phase(),
            SessionPhase::StopwatchRunning
        );
        assert_eq!(h.module.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_drop_while_disabled_updates_status() {
        let mut h = harness(false);
        h.module.on_key_up(SPACE_KEY_CODE).await;
        let confirm = h.inbox.commands.recv().await.unwrap();
        h.module.handle_command(confirm).await;
        assert_eq!(h.module.status(), ConnectionStatus::Connected);
        assert!(!h.module.context().is_enabled());
        h.drain_bus();

        h.device.power_off();
        h.pump_events();

        assert_eq!(h.module.status(), ConnectionStatus::Disconnected);
        assert!(!h.module.is_reconnect_pending());
        assert_eq!(
            h.drain_bus(),
            vec![ModuleEvent::ConnectionStatus(ConnectionStatus::Disconnected)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_cancels_pending_reconnect() {
        let mut h = harness(false);
        h.enable().await;
        h.device.power_off();
        h.pump_events();
        assert!(h.module.is_reconnect_pending());

        h.module.toggle_enabled("").await;
        assert!(!h.module.is_reconnect_pending());

        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert!(h.inbox.commands.try_recv().is_err());
        assert_eq!(h.device.connect_attempts(), vec![false]);
    }

    #[tokio::test]
    async fn test_reconnect_while_disabled_is_ignored() {
        let mut h = harness(false);

        h.module.handle_command(ModuleCommand::Reconnect).await;
        assert!(h.device.connect_attempts().is_empty());
    }

    #[tokio::test]
    async fn test_events_dropped_after_disable() {
        let mut h = harness(false);
        h.enable().await;
        h.module.ctx.enabled = false;
        h.drain_bus();

        h.device.emit(HardwareEvent::Running);
        h.device.emit(HardwareEvent::Stopped {
            recorded_duration_ms: 1_000,
        });
        h.pump_events();

        assert_eq!(h.module.context().session().phase(), SessionPhase::Idle);
        assert!(h.drain_bus().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_until_shutdown() {
        let h = harness(false);
        let device = h.device.clone();
        let commands = h.module.commands();
        let mut bus = h.bus;

        let script = async {
            commands
                .send(ModuleCommand::SetEnabled(ENABLE_INPUT_MODE.to_string()))
                .unwrap();
            loop {
                match bus.recv().await {
                    Some(ModuleEvent::ConnectionStatus(ConnectionStatus::Connected)) => break,
                    Some(_) => continue,
                    None => panic!("bus closed before connecting"),
                }
            }

            device.emit(HardwareEvent::Running);
            device.emit(HardwareEvent::Stopped {
                recorded_duration_ms: 9_000,
            });
            let finished = loop {
                match bus.recv().await {
                    Some(ModuleEvent::Time(pair)) => break pair,
                    Some(_) => continue,
                    None => panic!("bus closed before the solve finished"),
                }
            };

            commands.send(ModuleCommand::Shutdown).unwrap();
            finished
        };

        let ((), finished) = tokio::join!(h.module.run(h.inbox), script);

        assert_eq!(finished.duration_ms, Some(9_000));
        assert!(!device.is_connected());
    }
}
