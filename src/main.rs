use gan_timer_bridge::domain::models::{
    ConnectionStatus, HardwareEvent, MessageSeverity, ModuleCommand, ModuleEvent,
};
use gan_timer_bridge::domain::session::MonotonicClock;
use gan_timer_bridge::domain::settings::{Settings, SettingsService};
use gan_timer_bridge::infrastructure::bluetooth::service::ENABLE_INPUT_MODE;
use gan_timer_bridge::infrastructure::bluetooth::simulated::{SimulatedDriver, SimulatedDriverHandle};
use gan_timer_bridge::infrastructure::logging;
use gan_timer_bridge::presentation::console::{AutoConfirmPrompt, TracingDisplay};
use gan_timer_bridge::{GanTimerModule, TimerContext};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

async fn wait_for<F>(bus: &mut mpsc::UnboundedReceiver<ModuleEvent>, mut done: F) -> anyhow::Result<ModuleEvent>
where
    F: FnMut(&ModuleEvent) -> bool,
{
    while let Some(event) = bus.recv().await {
        if let ModuleEvent::LogMessage(msg) = &event {
            match msg.severity {
                MessageSeverity::Success => info!("{}", msg.message),
                MessageSeverity::Error => warn!("{}", msg.message),
            }
        }
        if done(&event) {
            return Ok(event);
        }
    }
    anyhow::bail!("Module stopped unexpectedly")
}

/// One solve, a power cycle and a disable, as the physical timer would play it
async fn scripted_session(
    commands: mpsc::UnboundedSender<ModuleCommand>,
    mut bus: mpsc::UnboundedReceiver<ModuleEvent>,
    device: SimulatedDriverHandle,
) -> anyhow::Result<()> {
    let connected = |e: &ModuleEvent| *e == ModuleEvent::ConnectionStatus(ConnectionStatus::Connected);

    commands.send(ModuleCommand::SetEnabled(ENABLE_INPUT_MODE.to_string()))?;
    wait_for(&mut bus, connected).await?;

    let pause = Duration::from_millis(400);
    device.emit(HardwareEvent::HandsOn);
    tokio::time::sleep(pause).await;
    device.emit(HardwareEvent::GetSet);
    tokio::time::sleep(pause).await;
    device.emit(HardwareEvent::Running);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    device.emit(HardwareEvent::Stopped {
        recorded_duration_ms: 1523,
    });

    if let ModuleEvent::Time(result) =
        wait_for(&mut bus, |e| matches!(e, ModuleEvent::Time(_))).await?
    {
        info!("Solve recorded: {}", serde_json::to_string(&result)?);
    }

    info!("Switching the timer off");
    device.power_off();
    wait_for(&mut bus, connected).await?;
    info!("Timer reconnected");

    commands.send(ModuleCommand::SetEnabled(String::new()))?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new().unwrap_or_else(|e| {
        eprintln!("Failed to load settings, using defaults: {}", e);
        SettingsService::in_memory(Settings::default())
    });

    let _logging_guard = logging::init_logger(&settings_service.get().log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting GAN timer bridge");

    let settings = Arc::new(Mutex::new(settings_service));
    let (bus_tx, bus_rx) = mpsc::unbounded_channel();
    let ctx = TimerContext::new(
        Box::new(TracingDisplay::default()),
        Arc::new(MonotonicClock::new()),
        settings,
        bus_tx,
    );

    let (driver, device) = SimulatedDriver::new();
    let driver = driver.with_connect_latency(Duration::from_millis(300));
    let (module, inbox) = GanTimerModule::new(driver, ctx, Box::new(AutoConfirmPrompt));
    let commands = module.commands();

    let script = async {
        let outcome = scripted_session(commands.clone(), bus_rx, device).await;
        let _ = commands.send(ModuleCommand::Shutdown);
        outcome
    };

    let ((), outcome) = tokio::join!(module.run(inbox), script);
    outcome
}
