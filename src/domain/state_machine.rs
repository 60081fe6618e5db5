//! Timer event handling
//!
//! Maps each hardware state change onto the host's timing session:
//! inspection countdown, running stopwatch, recorded result and the
//! matching display cues.

use crate::domain::context::TimerContext;
use crate::domain::display::DisplayColor;
use crate::domain::models::{
    ElapsedTimePair, HardwareEvent, InspectionPenalty, ModuleEvent, SessionPhase,
};
use tracing::{debug, trace, warn};

/// Inspection longer than this earns +2
pub const INSPECTION_PLUS_TWO_MS: u64 = 15_000;
/// Inspection longer than this is a DNF
pub const INSPECTION_DNF_MS: u64 = 17_000;

/// What the caller still has to do after an event was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Module disabled, nothing touched
    Ignored,
    Handled,
    /// The device dropped; a reconnect should be scheduled
    ReconnectRequested,
}

/// Penalty for an inspection of `elapsed_ms`. Both thresholds are strict.
pub fn inspection_penalty(elapsed_ms: u64, use_inspection: bool) -> InspectionPenalty {
    if !use_inspection {
        InspectionPenalty::None
    } else if elapsed_ms > INSPECTION_DNF_MS {
        InspectionPenalty::Dnf
    } else if elapsed_ms > INSPECTION_PLUS_TWO_MS {
        InspectionPenalty::PlusTwo
    } else {
        InspectionPenalty::None
    }
}

pub fn handle(ctx: &mut TimerContext, event: HardwareEvent) -> EventOutcome {
    if !ctx.enabled {
        trace!("Module disabled, dropping {:?}", event);
        return EventOutcome::Ignored;
    }
    debug!(
        "Timer event received: {:?} (phase {:?})",
        event,
        ctx.session.phase()
    );

    match event {
        HardwareEvent::HandsOn => ctx.display.set_color(DisplayColor::ReadyArmed),
        HardwareEvent::HandsOff => ctx.display.force_redraw(false, true),
        HardwareEvent::GetSet => ctx.display.set_color(DisplayColor::Go),
        HardwareEvent::Idle => on_idle(ctx),
        HardwareEvent::Running => on_running(ctx),
        HardwareEvent::Stopped {
            recorded_duration_ms,
        } => on_stopped(ctx, recorded_duration_ms),
        HardwareEvent::Disconnect => {
            ctx.session.set_hard_time_ms(None);
            ctx.session.set_phase(SessionPhase::Idle);
            ctx.display.refresh_utility();
            ctx.display.force_redraw(false, true);
            return EventOutcome::ReconnectRequested;
        }
    }

    EventOutcome::Handled
}

fn on_idle(ctx: &mut TimerContext) {
    if ctx.session.is_active() {
        // reset button cancels a held result or a running inspection
        ctx.session.set_hard_time_ms(Some(0));
        ctx.session.set_phase(SessionPhase::Idle);
        ctx.display.reset_timer_display();
        ctx.display.force_redraw(false, true);
    } else if ctx.session.phase() == SessionPhase::Idle && ctx.use_inspection() {
        let now = ctx.now_ms();
        ctx.session.set_phase(SessionPhase::InspectionRunning);
        ctx.session.set_start_time_ms(now);
        ctx.display.force_redraw(false, true);
        debug!("Inspection started at {}ms", now);
    }
    ctx.display.refresh_utility();
}

fn on_running(ctx: &mut TimerContext) {
    let now = ctx.now_ms();
    let penalty = if ctx.session.phase() == SessionPhase::InspectionRunning {
        let inspected = now.saturating_sub(ctx.session.start_time_ms());
        let penalty = inspection_penalty(inspected, ctx.use_inspection());
        debug!("Inspection took {}ms, penalty {:?}", inspected, penalty);
        penalty
    } else {
        InspectionPenalty::None
    };

    ctx.session.set_start_time_ms(now);
    ctx.display.reset_timer_display();
    ctx.session.set_elapsed(ElapsedTimePair::started(penalty));
    ctx.session.set_phase(SessionPhase::StopwatchRunning);
    ctx.display.force_redraw(false, true);
}

fn on_stopped(ctx: &mut TimerContext, recorded_duration_ms: u64) {
    if ctx.session.phase() != SessionPhase::StopwatchRunning {
        warn!(
            "Stop reported while {:?}, recording {}ms anyway",
            ctx.session.phase(),
            recorded_duration_ms
        );
    }

    ctx.session.set_hard_time_ms(Some(recorded_duration_ms));
    ctx.session.elapsed_mut().duration_ms = Some(recorded_duration_ms);
    ctx.session.set_phase(SessionPhase::Idle);
    ctx.display.refresh_utility();
    ctx.display.force_redraw(false, true);

    let result = ctx.session.elapsed();
    debug!("Solve finished: {:?}", result);
    ctx.publish(ModuleEvent::Time(result));
}
