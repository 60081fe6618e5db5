//! Console stand-ins for the host's display and dialog.

use crate::domain::display::{DisplayColor, DisplayFeedback};
use crate::infrastructure::bluetooth::{ConnectPrompt, PromptReply};
use tracing::info;

/// Logs every display cue instead of drawing it
#[derive(Debug, Default)]
pub struct TracingDisplay {
    redraws: u64,
}

impl DisplayFeedback for TracingDisplay {
    fn set_color(&mut self, color: DisplayColor) {
        info!("[display] colour {}", color.tag());
    }

    fn reset_timer_display(&mut self) {
        info!("[display] 0.00");
    }

    fn refresh_utility(&mut self) {
        info!("[display] utility refreshed");
    }

    fn force_redraw(&mut self, partial: bool, force: bool) {
        self.redraws += 1;
        tracing::debug!(
            "[display] redraw #{} (partial: {}, force: {})",
            self.redraws,
            partial,
            force
        );
    }
}

/// Accepts the connection prompt without asking
#[derive(Debug, Default)]
pub struct AutoConfirmPrompt;

impl ConnectPrompt for AutoConfirmPrompt {
    fn show(&mut self, reply: PromptReply) {
        info!("Press OK to connect to GAN Smart Timer: OK");
        reply.confirm();
    }
}
