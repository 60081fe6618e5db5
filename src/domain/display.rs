/// Colour cue shown on the host's time display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayColor {
    /// Hands on the pads, not yet armed
    ReadyArmed,
    /// Armed, solve starts when hands lift
    Go,
}

impl DisplayColor {
    /// Tag understood by the host display
    pub fn tag(self) -> &'static str {
        match self {
            Self::ReadyArmed => "r",
            Self::Go => "g",
        }
    }
}

/// Host display hooks. Calls are fire-and-forget.
pub trait DisplayFeedback: Send {
    fn set_color(&mut self, color: DisplayColor);

    /// Zero the shown time
    fn reset_timer_display(&mut self);

    /// Redraw auxiliary widgets (averages, scramble, etc.)
    fn refresh_utility(&mut self);

    fn force_redraw(&mut self, partial: bool, force: bool);
}
