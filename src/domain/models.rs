use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};

/// Discrete state change reported by the smart timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareEvent {
    /// Both hands placed on the pads
    HandsOn,
    /// Hands lifted before the grace period expired
    HandsOff,
    /// Grace period expired, timer armed
    GetSet,
    /// Reset button pressed
    Idle,
    /// Hands lifted, solve started
    Running,
    /// Hands back on the pads, solve finished
    Stopped { recorded_duration_ms: u64 },
    /// Timer switched off or link lost
    Disconnect,
}

/// Host timing phase, with the integer codes the host understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    InspectionRunning,
    StopwatchRunning,
}

impl SessionPhase {
    pub fn code(self) -> i32 {
        match self {
            Self::Idle => -1,
            Self::InspectionRunning => -3,
            Self::StopwatchRunning => 1,
        }
    }
}

impl TryFrom<i32> for SessionPhase {
    type Error = i32;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            -1 => Ok(Self::Idle),
            -3 => Ok(Self::InspectionRunning),
            1 => Ok(Self::StopwatchRunning),
            other => Err(other),
        }
    }
}

/// Inspection overrun penalty, folded into the first slot of [`ElapsedTimePair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InspectionPenalty {
    #[default]
    None,
    PlusTwo,
    Dnf,
}

impl InspectionPenalty {
    /// Host encoding: 0 = clean, 2000 = +2, -1 = DNF
    pub fn offset_ms(self) -> i64 {
        match self {
            Self::None => 0,
            Self::PlusTwo => 2000,
            Self::Dnf => -1,
        }
    }
}

/// `[penalty, duration]` pair handed to the host when a solve completes.
///
/// Serializes as a one or two element array, matching what the host's
/// `time` signal carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElapsedTimePair {
    pub penalty_ms: i64,
    pub duration_ms: Option<u64>,
}

impl ElapsedTimePair {
    pub fn started(penalty: InspectionPenalty) -> Self {
        Self {
            penalty_ms: penalty.offset_ms(),
            duration_ms: None,
        }
    }

    pub fn is_dnf(&self) -> bool {
        self.penalty_ms == InspectionPenalty::Dnf.offset_ms()
    }
}

impl Serialize for ElapsedTimePair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.duration_ms {
            Some(duration) => {
                let mut tuple = serializer.serialize_tuple(2)?;
                tuple.serialize_element(&self.penalty_ms)?;
                tuple.serialize_element(&duration)?;
                tuple.end()
            }
            None => {
                let mut tuple = serializer.serialize_tuple(1)?;
                tuple.serialize_element(&self.penalty_ms)?;
                tuple.end()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Success,
    Error,
}

/// Notifications published to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleEvent {
    /// A solve finished; published exactly once per run
    Time(ElapsedTimePair),
    ConnectionStatus(ConnectionStatus),
    LogMessage(StatusMessage),
}

/// Requests from the host UI (and the reconnect timer) to the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleCommand {
    /// Raw value of the host's input-mode toggle
    SetEnabled(String),
    /// Key released, by key code
    KeyUp(u32),
    /// User accepted the connection prompt
    ConfirmConnect,
    Reconnect,
    Shutdown,
}
