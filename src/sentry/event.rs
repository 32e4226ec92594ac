//! Inputs of the sentry event loop.

use crate::ai::AiError;
use crate::camera::{CameraError, FrameSource};
use crate::core::{CaptureError, CapturedImage};
use crate::sentry::timers::Phase;

/// Operator requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start voice chat (only while identified)
    StartChat,
    /// Stop voice chat and return to identified
    StopChat,
    /// Abandon the cycle and go back to standby
    Reset,
    /// Try to acquire the camera again after a failure
    RetryCamera,
    /// Tear everything down and stop the event loop
    Shutdown,
}

/// Everything the event loop reacts to, apart from frame ticks and
/// recognition results.
pub enum SentryEvent {
    Command(Command),
    TimerFired {
        phase: Phase,
        id: u64,
    },
    CameraAcquired {
        attempt: u64,
        result: Result<Box<dyn FrameSource>, CameraError>,
    },
    /// Image description finished for the given cycle
    AnalysisSettled {
        cycle: u64,
        result: Result<String, AiError>,
    },
    /// Processed variant of the photo finished rendering for the given cycle
    ProcessedRendered {
        cycle: u64,
        result: Result<CapturedImage, CaptureError>,
    },
    /// Chat reply finished for the given chat session
    ChatReply {
        chat: u64,
        result: Result<String, AiError>,
    },
}

impl std::fmt::Debug for SentryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentryEvent::Command(command) => write!(f, "Command({command:?})"),
            SentryEvent::TimerFired { phase, id } => write!(f, "TimerFired({phase:?}, {id})"),
            SentryEvent::CameraAcquired { attempt, result } => {
                write!(f, "CameraAcquired({attempt}, ok={})", result.is_ok())
            }
            SentryEvent::AnalysisSettled { cycle, result } => {
                write!(f, "AnalysisSettled({cycle}, ok={})", result.is_ok())
            }
            SentryEvent::ProcessedRendered { cycle, result } => {
                write!(f, "ProcessedRendered({cycle}, ok={})", result.is_ok())
            }
            SentryEvent::ChatReply { chat, result } => {
                write!(f, "ChatReply({chat}, ok={})", result.is_ok())
            }
        }
    }
}
