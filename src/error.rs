//! Error taxonomy surfaced by the sentry.
//!
//! Every failure the core can observe degrades a feature; none of them stops
//! the state machine. The variants here are what ends up in the "last error"
//! slot of a [`SentrySnapshot`](crate::sentry::SentrySnapshot).

use serde::{Serialize, Serializer};

/// A failure recorded by the interaction state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentryError {
    /// The camera could not be acquired, or was lost. Blocks motion detection
    /// until the detector is re-armed.
    CameraUnavailable(String),
    /// The AI collaborator could not be initialized.
    AiCapabilityAbsent(String),
    /// A call to the AI collaborator failed; a fallback was used instead.
    AiCallFailed(String),
    /// Speech recognition reported an error; listening restarts after a backoff.
    SpeechRecognition(String),
}

impl SentryError {
    /// Whether the presentation layer should treat this as a blocking error.
    ///
    /// Only camera failures are blocking: everything else has a fallback.
    pub fn is_blocking(&self) -> bool {
        matches!(self, SentryError::CameraUnavailable(_))
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            SentryError::CameraUnavailable(_) => "CAMERA_UNAVAILABLE",
            SentryError::AiCapabilityAbsent(_) => "AI_CAPABILITY_ABSENT",
            SentryError::AiCallFailed(_) => "AI_CALL_FAILED",
            SentryError::SpeechRecognition(_) => "SPEECH_RECOGNITION_ERROR",
        }
    }
}

impl std::fmt::Display for SentryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentryError::CameraUnavailable(e) => write!(f, "Camera unavailable: {e}"),
            SentryError::AiCapabilityAbsent(e) => write!(f, "AI capability absent: {e}"),
            SentryError::AiCallFailed(e) => write!(f, "AI call failed: {e}"),
            SentryError::SpeechRecognition(e) => write!(f, "Speech recognition error: {e}"),
        }
    }
}

impl std::error::Error for SentryError {}

impl Serialize for SentryError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("SentryError", 3)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("blocking", &self.is_blocking())?;
        state.end()
    }
}
