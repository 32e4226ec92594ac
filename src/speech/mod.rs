//! Speech boundary for the VIGIA sentry.
//!
//! Synthesis is fire-and-forget: the state machine never waits for a line to
//! finish. Recognition is single-shot per session: after
//! [`Recognizer::start`] the backend delivers at most one utterance or error,
//! then [`RecognitionEvent::Ended`]. Restarting is the caller's job.

pub mod stdin;
pub mod tone;
pub mod voice;

pub use stdin::StdinRecognizer;
pub use tone::{wav_bytes, AlertTone, Partial, Waveform, SAMPLE_RATE};
pub use voice::{CommandVoice, LogVoice};

use tokio::sync::mpsc::UnboundedSender;

/// Speech synthesis backend.
pub trait Synthesizer: Send + Sync {
    /// Speak a line. Must return immediately.
    fn speak(&self, text: &str, locale: &str);

    /// Play the synthesized alert tone. Must return immediately.
    fn play_tone(&self, tone: &AlertTone);
}

/// Speech recognition backend.
pub trait Recognizer: Send {
    /// Begin one recognition session. Results go to `sink`.
    fn start(&mut self, sink: RecognitionSink) -> Result<(), RecognitionError>;

    /// Abort the current session, if any.
    ///
    /// A session that was still running may report
    /// [`RecognitionError::Aborted`] and then [`RecognitionEvent::Ended`],
    /// tagged with its own session. Callers that have moved on drop them by
    /// tag. Stopping an idle recognizer emits nothing.
    fn stop(&mut self);
}

/// Event emitted by a recognition session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Utterance(String),
    Error(RecognitionError),
    /// The session is over; a new one may be started
    Ended,
}

/// Recognition failures, named after the platform error codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    /// Nothing was heard before the session timed out
    NoSpeech,
    /// The session was stopped
    Aborted,
    /// The capability is gone (input closed, permission revoked)
    Unavailable(String),
    /// Any other backend failure
    Platform(String),
}

impl RecognitionError {
    pub fn code(&self) -> &str {
        match self {
            RecognitionError::NoSpeech => "no-speech",
            RecognitionError::Aborted => "aborted",
            RecognitionError::Unavailable(_) => "service-not-allowed",
            RecognitionError::Platform(code) => code,
        }
    }
}

impl std::fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecognitionError::NoSpeech => write!(f, "No speech detected"),
            RecognitionError::Aborted => write!(f, "Recognition aborted"),
            RecognitionError::Unavailable(e) => write!(f, "Recognition unavailable: {e}"),
            RecognitionError::Platform(e) => write!(f, "Recognition failed: {e}"),
        }
    }
}

impl std::error::Error for RecognitionError {}

/// Where a recognition session delivers its events.
///
/// Every event is tagged with the session it belongs to, so the receiver can
/// drop anything from a session it has already moved past.
#[derive(Debug, Clone)]
pub struct RecognitionSink {
    session: u64,
    tx: UnboundedSender<(u64, RecognitionEvent)>,
}

impl RecognitionSink {
    pub fn new(session: u64, tx: UnboundedSender<(u64, RecognitionEvent)>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Deliver an event. Returns `false` once the receiver is gone.
    pub fn emit(&self, event: RecognitionEvent) -> bool {
        self.tx.send((self.session, event)).is_ok()
    }
}
