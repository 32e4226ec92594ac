//! VIGIA Sentry - motion-triggered interactive security sentry.
//!
//! The sentry watches a camera for motion. When motion is confirmed it sounds
//! an alarm, challenges the subject by voice, captures a photo, produces a
//! "denied" processed variant (plus an AI description when a collaborator is
//! available), announces a verdict and can then hold a voice conversation in
//! the VIGIA persona.
//!
//! # Privacy
//!
//! - **Local only**: frames are compared in memory and discarded
//! - **One photo per cycle**: captured in `scanning`, dropped on reset
//! - **Nothing persisted**: no image, transcript or statistic is written to disk
//! - **Opt-in AI**: images and utterances leave the machine only when an AI
//!   collaborator is configured
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         VIGIA Sentry                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌──────────────┐   ┌───────────────────┐     │
//! │  │  Camera  │──▶│    Motion    │──▶│  Sentry (actor)   │     │
//! │  │ provider │   │   detector   │   │   state machine   │     │
//! │  └──────────┘   └──────────────┘   └───────────────────┘     │
//! │                                       │   │     │    │       │
//! │                      ┌────────────────┘   │     │    └─────┐ │
//! │                      ▼                    ▼     ▼          ▼ │
//! │               ┌────────────┐   ┌────────────┐ ┌────┐ ┌──────┐│
//! │               │ Synthesizer│   │ Recognizer │ │ AI │ │watch ││
//! │               └────────────┘   └────────────┘ └────┘ │snap. ││
//! │                                                      └──────┘│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use vigia_sentry::{
//!     ai::AiCapability,
//!     camera::NoCamera,
//!     config::Config,
//!     sentry::{Collaborators, Sentry},
//!     speech::LogVoice,
//! };
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let config = Config::default();
//! let collaborators = Collaborators {
//!     camera: Box::new(NoCamera::new()),
//!     voice: Arc::new(LogVoice),
//!     recognizer: None,
//!     ai: AiCapability::Absent("disabled".to_string()),
//! };
//! let (sentry, handle) = Sentry::new(collaborators, &config);
//! let task = tokio::spawn(sentry.run());
//!
//! println!("{}", handle.snapshot().label);
//! handle.shutdown();
//! let _stats = task.await;
//! # }
//! ```

pub mod ai;
pub mod camera;
pub mod config;
pub mod core;
pub mod error;
pub mod sentry;
pub mod speech;
pub mod transparency;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use ai::{AiCapability, AiError, Collaborator};
pub use camera::{CameraError, CameraProvider, FrameSource};
pub use config::Config;
pub use error::SentryError;
pub use sentry::{Collaborators, Command, Sentry, SentryHandle, SentrySnapshot, Status};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

#[cfg(feature = "ai")]
pub use ai::GeminiClient;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy notice that can be displayed to users.
pub const PRIVACY_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                 VIGIA SENTRY - PRIVACY NOTICE                    ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This sentry watches a camera and talks to whoever it sees.      ║
║                                                                  ║
║  ✓ WHAT IT KEEPS (in memory, for the current cycle only):        ║
║    • One photo taken after motion is confirmed                   ║
║    • A processed "access denied" copy of that photo              ║
║    • The lines of the current conversation                       ║
║                                                                  ║
║  ✗ WHAT IT NEVER DOES:                                           ║
║    • Record video or store frames used for motion detection      ║
║    • Write photos or transcripts to disk                         ║
║    • Recognize faces or identify anyone                          ║
║                                                                  ║
║  When an AI collaborator is configured, the photo and what you   ║
║  say are sent to it to describe the scene and to answer you.     ║
║  Everything is discarded on reset.                               ║
║                                                                  ║
║  Disable the AI collaborator with:                               ║
║    vigia start --no-ai                                           ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_notice_contents() {
        assert!(PRIVACY_NOTICE.contains("PRIVACY"));
        assert!(PRIVACY_NOTICE.contains("NEVER DOES"));
        assert!(PRIVACY_NOTICE.contains("--no-ai"));
    }
}
