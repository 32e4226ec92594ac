//! The interaction state machine and its presentation surface.
//!
//! ```text
//! standby ──motion──▶ alerting ──2s──▶ scanning ──2s──▶ generating ──3s──▶ identified
//!    ▲                                                                      │  ▲
//!    │                                                                 chat │  │ stop
//!    └──────────────────────────── reset (from anywhere) ◀──────── chatting ◀─┘
//! ```

pub mod conversation;
pub mod event;
pub mod machine;
pub mod snapshot;
pub mod status;
pub mod timers;

pub use conversation::{Conversation, ConversationEntry, Speaker};
pub use event::{Command, SentryEvent};
pub use machine::{Collaborators, Sentry, SentryHandle, CHALLENGE_PHRASE, VERDICT_PHRASE};
pub use snapshot::{CameraState, CaptureSummary, SentrySnapshot};
pub use status::Status;
pub use timers::{Phase, TimerTable};
