//! Read-only projection of the sentry for presentation layers.

use crate::core::{CaptureSession, CapturedImage};
use crate::error::SentryError;
use crate::sentry::conversation::ConversationEntry;
use crate::sentry::status::Status;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Everything a presentation layer needs to render the current state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentrySnapshot {
    pub status: Status,
    pub label: &'static str,
    /// Current motion cycle; bumped on every reset
    pub cycle: u64,
    /// Motion was confirmed in this cycle
    pub motion_detected: bool,
    pub camera: CameraState,
    pub capture: Option<CaptureSummary>,
    pub conversation: Vec<ConversationEntry>,
    pub listening: bool,
    pub awaiting_reply: bool,
    pub ai_available: bool,
    pub voice_chat_available: bool,
    pub last_error: Option<SentryError>,
    pub pending_timers: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CameraState {
    /// A stream is held
    pub held: bool,
    /// Frames are being sampled
    pub sampling: bool,
    /// An acquisition is in flight
    pub acquiring: bool,
}

/// Capture session as seen from outside. Image bytes are shared, not copied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureSummary {
    pub id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub photo_bytes: usize,
    pub photo_mime_type: &'static str,
    pub has_processed: bool,
    pub description: Option<String>,
    #[serde(skip)]
    pub photo: Arc<CapturedImage>,
    #[serde(skip)]
    pub processed: Option<Arc<CapturedImage>>,
}

impl From<&CaptureSession> for CaptureSummary {
    fn from(session: &CaptureSession) -> Self {
        Self {
            id: session.id,
            captured_at: session.captured_at,
            width: session.photo.width,
            height: session.photo.height,
            photo_bytes: session.photo.len(),
            photo_mime_type: session.photo.mime_type(),
            has_processed: session.processed.is_some(),
            description: session.description.clone(),
            photo: session.photo.clone(),
            processed: session.processed.clone(),
        }
    }
}
