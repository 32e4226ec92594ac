//! Session transparency log.
//!
//! Counts what the sentry did during this run without keeping any of the
//! captured material. Nothing here is written to disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the current session.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Frames scored (or stored as a baseline) by the detector
    frames_sampled: AtomicU64,
    /// Ticks where the camera had no new decoded frame
    frames_pending: AtomicU64,
    /// Confirmed motion events
    motion_events: AtomicU64,
    /// Photos captured
    photos_captured: AtomicU64,
    /// Calls made to the AI collaborator
    ai_requests: AtomicU64,
    /// AI calls that failed
    ai_failures: AtomicU64,
    /// Utterances recognized
    utterances: AtomicU64,
    /// Resets back to standby
    resets: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
}

impl TransparencyLog {
    /// Create a new transparency log.
    pub fn new() -> Self {
        Self {
            frames_sampled: AtomicU64::new(0),
            frames_pending: AtomicU64::new(0),
            motion_events: AtomicU64::new(0),
            photos_captured: AtomicU64::new(0),
            ai_requests: AtomicU64::new(0),
            ai_failures: AtomicU64::new(0),
            utterances: AtomicU64::new(0),
            resets: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    pub fn record_frame_sampled(&self) {
        self.frames_sampled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_pending(&self) {
        self.frames_pending.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_motion(&self) {
        self.motion_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_photo(&self) {
        self.photos_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ai_request(&self) {
        self.ai_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ai_failure(&self) {
        self.ai_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_utterance(&self) {
        self.utterances.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            frames_sampled: self.frames_sampled.load(Ordering::Relaxed),
            frames_pending: self.frames_pending.load(Ordering::Relaxed),
            motion_events: self.motion_events.load(Ordering::Relaxed),
            photos_captured: self.photos_captured.load(Ordering::Relaxed),
            ai_requests: self.ai_requests.load(Ordering::Relaxed),
            ai_failures: self.ai_failures.load(Ordering::Relaxed),
            utterances: self.utterances.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Frames sampled: {}\n\
             - Frames pending: {}\n\
             - Motion events: {}\n\
             - Photos captured: {}\n\
             - AI requests: {} ({} failed)\n\
             - Utterances recognized: {}\n\
             - Resets: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - Photos live in memory only and are discarded on reset\n\
             - Nothing captured is written to disk\n\
             - Only these counters are kept for the session",
            stats.frames_sampled,
            stats.frames_pending,
            stats.motion_events,
            stats.photos_captured,
            stats.ai_requests,
            stats.ai_failures,
            stats.utterances,
            stats.resets,
            stats.session_duration_secs
        )
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.frames_sampled,
            &self.frames_pending,
            &self.motion_events,
            &self.photos_captured,
            &self.ai_requests,
            &self.ai_failures,
            &self.utterances,
            &self.resets,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub frames_sampled: u64,
    pub frames_pending: u64,
    pub motion_events: u64,
    pub photos_captured: u64,
    pub ai_requests: u64,
    pub ai_failures: u64,
    pub utterances: u64,
    pub resets: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}
