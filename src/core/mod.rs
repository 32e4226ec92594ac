//! Core functionality for the VIGIA sentry.
//!
//! This module contains:
//! - The frame-difference motion heuristic and its debouncer
//! - The motion detector that owns the camera stream
//! - Capture sessions and the processed-image effect chain

pub mod capture;
pub mod detector;
pub mod effects;
pub mod motion;

// Re-export commonly used types
pub use capture::{CaptureError, CaptureSession, CapturedImage, ImageEncoding, PHOTO_JPEG_QUALITY};
pub use detector::{Acquisition, ArmOutcome, DetectorSignal, MotionDetector};
pub use effects::{apply_effects, render_processed, DENIED_LABEL, IDENTIFIED_LABEL};
pub use motion::{motion_score, MotionDebouncer, DEFAULT_REQUIRED_STREAK, DEFAULT_THRESHOLD};
