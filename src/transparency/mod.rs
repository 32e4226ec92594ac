//! Transparency module for the VIGIA sentry.
//!
//! This module tracks what the sentry did during a session, so an operator
//! can see how much was captured and confirm none of it was kept.

pub mod log;

// Re-export commonly used types
pub use log::{create_shared_log, SharedTransparencyLog, TransparencyLog, TransparencyStats};
