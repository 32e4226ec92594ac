//! Camera provider for hosts without a capture device.
//!
//! This exists so the sentry can start (and report a blocking camera error)
//! when no frame source was configured.

use crate::camera::types::{CameraConstraints, CameraError, CameraProvider, FrameSource};
use futures::future::BoxFuture;

/// A provider that never yields a stream.
#[derive(Debug, Clone, Default)]
pub struct NoCamera {
    reason: Option<String>,
}

impl NoCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a specific cause instead of the generic one.
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }
}

impl CameraProvider for NoCamera {
    fn acquire(
        &mut self,
        _constraints: &CameraConstraints,
    ) -> BoxFuture<'static, Result<Box<dyn FrameSource>, CameraError>> {
        let reason = self
            .reason
            .clone()
            .unwrap_or_else(|| "no camera device configured".to_string());
        Box::pin(async move { Err(CameraError::NotFound(reason)) })
    }
}
