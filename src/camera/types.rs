//! Camera boundary types.
//!
//! The detector only ever sees the camera through these contracts: a
//! [`CameraProvider`] that acquires a device, and the [`FrameSource`] it
//! yields while the device is held.

use futures::future::BoxFuture;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Which physical camera to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    /// Front-facing ("selfie") camera, looking at the subject
    User,
    /// Rear-facing camera
    Environment,
}

/// Device-constraint request passed to [`CameraProvider::acquire`].
///
/// The ideal resolution is a hint; the negotiated size is reported back in
/// [`StreamInfo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConstraints {
    pub facing: Facing,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            facing: Facing::User,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// Properties of an acquired stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Human-readable device label
    pub label: String,
    /// Negotiated frame width
    pub width: u32,
    /// Negotiated frame height
    pub height: u32,
}

/// A decoded video frame in RGBA8.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic sequence number assigned by the source
    pub sequence: u64,
    /// Pixel data
    pub image: RgbaImage,
}

impl Frame {
    pub fn new(sequence: u64, image: RgbaImage) -> Self {
        Self { sequence, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Number of pixels in the frame.
    pub fn pixel_count(&self) -> usize {
        (self.image.width() as usize) * (self.image.height() as usize)
    }
}

/// Result of polling a [`FrameSource`] for its next frame.
#[derive(Debug)]
pub enum FramePoll {
    /// A new decoded frame is ready
    Ready(Frame),
    /// No new decoded data yet; try again on the next tick
    Pending,
    /// The stream is gone (device unplugged, source exhausted)
    Ended(String),
}

/// A live stream held by the detector.
pub trait FrameSource: Send {
    /// Negotiated stream properties.
    fn info(&self) -> &StreamInfo;

    /// Fetch the next decoded frame without blocking.
    fn poll_frame(&mut self) -> FramePoll;

    /// Release the underlying device. Must be idempotent.
    fn close(&mut self);
}

/// Acquires camera devices.
///
/// Acquisition is asynchronous: it may wait for a permission prompt or for a
/// device to warm up. The returned future must not borrow the provider.
pub trait CameraProvider: Send {
    fn acquire(
        &mut self,
        constraints: &CameraConstraints,
    ) -> BoxFuture<'static, Result<Box<dyn FrameSource>, CameraError>>;
}

/// Errors that can occur at the camera boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// Access to the device was refused
    PermissionDenied(String),
    /// No matching device exists
    NotFound(String),
    /// The stream ended while it was held
    StreamEnded(String),
    /// No frame has been decoded yet, so nothing can be captured
    NoFrame,
    /// Detector operation requires a held camera
    NotAcquired,
}

impl std::fmt::Display for CameraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraError::PermissionDenied(e) => write!(f, "Camera permission denied: {e}"),
            CameraError::NotFound(e) => write!(f, "No camera found: {e}"),
            CameraError::StreamEnded(e) => write!(f, "Camera stream ended: {e}"),
            CameraError::NoFrame => write!(f, "No frame available from camera"),
            CameraError::NotAcquired => write!(f, "Camera is not acquired"),
        }
    }
}

impl std::error::Error for CameraError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constraints_request_front_720p() {
        let constraints = CameraConstraints::default();
        assert_eq!(constraints.facing, Facing::User);
        assert_eq!((constraints.ideal_width, constraints.ideal_height), (1280, 720));
    }

    #[test]
    fn test_frame_dimensions() {
        let frame = Frame::new(7, RgbaImage::new(4, 3));
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
        assert_eq!(frame.pixel_count(), 12);
    }
}
