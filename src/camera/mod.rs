//! Camera module for the VIGIA sentry.
//!
//! Providers acquire a device and hand back a live [`FrameSource`]. The
//! motion detector is the only owner of an acquired stream.

#[cfg(feature = "camera")]
pub mod device;
pub mod memory;
pub mod sequence;
pub mod types;
pub mod unavailable;

// Re-export commonly used types
#[cfg(feature = "camera")]
pub use device::DeviceCamera;
pub use memory::{solid_frame, MemoryCamera, MemoryFeed};
pub use sequence::SequenceCamera;
pub use types::{
    CameraConstraints, CameraError, CameraProvider, Facing, Frame, FramePoll, FrameSource,
    StreamInfo,
};
pub use unavailable::NoCamera;
