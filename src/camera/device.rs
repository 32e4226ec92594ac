//! Live capture device through OpenCV's `videoio` backend.
//!
//! The device is opened and read on a dedicated capture thread, which owns
//! the `VideoCapture` for its whole life. Decoded frames are converted to
//! RGBA and handed over through a one-slot channel where the newest frame
//! replaces an unread one, so polling never blocks and never lags behind.

use crate::camera::types::{
    CameraConstraints, CameraError, CameraProvider, Facing, Frame, FramePoll, FrameSource,
    StreamInfo,
};
use crossbeam_channel::{bounded, Receiver, TryRecvError, TrySendError};
use futures::future::BoxFuture;
use image::RgbaImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Consecutive empty reads before the stream counts as gone.
const MAX_EMPTY_READS: u32 = 30;

/// Camera backed by a local video device.
#[derive(Debug, Clone, Default)]
pub struct DeviceCamera {
    index: Option<i32>,
}

impl DeviceCamera {
    /// Pick the device from the requested facing: index 0 for the front
    /// camera, index 1 for the rear one.
    pub fn new() -> Self {
        Self::default()
    }

    /// Always open this device index, whatever the facing.
    pub fn with_index(index: i32) -> Self {
        Self { index: Some(index) }
    }

    fn device_index(&self, facing: Facing) -> i32 {
        self.index.unwrap_or(match facing {
            Facing::User => 0,
            Facing::Environment => 1,
        })
    }
}

impl CameraProvider for DeviceCamera {
    fn acquire(
        &mut self,
        constraints: &CameraConstraints,
    ) -> BoxFuture<'static, Result<Box<dyn FrameSource>, CameraError>> {
        let index = self.device_index(constraints.facing);
        let constraints = constraints.clone();

        Box::pin(async move {
            let stream = tokio::task::spawn_blocking(move || DeviceStream::open(index, &constraints))
                .await
                .map_err(|e| CameraError::NotFound(format!("camera task failed: {e}")))??;

            tracing::info!(
                device = %stream.info.label,
                width = stream.info.width,
                height = stream.info.height,
                "Camera device acquired"
            );

            let stream: Box<dyn FrameSource> = Box::new(stream);
            Ok(stream)
        })
    }
}

/// Map an OpenCV open failure onto the camera error taxonomy.
pub fn classify_open_error(index: i32, message: &str) -> CameraError {
    let lower = message.to_lowercase();
    let refused = ["permission", "denied", "not authorized", "not permitted", "eacces"]
        .iter()
        .any(|needle| lower.contains(needle));
    if refused {
        CameraError::PermissionDenied(format!("camera {index}: {message}"))
    } else {
        CameraError::NotFound(format!("camera {index}: {message}"))
    }
}

fn open_capture(index: i32, constraints: &CameraConstraints) -> Result<(VideoCapture, StreamInfo), CameraError> {
    let mut capture = VideoCapture::new(index, videoio::CAP_ANY)
        .map_err(|e| classify_open_error(index, &e.message))?;
    let opened = capture
        .is_opened()
        .map_err(|e| classify_open_error(index, &e.message))?;
    if !opened {
        return Err(CameraError::NotFound(format!("camera {index}: device could not be opened")));
    }

    // Ideal sizes are hints; the driver picks the closest mode it has.
    let _ = capture.set(videoio::CAP_PROP_FRAME_WIDTH, constraints.ideal_width as f64);
    let _ = capture.set(videoio::CAP_PROP_FRAME_HEIGHT, constraints.ideal_height as f64);

    let width = capture
        .get(videoio::CAP_PROP_FRAME_WIDTH)
        .map_err(|e| classify_open_error(index, &e.message))? as u32;
    let height = capture
        .get(videoio::CAP_PROP_FRAME_HEIGHT)
        .map_err(|e| classify_open_error(index, &e.message))? as u32;

    let info = StreamInfo {
        label: format!("device:{index}"),
        width,
        height,
    };
    Ok((capture, info))
}

fn to_rgba(frame: &Mat) -> opencv::Result<Option<RgbaImage>> {
    let mut rgba = Mat::default();
    imgproc::cvt_color(frame, &mut rgba, imgproc::COLOR_BGR2RGBA, 0)?;
    let (width, height) = (rgba.cols() as u32, rgba.rows() as u32);
    let bytes = rgba.data_bytes()?.to_vec();
    Ok(RgbaImage::from_raw(width, height, bytes))
}

struct DeviceStream {
    info: StreamInfo,
    receiver: Receiver<Frame>,
    running: Arc<AtomicBool>,
}

impl DeviceStream {
    fn open(index: i32, constraints: &CameraConstraints) -> Result<Self, CameraError> {
        let (opened_tx, opened_rx) = bounded(1);
        let (sender, receiver) = bounded(1);
        let drain = receiver.clone();
        let running = Arc::new(AtomicBool::new(true));

        let thread_running = running.clone();
        let constraints = constraints.clone();
        thread::spawn(move || {
            let mut capture = match open_capture(index, &constraints) {
                Ok((capture, info)) => {
                    let _ = opened_tx.send(Ok(info));
                    capture
                }
                Err(e) => {
                    let _ = opened_tx.send(Err(e));
                    return;
                }
            };

            let mut sequence = 0u64;
            let mut empty_reads = 0u32;
            let mut mat = Mat::default();
            while thread_running.load(Ordering::SeqCst) {
                match capture.read(&mut mat) {
                    Ok(true) if !mat.empty() => empty_reads = 0,
                    Ok(_) => {
                        empty_reads += 1;
                        if empty_reads >= MAX_EMPTY_READS {
                            tracing::warn!(device = index, "Camera stopped delivering frames");
                            break;
                        }
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(device = index, "Camera read failed: {e}");
                        break;
                    }
                }

                let image = match to_rgba(&mat) {
                    Ok(Some(image)) => image,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!(device = index, "Skipping unconvertible frame: {e}");
                        continue;
                    }
                };
                sequence += 1;

                match sender.try_send(Frame::new(sequence, image)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(frame)) => {
                        let _ = drain.try_recv();
                        let _ = sender.try_send(frame);
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }

            if let Err(e) = capture.release() {
                tracing::warn!(device = index, "Camera release failed: {e}");
            }
        });

        let info = opened_rx
            .recv()
            .map_err(|_| CameraError::NotFound(format!("camera {index}: capture thread exited")))??;

        Ok(Self {
            info,
            receiver,
            running,
        })
    }
}

impl FrameSource for DeviceStream {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn poll_frame(&mut self) -> FramePoll {
        match self.receiver.try_recv() {
            Ok(frame) => FramePoll::Ready(frame),
            Err(TryRecvError::Empty) => FramePoll::Pending,
            Err(TryRecvError::Disconnected) => FramePoll::Ended("camera stopped".to_string()),
        }
    }

    fn close(&mut self) {
        // The capture thread releases the device after its current read.
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for DeviceStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facing_selects_device() {
        let camera = DeviceCamera::new();
        assert_eq!(camera.device_index(Facing::User), 0);
        assert_eq!(camera.device_index(Facing::Environment), 1);
        assert_eq!(DeviceCamera::with_index(4).device_index(Facing::User), 4);
    }

    #[test]
    fn test_open_errors_are_classified() {
        assert!(matches!(
            classify_open_error(0, "Permission denied"),
            CameraError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_open_error(0, "camera access not authorized"),
            CameraError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_open_error(3, "can't open camera by index"),
            CameraError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_device_fails_acquisition() {
        let mut camera = DeviceCamera::with_index(9_999);
        let result = camera.acquire(&CameraConstraints::default()).await;
        assert!(matches!(
            result,
            Err(CameraError::NotFound(_)) | Err(CameraError::PermissionDenied(_))
        ));
    }
}
