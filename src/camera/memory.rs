//! In-memory camera that plays back frames pushed through a shared feed.
//!
//! Useful for demos and for driving the detector deterministically: the feed
//! handle stays with the caller while the camera is owned by the detector.

use crate::camera::types::{
    CameraConstraints, CameraError, CameraProvider, Frame, FramePoll, FrameSource, StreamInfo,
};
use futures::future::BoxFuture;
use image::{Rgba, RgbaImage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct FeedState {
    queue: VecDeque<RgbaImage>,
    deny: Option<String>,
    ended: Option<String>,
    acquisitions: u32,
    releases: u32,
}

/// Shared handle controlling what a [`MemoryCamera`] yields.
#[derive(Debug, Clone, Default)]
pub struct MemoryFeed {
    state: Arc<Mutex<FeedState>>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a frame; it becomes "ready" on the next poll.
    pub fn push(&self, image: RgbaImage) {
        self.lock().queue.push_back(image);
    }

    /// Queue several frames in order.
    pub fn extend(&self, images: impl IntoIterator<Item = RgbaImage>) {
        self.lock().queue.extend(images);
    }

    /// Make the next acquisitions fail with a permission error.
    pub fn deny(&self, reason: impl Into<String>) {
        self.lock().deny = Some(reason.into());
    }

    /// Allow acquisitions again.
    pub fn allow(&self) {
        self.lock().deny = None;
    }

    /// End every open stream once its queue drains.
    pub fn end(&self, reason: impl Into<String>) {
        self.lock().ended = Some(reason.into());
    }

    /// Number of frames still queued.
    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    /// How many times the device was acquired.
    pub fn acquisitions(&self) -> u32 {
        self.lock().acquisitions
    }

    /// How many times the device was released.
    pub fn releases(&self) -> u32 {
        self.lock().releases
    }

    /// Whether a stream is currently held.
    pub fn is_held(&self) -> bool {
        let state = self.lock();
        state.acquisitions > state.releases
    }
}

/// Camera backed by a [`MemoryFeed`].
pub struct MemoryCamera {
    feed: MemoryFeed,
    width: u32,
    height: u32,
}

impl MemoryCamera {
    pub fn new(feed: MemoryFeed, width: u32, height: u32) -> Self {
        Self {
            feed,
            width,
            height,
        }
    }
}

impl CameraProvider for MemoryCamera {
    fn acquire(
        &mut self,
        _constraints: &CameraConstraints,
    ) -> BoxFuture<'static, Result<Box<dyn FrameSource>, CameraError>> {
        let feed = self.feed.clone();
        let info = StreamInfo {
            label: "memory".to_string(),
            width: self.width,
            height: self.height,
        };

        Box::pin(async move {
            {
                let mut state = feed.lock();
                if let Some(reason) = state.deny.clone() {
                    return Err(CameraError::PermissionDenied(reason));
                }
                state.acquisitions += 1;
            }
            let stream: Box<dyn FrameSource> = Box::new(MemoryStream {
                feed,
                info,
                sequence: 0,
                closed: false,
            });
            Ok(stream)
        })
    }
}

struct MemoryStream {
    feed: MemoryFeed,
    info: StreamInfo,
    sequence: u64,
    closed: bool,
}

impl FrameSource for MemoryStream {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn poll_frame(&mut self) -> FramePoll {
        if self.closed {
            return FramePoll::Ended("stream closed".to_string());
        }

        let mut state = self.feed.lock();
        match state.queue.pop_front() {
            Some(image) => {
                self.sequence += 1;
                FramePoll::Ready(Frame::new(self.sequence, image))
            }
            None => match &state.ended {
                Some(reason) => FramePoll::Ended(reason.clone()),
                None => FramePoll::Pending,
            },
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.feed.lock().releases += 1;
        }
    }
}

impl Drop for MemoryStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build a frame filled with one color.
pub fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([rgb[0], rgb[1], rgb[2], 255]))
}
