//! Frame-sequence camera: plays a directory of still images as a live feed.
//!
//! Frames are decoded on a background thread and handed over through a small
//! bounded channel, so polling never blocks on decoding. An empty channel is
//! reported as [`FramePoll::Pending`].

use crate::camera::types::{
    CameraConstraints, CameraError, CameraProvider, Frame, FramePoll, FrameSource, StreamInfo,
};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, TryRecvError};
use futures::future::BoxFuture;
use image::imageops::FilterType;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];
const CHANNEL_DEPTH: usize = 2;
const MAX_FPS: u32 = 120;

/// Camera that loops over the images of a directory at a fixed rate.
pub struct SequenceCamera {
    dir: PathBuf,
    fps: u32,
}

impl SequenceCamera {
    pub fn new(dir: impl Into<PathBuf>, fps: u32) -> Self {
        Self {
            dir: dir.into(),
            fps: fps.clamp(1, MAX_FPS),
        }
    }
}

impl CameraProvider for SequenceCamera {
    fn acquire(
        &mut self,
        constraints: &CameraConstraints,
    ) -> BoxFuture<'static, Result<Box<dyn FrameSource>, CameraError>> {
        let dir = self.dir.clone();
        let fps = self.fps;
        let constraints = constraints.clone();

        Box::pin(async move {
            let stream = tokio::task::spawn_blocking(move || SequenceStream::open(&dir, fps))
                .await
                .map_err(|e| CameraError::NotFound(format!("camera task failed: {e}")))??;

            tracing::info!(
                device = %stream.info.label,
                width = stream.info.width,
                height = stream.info.height,
                ideal_width = constraints.ideal_width,
                ideal_height = constraints.ideal_height,
                "Frame sequence acquired"
            );

            let stream: Box<dyn FrameSource> = Box::new(stream);
            Ok(stream)
        })
    }
}

/// Delay between frames at a given rate.
fn frame_interval(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / fps.max(1) as f64)
}

/// List decodable frame files in a directory, in name order.
pub fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| CameraError::NotFound(format!("{}: {e}", dir.display())))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| FRAME_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(CameraError::NotFound(format!(
            "no image frames in {}",
            dir.display()
        )));
    }
    Ok(paths)
}

struct SequenceStream {
    info: StreamInfo,
    receiver: Receiver<Frame>,
    running: Arc<AtomicBool>,
}

impl SequenceStream {
    fn open(dir: &Path, fps: u32) -> Result<Self, CameraError> {
        let paths = list_frames(dir)?;
        let first = image::open(&paths[0])
            .map_err(|e| CameraError::NotFound(format!("{}: {e}", paths[0].display())))?
            .to_rgba8();

        let info = StreamInfo {
            label: format!("sequence:{}", dir.display()),
            width: first.width(),
            height: first.height(),
        };

        let (sender, receiver) = bounded(CHANNEL_DEPTH);
        let running = Arc::new(AtomicBool::new(true));
        let interval = frame_interval(fps);

        let thread_running = running.clone();
        let (width, height) = (info.width, info.height);
        thread::spawn(move || {
            let mut sequence = 0u64;
            for path in paths.iter().cycle() {
                if !thread_running.load(Ordering::SeqCst) {
                    break;
                }

                let image = match decode_frame(path, width, height) {
                    Ok(image) => image,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), "Skipping undecodable frame: {e}");
                        continue;
                    }
                };
                sequence += 1;

                let mut frame = Frame::new(sequence, image);
                loop {
                    match sender.send_timeout(frame, interval) {
                        Ok(()) => break,
                        Err(SendTimeoutError::Timeout(f)) => {
                            if !thread_running.load(Ordering::SeqCst) {
                                return;
                            }
                            frame = f;
                        }
                        Err(SendTimeoutError::Disconnected(_)) => return,
                    }
                }
                thread::sleep(interval);
            }
        });

        Ok(Self {
            info,
            receiver,
            running,
        })
    }
}

fn decode_frame(path: &Path, width: u32, height: u32) -> Result<RgbaImage, image::ImageError> {
    let image = image::open(path)?.to_rgba8();
    if image.width() == width && image.height() == height {
        Ok(image)
    } else {
        Ok(image::imageops::resize(&image, width, height, FilterType::Triangle))
    }
}

impl FrameSource for SequenceStream {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn poll_frame(&mut self) -> FramePoll {
        match self.receiver.try_recv() {
            Ok(frame) => FramePoll::Ready(frame),
            Err(TryRecvError::Empty) => FramePoll::Pending,
            Err(TryRecvError::Disconnected) => FramePoll::Ended("decoder stopped".to_string()),
        }
    }

    fn close(&mut self) {
        // The decoder exits within one frame interval; nothing waits for it.
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for SequenceStream {
    fn drop(&mut self) {
        self.close();
    }
}
