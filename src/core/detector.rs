//! Motion detector: owns the camera stream and turns frames into a single
//! debounced "motion confirmed" signal.
//!
//! The detector never blocks. Acquiring the device is handed back to the
//! caller as a future (see [`ArmOutcome::Acquire`]); its result comes back in
//! through [`MotionDetector::attach`]. Sampling happens one frame per
//! [`MotionDetector::sample`] call, which the owner drives from its frame
//! ticker.
//!
//! The device is held across arm/disarm cycles. Disarming only stops sampling;
//! the stream is released by [`MotionDetector::release`] or when it ends.

use crate::camera::{CameraConstraints, CameraError, CameraProvider, Frame, FramePoll, FrameSource, StreamInfo};
use crate::core::motion::{motion_score, MotionDebouncer};
use futures::future::BoxFuture;
use image::RgbaImage;

/// Future resolving to an acquired stream.
pub type Acquisition = BoxFuture<'static, Result<Box<dyn FrameSource>, CameraError>>;

/// Result of [`MotionDetector::arm`].
pub enum ArmOutcome {
    /// The stream was already held; sampling resumes on the next tick.
    Resumed,
    /// Already armed, or an acquisition is in flight. Nothing changed.
    AlreadyArmed,
    /// The device must be acquired first. Drive the future off the event loop
    /// and pass its result to [`MotionDetector::attach`] with `attempt`.
    Acquire { attempt: u64, acquisition: Acquisition },
}

impl std::fmt::Debug for ArmOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArmOutcome::Resumed => write!(f, "Resumed"),
            ArmOutcome::AlreadyArmed => write!(f, "AlreadyArmed"),
            ArmOutcome::Acquire { attempt, .. } => write!(f, "Acquire({attempt})"),
        }
    }
}

/// What one sampling step observed.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorSignal {
    /// Not armed, or no stream held
    Idle,
    /// The source had no new decoded frame; try again next tick
    Pending,
    /// First frame after arming (or after a size change); stored, not scored
    Baseline,
    /// Frame scored without completing the streak
    Sampled { score: f64 },
    /// Streak completed; sampling stops until re-armed
    MotionConfirmed { score: f64 },
    /// The stream ended and was released
    Lost(String),
}

struct LiveStream {
    source: Box<dyn FrameSource>,
    previous: Option<Frame>,
}

pub struct MotionDetector {
    provider: Box<dyn CameraProvider>,
    constraints: CameraConstraints,
    debouncer: MotionDebouncer,
    stream: Option<LiveStream>,
    armed: bool,
    fired: bool,
    pending_attempt: Option<u64>,
    next_attempt: u64,
    acquisitions: u32,
}

impl MotionDetector {
    pub fn new(
        provider: Box<dyn CameraProvider>,
        constraints: CameraConstraints,
        debouncer: MotionDebouncer,
    ) -> Self {
        Self {
            provider,
            constraints,
            debouncer,
            stream: None,
            armed: false,
            fired: false,
            pending_attempt: None,
            next_attempt: 1,
            acquisitions: 0,
        }
    }

    /// Start sampling, acquiring the device first if it is not held.
    ///
    /// Idempotent: while armed or acquiring, this returns
    /// [`ArmOutcome::AlreadyArmed`] and does nothing.
    pub fn arm(&mut self) -> ArmOutcome {
        if self.armed || self.pending_attempt.is_some() {
            return ArmOutcome::AlreadyArmed;
        }

        self.fired = false;
        self.debouncer.reset();

        if let Some(live) = self.stream.as_mut() {
            // Never score a fresh frame against one from the last cycle.
            live.previous = None;
            self.armed = true;
            tracing::debug!("Motion detector re-armed on held stream");
            return ArmOutcome::Resumed;
        }

        let attempt = self.next_attempt;
        self.next_attempt += 1;
        self.pending_attempt = Some(attempt);
        self.armed = true;

        tracing::debug!(attempt, "Acquiring camera");
        ArmOutcome::Acquire {
            attempt,
            acquisition: self.provider.acquire(&self.constraints),
        }
    }

    /// Deliver the result of an acquisition started by [`arm`](Self::arm).
    ///
    /// Results for a superseded attempt are discarded (an acquired stream is
    /// closed immediately). On failure the detector is left disarmed and can
    /// be armed again.
    pub fn attach(
        &mut self,
        attempt: u64,
        result: Result<Box<dyn FrameSource>, CameraError>,
    ) -> Result<StreamInfo, CameraError> {
        if self.pending_attempt != Some(attempt) {
            if let Ok(mut source) = result {
                source.close();
            }
            return Err(CameraError::NotAcquired);
        }
        self.pending_attempt = None;

        match result {
            Ok(source) => {
                let info = source.info().clone();
                self.acquisitions += 1;
                self.stream = Some(LiveStream {
                    source,
                    previous: None,
                });
                tracing::info!(
                    device = %info.label,
                    width = info.width,
                    height = info.height,
                    sampling = self.armed,
                    "Camera acquired"
                );
                Ok(info)
            }
            Err(e) => {
                self.armed = false;
                tracing::error!("Camera acquisition failed: {e}");
                Err(e)
            }
        }
    }

    /// Arm and wait for acquisition inline.
    pub async fn arm_and_wait(&mut self) -> Result<(), CameraError> {
        match self.arm() {
            ArmOutcome::Acquire {
                attempt,
                acquisition,
            } => {
                let result = acquisition.await;
                self.attach(attempt, result).map(|_| ())
            }
            ArmOutcome::Resumed | ArmOutcome::AlreadyArmed => Ok(()),
        }
    }

    /// Stop sampling. The device stays held. Returns whether it was armed.
    pub fn disarm(&mut self) -> bool {
        let was_armed = self.armed;
        self.armed = false;
        self.debouncer.reset();
        was_armed
    }

    /// Poll one frame and score it against the previous one.
    pub fn sample(&mut self) -> DetectorSignal {
        if !self.armed || self.fired {
            return DetectorSignal::Idle;
        }
        let Some(live) = self.stream.as_mut() else {
            return DetectorSignal::Idle;
        };

        let frame = match live.source.poll_frame() {
            FramePoll::Ready(frame) => frame,
            FramePoll::Pending => return DetectorSignal::Pending,
            FramePoll::Ended(reason) => {
                tracing::warn!("Camera stream ended: {reason}");
                self.release();
                return DetectorSignal::Lost(reason);
            }
        };

        let score = live
            .previous
            .as_ref()
            .and_then(|previous| motion_score(&previous.image, &frame.image));
        live.previous = Some(frame);

        let Some(score) = score else {
            return DetectorSignal::Baseline;
        };

        if self.debouncer.observe(score) {
            self.fired = true;
            self.armed = false;
            tracing::info!(score, "Motion confirmed");
            DetectorSignal::MotionConfirmed { score }
        } else {
            tracing::debug!(score, streak = self.debouncer.streak(), "Frame sampled");
            DetectorSignal::Sampled { score }
        }
    }

    /// Grab the current frame, mirrored horizontally.
    ///
    /// Prefers the freshest decoded frame and falls back to the last sampled
    /// one. Works whether or not sampling is armed.
    pub fn capture_frame(&mut self) -> Result<RgbaImage, CameraError> {
        let live = self.stream.as_mut().ok_or(CameraError::NotAcquired)?;

        loop {
            match live.source.poll_frame() {
                FramePoll::Ready(frame) => live.previous = Some(frame),
                FramePoll::Pending => break,
                FramePoll::Ended(reason) => {
                    self.release();
                    return Err(CameraError::StreamEnded(reason));
                }
            }
        }

        let frame = live.previous.as_ref().ok_or(CameraError::NoFrame)?;
        Ok(image::imageops::flip_horizontal(&frame.image))
    }

    /// Close the stream and forget any in-flight acquisition.
    /// Returns whether a stream was held.
    pub fn release(&mut self) -> bool {
        self.armed = false;
        self.pending_attempt = None;
        match self.stream.take() {
            Some(mut live) => {
                live.source.close();
                tracing::info!("Camera released");
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_acquiring(&self) -> bool {
        self.pending_attempt.is_some()
    }

    pub fn holds_camera(&self) -> bool {
        self.stream.is_some()
    }

    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream.as_ref().map(|live| live.source.info())
    }

    /// Number of successful device acquisitions so far.
    pub fn acquisitions(&self) -> u32 {
        self.acquisitions
    }
}

impl Drop for MotionDetector {
    fn drop(&mut self) {
        self.release();
    }
}
