//! The interaction state machine.
//!
//! [`Sentry`] is a single actor. It owns the motion detector, the timer table
//! and the speech/AI collaborators, and it is the only thing that changes the
//! status. Every status change goes through [`Sentry::enter`], which first
//! tears down what the old status set up (timers, recognition, sampling) and
//! then runs the entry actions of the new one.
//!
//! Slow work (camera acquisition, AI calls) runs in spawned tasks that report
//! back through the event queue, tagged with the cycle or session that asked
//! for it. Results for a cycle or session that is already over are dropped.

use crate::ai::{
    AiCapability, AiError, Collaborator, CALL_FAILED_APOLOGY, PERSONA_PREAMBLE, UNAVAILABLE_APOLOGY,
};
use crate::camera::{CameraError, CameraProvider, FrameSource};
use crate::config::{Config, TimingConfig};
use crate::core::{
    render_processed, ArmOutcome, CaptureError, CaptureSession, CapturedImage, DetectorSignal,
    MotionDetector, DENIED_LABEL, PHOTO_JPEG_QUALITY,
};
use crate::error::SentryError;
use crate::sentry::conversation::{Conversation, Speaker};
use crate::sentry::event::{Command, SentryEvent};
use crate::sentry::snapshot::{CameraState, CaptureSummary, SentrySnapshot};
use crate::sentry::status::Status;
use crate::sentry::timers::{Phase, TimerTable};
use crate::speech::{AlertTone, RecognitionError, RecognitionEvent, RecognitionSink, Recognizer, Synthesizer};
use crate::transparency::{SharedTransparencyLog, TransparencyStats};
use image::RgbaImage;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spoken once the alert tone has had time to sound.
pub const CHALLENGE_PHRASE: &str = "PARE TIENE QUE IDENTIFICARSE";

/// Spoken on entering `identified`.
pub const VERDICT_PHRASE: &str = "Identificación completada. Bienvenido a PLOT CENTER.";

/// External services the sentry drives.
pub struct Collaborators {
    pub camera: Box<dyn CameraProvider>,
    pub voice: Arc<dyn Synthesizer>,
    /// `None` disables voice chat
    pub recognizer: Option<Box<dyn Recognizer>>,
    pub ai: AiCapability,
}

/// Cloneable handle for sending commands and watching state.
#[derive(Clone)]
pub struct SentryHandle {
    tx: UnboundedSender<SentryEvent>,
    snapshots: watch::Receiver<SentrySnapshot>,
    log: SharedTransparencyLog,
}

impl SentryHandle {
    /// Queue a command. Returns `false` once the sentry has stopped.
    pub fn send(&self, command: Command) -> bool {
        self.tx.send(SentryEvent::Command(command)).is_ok()
    }

    pub fn start_chat(&self) -> bool {
        self.send(Command::StartChat)
    }

    pub fn stop_chat(&self) -> bool {
        self.send(Command::StopChat)
    }

    pub fn reset(&self) -> bool {
        self.send(Command::Reset)
    }

    pub fn retry_camera(&self) -> bool {
        self.send(Command::RetryCamera)
    }

    pub fn shutdown(&self) -> bool {
        self.send(Command::Shutdown)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SentrySnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver notified on every published change.
    pub fn subscribe(&self) -> watch::Receiver<SentrySnapshot> {
        self.snapshots.clone()
    }

    pub fn stats(&self) -> TransparencyStats {
        self.log.stats()
    }

    /// Session counters shared with the running sentry.
    pub fn transparency_log(&self) -> &SharedTransparencyLog {
        &self.log
    }
}

pub struct Sentry {
    status: Status,
    detector: MotionDetector,
    timers: TimerTable,
    timing: TimingConfig,
    locale: String,
    frame_interval: Duration,
    tone: AlertTone,

    voice: Arc<dyn Synthesizer>,
    recognizer: Option<Box<dyn Recognizer>>,
    collaborator: Option<Arc<dyn Collaborator>>,

    cycle: u64,
    motion_detected: bool,
    capture: Option<CaptureSession>,
    photo_raster: Option<RgbaImage>,
    conversation: Conversation,
    last_error: Option<SentryError>,

    chat_session: u64,
    listen_session: u64,
    listening: bool,
    recognition_failed: bool,
    awaiting_reply: bool,

    tasks: Vec<JoinHandle<()>>,
    shutdown: bool,

    tx: UnboundedSender<SentryEvent>,
    rx: UnboundedReceiver<SentryEvent>,
    recognition_tx: UnboundedSender<(u64, RecognitionEvent)>,
    recognition_rx: UnboundedReceiver<(u64, RecognitionEvent)>,
    snapshot_tx: watch::Sender<SentrySnapshot>,
    log: SharedTransparencyLog,
}

impl Sentry {
    pub fn new(collaborators: Collaborators, config: &Config) -> (Self, SentryHandle) {
        let (tx, rx) = unbounded_channel();
        let (recognition_tx, recognition_rx) = unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(SentrySnapshot::default());
        let log = crate::transparency::create_shared_log();

        let detector = MotionDetector::new(
            collaborators.camera,
            config.camera.constraints(),
            config.detector.debouncer(),
        );

        let sentry = Self {
            status: Status::Standby,
            detector,
            timers: TimerTable::new(tx.clone()),
            timing: config.timing.clone(),
            locale: config.voice.locale.clone(),
            frame_interval: config.camera.frame_interval.max(Duration::from_millis(1)),
            tone: AlertTone::default(),
            voice: collaborators.voice,
            recognizer: collaborators.recognizer,
            collaborator: collaborators.ai.collaborator(),
            cycle: 1,
            motion_detected: false,
            capture: None,
            photo_raster: None,
            conversation: Conversation::new(),
            last_error: collaborators.ai.startup_error(),
            chat_session: 1,
            listen_session: 0,
            listening: false,
            recognition_failed: false,
            awaiting_reply: false,
            tasks: Vec::new(),
            shutdown: false,
            tx: tx.clone(),
            rx,
            recognition_tx,
            recognition_rx,
            snapshot_tx,
            log: log.clone(),
        };
        sentry.snapshot_tx.send_replace(sentry.snapshot());

        let handle = SentryHandle { tx, snapshots, log };
        (sentry, handle)
    }

    /// Run until [`Command::Shutdown`], then release everything.
    pub async fn run(mut self) -> TransparencyStats {
        match &self.collaborator {
            Some(_) => tracing::info!("AI collaborator available"),
            None => tracing::info!("AI collaborator absent; using mechanical paths only"),
        }
        if let Some(error) = &self.last_error {
            tracing::warn!("{error}");
        }

        self.arm_detector();
        self.publish();

        let mut ticker = tokio::time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.shutdown {
            let sampling = self.detector.is_armed() && self.detector.holds_camera();

            tokio::select! {
                Some(event) = self.rx.recv() => self.handle_event(event),
                Some((session, event)) = self.recognition_rx.recv() => {
                    self.handle_recognition(session, event)
                }
                _ = ticker.tick(), if sampling => self.on_frame_tick(),
            }

            self.publish();
        }

        self.teardown();
        self.publish();
        tracing::info!("Sentry stopped");
        self.log.stats()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Build the current presentation snapshot.
    pub fn snapshot(&self) -> SentrySnapshot {
        SentrySnapshot {
            status: self.status,
            label: self.status.label(),
            cycle: self.cycle,
            motion_detected: self.motion_detected,
            camera: CameraState {
                held: self.detector.holds_camera(),
                sampling: self.detector.is_armed() && self.detector.holds_camera(),
                acquiring: self.detector.is_acquiring(),
            },
            capture: self.capture.as_ref().map(CaptureSummary::from),
            conversation: self.conversation.entries().to_vec(),
            listening: self.listening,
            awaiting_reply: self.awaiting_reply,
            ai_available: self.collaborator.is_some(),
            voice_chat_available: self.recognizer.is_some(),
            last_error: self.last_error.clone(),
            pending_timers: self.timers.pending_count(),
        }
    }

    fn publish(&self) {
        let next = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn handle_event(&mut self, event: SentryEvent) {
        match event {
            SentryEvent::Command(command) => self.handle_command(command),
            SentryEvent::TimerFired { phase, id } => {
                if self.timers.fire(phase, id) {
                    self.on_timer(phase);
                }
            }
            SentryEvent::CameraAcquired { attempt, result } => self.on_camera_acquired(attempt, result),
            SentryEvent::AnalysisSettled { cycle, result } => self.on_analysis(cycle, result),
            SentryEvent::ProcessedRendered { cycle, result } => self.on_processed(cycle, result),
            SentryEvent::ChatReply { chat, result } => self.on_chat_reply(chat, result),
        }
    }

    fn handle_command(&mut self, command: Command) {
        tracing::debug!(?command, status = %self.status, "Command received");
        match command {
            Command::StartChat => {
                if self.status != Status::Identified {
                    tracing::debug!(status = %self.status, "Chat can only start once identified");
                } else if self.recognizer.is_none() {
                    tracing::info!("Voice chat unavailable; start-chat ignored");
                } else {
                    self.enter(Status::Chatting);
                }
            }
            Command::StopChat => {
                if self.status == Status::Chatting {
                    self.enter(Status::Identified);
                }
            }
            Command::Reset => {
                if self.status == Status::Standby {
                    tracing::debug!("Already in standby; reset ignored");
                } else {
                    self.reset();
                }
            }
            Command::RetryCamera => {
                if self.status == Status::Standby {
                    if matches!(self.last_error, Some(SentryError::CameraUnavailable(_))) {
                        self.last_error = None;
                    }
                    self.arm_detector();
                }
            }
            Command::Shutdown => {
                tracing::info!("Shutdown requested");
                self.shutdown = true;
            }
        }
    }

    /// Leave the current status and enter `next`.
    ///
    /// Everything the old status set up is cancelled before the new status
    /// takes effect.
    fn enter(&mut self, next: Status) {
        let previous = self.status;
        if !previous.can_enter(next) {
            tracing::warn!(from = %previous, to = %next, "Rejected transition");
            return;
        }

        let cancelled = self.timers.cancel_all();
        if previous == Status::Chatting {
            self.stop_listening();
            self.chat_session += 1;
            self.awaiting_reply = false;
        }
        if previous == Status::Standby {
            self.detector.disarm();
        }

        self.status = next;
        tracing::info!(from = %previous, to = %next, cancelled, "Status changed");

        match next {
            Status::Standby => {}
            Status::Alerting => {
                self.voice.play_tone(&self.tone);
                self.timers.schedule(Phase::Challenge, self.timing.challenge_delay);
            }
            Status::Scanning => {
                self.timers.schedule(Phase::Capture, self.timing.capture_delay);
            }
            Status::Generating => self.begin_generating(),
            Status::Identified => {
                if previous == Status::Generating {
                    self.say(VERDICT_PHRASE);
                    if self.recognizer.is_some() {
                        self.timers.schedule(Phase::ChatAutoStart, self.timing.chat_auto_start);
                    }
                }
            }
            Status::Chatting => {
                self.recognition_failed = false;
                self.start_listening();
            }
        }
    }

    /// Abandon the cycle and return to watching.
    fn reset(&mut self) {
        tracing::info!(status = %self.status, "Resetting to standby");
        self.enter(Status::Standby);

        self.cycle += 1;
        self.capture = None;
        self.photo_raster = None;
        self.conversation.clear();
        self.last_error = None;
        self.motion_detected = false;
        self.awaiting_reply = false;
        self.log.record_reset();

        self.arm_detector();
    }

    fn on_timer(&mut self, phase: Phase) {
        match (phase, self.status) {
            (Phase::Challenge, Status::Alerting) => {
                self.say(CHALLENGE_PHRASE);
                self.enter(Status::Scanning);
            }
            (Phase::Capture, Status::Scanning) => self.capture_photo(),
            (Phase::Verdict, Status::Generating) => self.enter(Status::Identified),
            (Phase::ChatAutoStart, Status::Identified) => self.enter(Status::Chatting),
            (Phase::ListenRestart, Status::Chatting) => {
                if !self.listening {
                    self.start_listening();
                }
            }
            (phase, status) => {
                tracing::debug!(?phase, %status, "Timer does not apply to current status");
            }
        }
    }

    fn arm_detector(&mut self) {
        match self.detector.arm() {
            ArmOutcome::Resumed => tracing::debug!("Detector re-armed"),
            ArmOutcome::AlreadyArmed => tracing::debug!("Detector already armed"),
            ArmOutcome::Acquire {
                attempt,
                acquisition,
            } => {
                let tx = self.tx.clone();
                self.spawn(async move {
                    let result = acquisition.await;
                    let _ = tx.send(SentryEvent::CameraAcquired { attempt, result });
                });
            }
        }
    }

    fn on_camera_acquired(&mut self, attempt: u64, result: Result<Box<dyn FrameSource>, CameraError>) {
        match self.detector.attach(attempt, result) {
            Ok(_) => {
                if self.status != Status::Standby {
                    self.detector.disarm();
                }
            }
            Err(CameraError::NotAcquired) => {
                tracing::debug!(attempt, "Discarded stale camera acquisition");
            }
            Err(e) => {
                self.last_error = Some(SentryError::CameraUnavailable(e.to_string()));
            }
        }
    }

    fn on_frame_tick(&mut self) {
        match self.detector.sample() {
            DetectorSignal::Idle => {}
            DetectorSignal::Pending => self.log.record_frame_pending(),
            DetectorSignal::Baseline | DetectorSignal::Sampled { .. } => {
                self.log.record_frame_sampled()
            }
            DetectorSignal::MotionConfirmed { .. } => {
                self.log.record_frame_sampled();
                self.log.record_motion();
                self.on_motion_confirmed();
            }
            DetectorSignal::Lost(reason) => {
                self.last_error = Some(SentryError::CameraUnavailable(reason));
            }
        }
    }

    fn on_motion_confirmed(&mut self) {
        if self.status != Status::Standby {
            tracing::debug!(status = %self.status, "Ignoring stray motion event");
            return;
        }
        self.motion_detected = true;
        self.enter(Status::Alerting);
    }

    fn capture_photo(&mut self) {
        let encoded = self
            .detector
            .capture_frame()
            .map_err(|e| e.to_string())
            .and_then(|raster| {
                CapturedImage::jpeg(&raster, PHOTO_JPEG_QUALITY)
                    .map(|photo| (raster, photo))
                    .map_err(|e| e.to_string())
            });

        match encoded {
            Ok((raster, photo)) => {
                tracing::info!(width = photo.width, height = photo.height, bytes = photo.len(), "Photo captured");
                self.log.record_photo();
                self.capture = Some(CaptureSession::new(self.cycle, photo));
                self.photo_raster = Some(raster);
                self.enter(Status::Generating);
            }
            Err(reason) => {
                tracing::warn!("Photo capture failed: {reason}");
                self.reset();
                self.last_error = Some(SentryError::CameraUnavailable(reason));
            }
        }
    }

    fn begin_generating(&mut self) {
        self.timers.schedule(Phase::Verdict, self.timing.verdict_delay);

        let Some(photo) = self.capture.as_ref().map(|session| session.photo.clone()) else {
            tracing::warn!("Generating without a capture session");
            return;
        };

        match self.collaborator.clone() {
            Some(collaborator) => {
                let analysis = collaborator.analyze_image(photo.bytes.clone(), photo.mime_type());
                let cycle = self.cycle;
                let tx = self.tx.clone();
                self.log.record_ai_request();
                self.spawn(async move {
                    let result = analysis.await;
                    let _ = tx.send(SentryEvent::AnalysisSettled { cycle, result });
                });
            }
            None => tracing::debug!("No AI collaborator; skipping image description"),
        }

        if let Some(raster) = self.photo_raster.take() {
            let cycle = self.cycle;
            let tx = self.tx.clone();
            self.spawn(async move {
                let result = tokio::task::spawn_blocking(move || render_processed(&raster, DENIED_LABEL))
                    .await
                    .unwrap_or_else(|e| Err(CaptureError::Encode(format!("render task failed: {e}"))));
                let _ = tx.send(SentryEvent::ProcessedRendered { cycle, result });
            });
        }
    }

    fn on_processed(&mut self, cycle: u64, result: Result<CapturedImage, CaptureError>) {
        let Some(session) = self.capture.as_mut().filter(|session| session.cycle == cycle) else {
            tracing::debug!(cycle, "Discarded processed image from an old cycle");
            return;
        };

        match result {
            Ok(processed) => {
                session.attach_processed(processed);
            }
            Err(e) => tracing::warn!("Processed image failed: {e}"),
        }
    }

    fn on_analysis(&mut self, cycle: u64, result: Result<String, AiError>) {
        if cycle != self.cycle || self.status != Status::Generating {
            tracing::debug!(cycle, "Discarded late image analysis");
            return;
        }

        match result {
            Ok(description) => {
                if let Some(session) = self.capture.as_mut() {
                    session.attach_description(description);
                }
            }
            Err(e) => {
                tracing::warn!("Image analysis failed: {e}");
                self.log.record_ai_failure();
                self.last_error = Some(SentryError::AiCallFailed(e.to_string()));
            }
        }
    }

    fn start_listening(&mut self) {
        let Some(recognizer) = self.recognizer.as_mut() else {
            return;
        };

        self.listen_session += 1;
        let sink = RecognitionSink::new(self.listen_session, self.recognition_tx.clone());
        match recognizer.start(sink) {
            Ok(()) => {
                self.listening = true;
                tracing::debug!(session = self.listen_session, "Listening");
            }
            Err(RecognitionError::Unavailable(reason)) => {
                tracing::warn!("Speech recognition unavailable, voice chat disabled: {reason}");
                self.listening = false;
                self.recognizer = None;
                self.last_error = Some(SentryError::SpeechRecognition(reason));
            }
            Err(e) => {
                tracing::warn!("Speech recognition failed to start: {e}");
                self.listening = false;
                self.timers.schedule(Phase::ListenRestart, self.timing.listen_retry);
            }
        }
    }

    fn stop_listening(&mut self) {
        if let Some(recognizer) = self.recognizer.as_mut() {
            recognizer.stop();
        }
        // Anything still in flight from the old session is stale now.
        self.listen_session += 1;
        self.listening = false;
    }

    fn handle_recognition(&mut self, session: u64, event: RecognitionEvent) {
        if session != self.listen_session || self.status != Status::Chatting {
            tracing::debug!(session, "Discarded stale recognition event");
            return;
        }

        match event {
            RecognitionEvent::Utterance(text) => {
                tracing::info!("Heard: {text}");
                self.log.record_utterance();
                self.conversation.push(Speaker::User, text.clone());
                self.respond(text);
            }
            RecognitionEvent::Error(RecognitionError::Unavailable(reason)) => {
                tracing::warn!("Speech recognition unavailable, voice chat disabled: {reason}");
                if let Some(mut recognizer) = self.recognizer.take() {
                    recognizer.stop();
                }
                self.listen_session += 1;
                self.listening = false;
                self.last_error = Some(SentryError::SpeechRecognition(reason));
            }
            RecognitionEvent::Error(e) => {
                tracing::warn!(code = e.code(), "Speech recognition error: {e}");
                self.recognition_failed = true;
            }
            RecognitionEvent::Ended => {
                self.listening = false;
                if self.recognizer.is_some() {
                    let delay = if self.recognition_failed {
                        self.timing.listen_retry
                    } else {
                        self.timing.listen_restart
                    };
                    self.recognition_failed = false;
                    self.timers.schedule(Phase::ListenRestart, delay);
                }
            }
        }
    }

    fn respond(&mut self, utterance: String) {
        let Some(collaborator) = self.collaborator.clone() else {
            self.conversation.push(Speaker::System, UNAVAILABLE_APOLOGY);
            self.say(UNAVAILABLE_APOLOGY);
            return;
        };

        let reply = collaborator.converse(PERSONA_PREAMBLE.to_string(), utterance);
        let chat = self.chat_session;
        let tx = self.tx.clone();
        self.awaiting_reply = true;
        self.log.record_ai_request();
        self.spawn(async move {
            let result = reply.await;
            let _ = tx.send(SentryEvent::ChatReply { chat, result });
        });
    }

    fn on_chat_reply(&mut self, chat: u64, result: Result<String, AiError>) {
        if chat != self.chat_session || self.status != Status::Chatting {
            tracing::debug!(chat, "Discarded late chat reply");
            return;
        }
        self.awaiting_reply = false;

        match result {
            Ok(text) => {
                self.conversation.push(Speaker::System, text.clone());
                self.say(&text);
            }
            Err(e) => {
                tracing::warn!("Chat call failed: {e}");
                self.log.record_ai_failure();
                self.last_error = Some(SentryError::AiCallFailed(e.to_string()));
                self.conversation.push(Speaker::Error, CALL_FAILED_APOLOGY);
                self.say(CALL_FAILED_APOLOGY);
            }
        }
    }

    fn say(&self, text: &str) {
        self.voice.speak(text, &self.locale);
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.retain(|handle| !handle.is_finished());
        self.tasks.push(tokio::spawn(task));
    }

    /// Cancel every timer and in-flight task and release the devices.
    fn teardown(&mut self) {
        let timers = self.timers.cancel_all();
        self.stop_listening();
        self.detector.release();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        tracing::info!(timers, "Sentry torn down");
    }
}
