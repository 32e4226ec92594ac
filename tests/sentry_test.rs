//! End-to-end tests for the sentry state machine, on virtual time.

use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use vigia_sentry::ai::{
    AiCapability, AiError, Collaborator, CALL_FAILED_APOLOGY, PERSONA_PREAMBLE, UNAVAILABLE_APOLOGY,
};
use vigia_sentry::camera::{solid_frame, MemoryCamera, MemoryFeed};
use vigia_sentry::config::Config;
use vigia_sentry::sentry::{
    Collaborators, Sentry, SentryHandle, SentrySnapshot, Speaker, Status, CHALLENGE_PHRASE,
    VERDICT_PHRASE,
};
use vigia_sentry::speech::{
    AlertTone, RecognitionError, RecognitionEvent, RecognitionSink, Recognizer, Synthesizer,
};
use vigia_sentry::{SentryError, TransparencyStats};

const WIDTH: u32 = 32;
const HEIGHT: u32 = 24;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingVoice {
    lines: Mutex<Vec<String>>,
    tones: Mutex<u32>,
}

impl RecordingVoice {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    fn said(&self, text: &str) -> bool {
        self.lines().iter().any(|line| line == text)
    }

    fn tones(&self) -> u32 {
        *self.tones.lock().unwrap()
    }
}

impl Synthesizer for RecordingVoice {
    fn speak(&self, text: &str, _locale: &str) {
        self.lines.lock().unwrap().push(text.to_string());
    }

    fn play_tone(&self, _tone: &AlertTone) {
        *self.tones.lock().unwrap() += 1;
    }
}

/// Each `start` plays the next scripted session (its events, then `Ended`).
/// Once the script runs out, sessions stay open and silent; stopping one
/// reports `Aborted` then `Ended`, like a real backend.
#[derive(Clone, Default)]
struct ScriptedRecognizer {
    script: Arc<Mutex<VecDeque<Vec<RecognitionEvent>>>>,
    open: Arc<Mutex<Option<RecognitionSink>>>,
    starts: Arc<Mutex<u32>>,
    stops: Arc<Mutex<u32>>,
    refuse: Arc<Mutex<Option<RecognitionError>>>,
}

impl ScriptedRecognizer {
    fn with_sessions(sessions: Vec<Vec<RecognitionEvent>>) -> Self {
        let recognizer = Self::default();
        recognizer.script.lock().unwrap().extend(sessions);
        recognizer
    }

    fn starts(&self) -> u32 {
        *self.starts.lock().unwrap()
    }

    fn stops(&self) -> u32 {
        *self.stops.lock().unwrap()
    }
}

impl Recognizer for ScriptedRecognizer {
    fn start(&mut self, sink: RecognitionSink) -> Result<(), RecognitionError> {
        if let Some(error) = self.refuse.lock().unwrap().clone() {
            return Err(error);
        }
        *self.starts.lock().unwrap() += 1;
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(events) => {
                for event in events {
                    sink.emit(event);
                }
                sink.emit(RecognitionEvent::Ended);
            }
            None => *self.open.lock().unwrap() = Some(sink),
        }
        Ok(())
    }

    fn stop(&mut self) {
        *self.stops.lock().unwrap() += 1;
        if let Some(sink) = self.open.lock().unwrap().take() {
            sink.emit(RecognitionEvent::Error(RecognitionError::Aborted));
            sink.emit(RecognitionEvent::Ended);
        }
    }
}

#[derive(Clone)]
enum Outcome {
    Reply(&'static str),
    Fail,
    Slow(Duration, &'static str),
}

impl Outcome {
    fn resolve(&self) -> BoxFuture<'static, Result<String, AiError>> {
        let outcome = self.clone();
        Box::pin(async move {
            match outcome {
                Outcome::Reply(text) => Ok(text.to_string()),
                Outcome::Fail => Err(AiError::Network("connection reset".to_string())),
                Outcome::Slow(delay, text) => {
                    tokio::time::sleep(delay).await;
                    Ok(text.to_string())
                }
            }
        })
    }
}

struct ScriptedAi {
    describe: Outcome,
    reply: Outcome,
    images: Mutex<Vec<&'static str>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedAi {
    fn new(describe: Outcome, reply: Outcome) -> Arc<Self> {
        Arc::new(Self {
            describe,
            reply,
            images: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

impl Collaborator for ScriptedAi {
    fn analyze_image(
        &self,
        _image: Vec<u8>,
        mime_type: &'static str,
    ) -> BoxFuture<'static, Result<String, AiError>> {
        self.images.lock().unwrap().push(mime_type);
        self.describe.resolve()
    }

    fn converse(
        &self,
        preamble: String,
        utterance: String,
    ) -> BoxFuture<'static, Result<String, AiError>> {
        self.prompts.lock().unwrap().push((preamble, utterance));
        self.reply.resolve()
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    feed: MemoryFeed,
    voice: Arc<RecordingVoice>,
    handle: SentryHandle,
    task: JoinHandle<TransparencyStats>,
}

struct Setup {
    ai: AiCapability,
    recognizer: Option<ScriptedRecognizer>,
    feed: MemoryFeed,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            ai: AiCapability::Absent("not configured".to_string()),
            recognizer: None,
            feed: MemoryFeed::new(),
        }
    }
}

impl Setup {
    fn ai(mut self, ai: Arc<ScriptedAi>) -> Self {
        self.ai = AiCapability::Available(ai);
        self
    }

    fn recognizer(mut self, recognizer: &ScriptedRecognizer) -> Self {
        self.recognizer = Some(recognizer.clone());
        self
    }

    fn start(self) -> Harness {
        let voice = Arc::new(RecordingVoice::default());
        let collaborators = Collaborators {
            camera: Box::new(MemoryCamera::new(self.feed.clone(), WIDTH, HEIGHT)),
            voice: voice.clone(),
            recognizer: self
                .recognizer
                .map(|r| Box::new(r) as Box<dyn Recognizer>),
            ai: self.ai,
        };
        let (sentry, handle) = Sentry::new(collaborators, &Config::default());
        Harness {
            feed: self.feed,
            voice,
            handle,
            task: tokio::spawn(sentry.run()),
        }
    }
}

impl Harness {
    /// Queue frames that confirm motion: a baseline plus three large changes.
    fn intruder(&self) {
        self.feed.extend([
            solid_frame(WIDTH, HEIGHT, [0, 0, 0]),
            solid_frame(WIDTH, HEIGHT, [255, 255, 255]),
            solid_frame(WIDTH, HEIGHT, [0, 0, 0]),
            solid_frame(WIDTH, HEIGHT, [255, 255, 255]),
        ]);
    }

    async fn wait_for(&self, what: &str, check: impl Fn(&SentrySnapshot) -> bool) -> SentrySnapshot {
        let mut rx = self.handle.subscribe();
        let waited = tokio::time::timeout(Duration::from_secs(120), async {
            loop {
                {
                    let current = rx.borrow_and_update();
                    if check(&*current) {
                        return (*current).clone();
                    }
                }
                rx.changed().await.expect("sentry stopped");
            }
        })
        .await;
        match waited {
            Ok(snapshot) => snapshot,
            Err(_) => panic!("timed out waiting for {what}; last: {:?}", self.handle.snapshot()),
        }
    }

    async fn wait_status(&self, status: Status) -> SentrySnapshot {
        self.wait_for(&format!("{status}"), |s| s.status == status).await
    }

    /// Drive one full cycle up to `identified`.
    async fn identify(&self) -> SentrySnapshot {
        self.intruder();
        self.wait_status(Status::Identified).await
    }

    async fn idle(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn stop(self) -> TransparencyStats {
        self.handle.shutdown();
        self.task.await.expect("sentry task panicked")
    }
}

// ---------------------------------------------------------------------------
// Motion detection
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_acquires_camera_and_samples_in_standby() {
    let harness = Setup::default().start();

    let snapshot = harness.wait_for("camera", |s| s.camera.sampling).await;
    assert_eq!(snapshot.status, Status::Standby);
    assert_eq!(snapshot.label, "EN ESPERA");
    assert!(snapshot.camera.held);
    assert!(!snapshot.motion_detected);
    assert!(snapshot.last_error.is_none());
    assert!(!snapshot.ai_available);
    assert!(!snapshot.voice_chat_available);
    assert_eq!(harness.feed.acquisitions(), 1);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_sensor_jitter_never_alerts() {
    let harness = Setup::default().start();
    for i in 0..30 {
        let level = if i % 2 == 0 { 100 } else { 105 };
        harness.feed.push(solid_frame(WIDTH, HEIGHT, [level, level, level]));
    }

    harness.idle(Duration::from_secs(5)).await;
    assert_eq!(harness.feed.queued(), 0);
    assert_eq!(harness.handle.snapshot().status, Status::Standby);
    assert_eq!(harness.voice.tones(), 0);

    let stats = harness.stop().await;
    assert_eq!(stats.frames_sampled, 30);
    assert_eq!(stats.motion_events, 0);
}

#[tokio::test(start_paused = true)]
async fn test_isolated_spike_is_debounced() {
    let harness = Setup::default().start();
    let dark = || solid_frame(WIDTH, HEIGHT, [10, 10, 10]);
    let bright = || solid_frame(WIDTH, HEIGHT, [250, 250, 250]);
    // Two changes, then stillness: the streak decays before reaching three.
    harness.feed.extend([dark(), bright(), dark(), dark(), dark(), dark()]);

    harness.idle(Duration::from_secs(5)).await;
    assert_eq!(harness.handle.snapshot().status, Status::Standby);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_motion_triggers_alert_and_challenge() {
    let harness = Setup::default().start();
    harness.intruder();

    let alerting = harness.wait_status(Status::Alerting).await;
    let entered = Instant::now();
    assert!(alerting.motion_detected);
    assert!(!alerting.camera.sampling);
    assert_eq!(alerting.label, "¡ALERTA!");
    assert_eq!(harness.voice.tones(), 1);
    assert!(!harness.voice.said(CHALLENGE_PHRASE));

    harness.wait_status(Status::Scanning).await;
    let elapsed = entered.elapsed();
    assert!(elapsed >= Duration::from_millis(2000), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(2100), "{elapsed:?}");
    assert_eq!(harness.voice.lines(), vec![CHALLENGE_PHRASE.to_string()]);

    harness.stop().await;
}

// ---------------------------------------------------------------------------
// Capture and verdict
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_cycle_without_ai_reaches_identified() {
    let harness = Setup::default().start();
    harness.intruder();

    let scanning = harness.wait_status(Status::Scanning).await;
    assert!(scanning.capture.is_none());

    let generating = harness.wait_status(Status::Generating).await;
    let entered = Instant::now();
    let capture = generating.capture.clone().expect("photo captured");
    assert_eq!((capture.width, capture.height), (WIDTH, HEIGHT));
    assert_eq!(capture.photo_mime_type, "image/jpeg");
    assert!(capture.description.is_none());
    assert!(capture.photo_bytes > 0);

    // The processed variant renders off the event loop and lands before the verdict.
    let rendered = harness
        .wait_for("processed image", |s| {
            s.capture.as_ref().is_some_and(|c| c.has_processed)
        })
        .await;
    assert_eq!(rendered.status, Status::Generating);

    let identified = harness.wait_status(Status::Identified).await;
    assert!(entered.elapsed() >= Duration::from_millis(3000));
    assert_eq!(identified.capture.map(|c| c.id), Some(capture.id));
    assert!(harness.voice.said(VERDICT_PHRASE));

    // No recognizer: nothing else is scheduled.
    assert_eq!(identified.pending_timers, 0);
    harness.idle(Duration::from_secs(10)).await;
    assert_eq!(harness.handle.snapshot().status, Status::Identified);

    let stats = harness.stop().await;
    assert_eq!(stats.motion_events, 1);
    assert_eq!(stats.photos_captured, 1);
    assert_eq!(stats.ai_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn test_processed_image_is_png() {
    let harness = Setup::default().start();
    harness.identify().await;

    let capture = harness.handle.snapshot().capture.expect("capture");
    let processed = capture.processed.expect("processed image");
    assert_eq!(processed.mime_type(), "image/png");
    assert_eq!((processed.width, processed.height), (WIDTH, HEIGHT));
    assert_eq!(capture.photo.mime_type(), "image/jpeg");

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_ai_description_is_attached() {
    let ai = ScriptedAi::new(Outcome::Reply("Holograma azul"), Outcome::Fail);
    let harness = Setup::default().ai(ai.clone()).start();

    let identified = harness.identify().await;
    let capture = identified.capture.expect("capture");
    assert_eq!(capture.description.as_deref(), Some("Holograma azul"));
    assert!(capture.has_processed);
    assert!(identified.ai_available);
    assert_eq!(*ai.images.lock().unwrap(), vec!["image/jpeg"]);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_ai_failure_does_not_block_verdict() {
    let ai = ScriptedAi::new(Outcome::Fail, Outcome::Fail);
    let harness = Setup::default().ai(ai).start();

    let identified = harness.identify().await;
    assert!(identified.capture.expect("capture").description.is_none());
    let error = identified.last_error.expect("error recorded");
    assert!(matches!(error, SentryError::AiCallFailed(_)));
    assert!(!error.is_blocking());

    let stats = harness.stop().await;
    assert_eq!(stats.ai_requests, 1);
    assert_eq!(stats.ai_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_late_description_is_discarded() {
    let ai = ScriptedAi::new(
        Outcome::Slow(Duration::from_secs(10), "Demasiado tarde"),
        Outcome::Fail,
    );
    let harness = Setup::default().ai(ai).start();

    harness.identify().await;
    harness.idle(Duration::from_secs(15)).await;

    let snapshot = harness.handle.snapshot();
    assert_eq!(snapshot.status, Status::Identified);
    assert!(snapshot.capture.expect("capture").description.is_none());
    assert!(snapshot.last_error.is_none());

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_description_after_reset_is_discarded() {
    let ai = ScriptedAi::new(
        Outcome::Slow(Duration::from_secs(1), "Ciclo anterior"),
        Outcome::Fail,
    );
    let harness = Setup::default().ai(ai).start();
    harness.intruder();

    harness.wait_status(Status::Generating).await;
    harness.handle.reset();
    let standby = harness.wait_status(Status::Standby).await;
    assert!(standby.capture.is_none());

    harness.idle(Duration::from_secs(5)).await;
    let snapshot = harness.handle.snapshot();
    assert_eq!(snapshot.status, Status::Standby);
    assert!(snapshot.capture.is_none());

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_processed_image_after_reset_is_discarded() {
    let harness = Setup::default().start();
    harness.intruder();

    let generating = harness.wait_status(Status::Generating).await;
    harness.handle.reset();
    let standby = harness
        .wait_for("next cycle", |s| s.cycle == generating.cycle + 1)
        .await;
    assert_eq!(standby.status, Status::Standby);

    harness.idle(Duration::from_secs(5)).await;
    let snapshot = harness.handle.snapshot();
    assert_eq!(snapshot.status, Status::Standby);
    assert!(snapshot.capture.is_none());

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_capture_failure_resets_with_camera_error() {
    let harness = Setup::default().start();
    harness.intruder();

    harness.wait_status(Status::Alerting).await;
    harness.feed.end("cable unplugged");

    let snapshot = harness
        .wait_for("camera error", |s| s.last_error.is_some())
        .await;
    assert_eq!(snapshot.status, Status::Standby);
    assert!(snapshot.capture.is_none());
    assert!(matches!(
        snapshot.last_error,
        Some(SentryError::CameraUnavailable(_))
    ));
    assert!(snapshot.last_error.as_ref().is_some_and(|e| e.is_blocking()));
    assert!(!harness.voice.said(VERDICT_PHRASE));

    let stats = harness.stop().await;
    assert_eq!(stats.photos_captured, 0);
}

// ---------------------------------------------------------------------------
// Reset
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_reset_clears_cycle() {
    let ai = ScriptedAi::new(Outcome::Reply("Holograma"), Outcome::Reply("Acceso denegado."));
    let recognizer = ScriptedRecognizer::with_sessions(vec![vec![RecognitionEvent::Utterance(
        "Hola".to_string(),
    )]]);
    let harness = Setup::default().ai(ai).recognizer(&recognizer).start();

    harness.identify().await;
    let chatting = harness
        .wait_for("reply", |s| s.conversation.len() == 2)
        .await;
    assert_eq!(chatting.status, Status::Chatting);
    let cycle = chatting.cycle;

    harness.handle.reset();
    let snapshot = harness
        .wait_for("reset", |s| s.status == Status::Standby && s.camera.sampling)
        .await;
    assert_eq!(snapshot.cycle, cycle + 1);
    assert!(snapshot.capture.is_none());
    assert!(snapshot.conversation.is_empty());
    assert!(!snapshot.motion_detected);
    assert!(!snapshot.listening);
    assert!(!snapshot.awaiting_reply);
    assert!(snapshot.last_error.is_none());
    assert_eq!(snapshot.pending_timers, 0);
    assert!(recognizer.stops() >= 1);

    // The held stream is reused.
    assert_eq!(harness.feed.acquisitions(), 1);

    let stats = harness.stop().await;
    assert_eq!(stats.resets, 1);
}

#[tokio::test(start_paused = true)]
async fn test_double_reset_acquires_once() {
    let harness = Setup::default().start();
    harness.intruder();
    harness.wait_status(Status::Scanning).await;

    harness.handle.reset();
    harness.handle.reset();
    harness.wait_for("standby", |s| s.status == Status::Standby && s.camera.sampling).await;
    harness.idle(Duration::from_secs(1)).await;

    let snapshot = harness.handle.snapshot();
    assert_eq!(snapshot.status, Status::Standby);
    assert_eq!(harness.feed.acquisitions(), 1);
    assert!(harness.feed.is_held());

    let stats = harness.stop().await;
    assert_eq!(stats.resets, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reset_cancels_pending_challenge() {
    let harness = Setup::default().start();
    harness.intruder();
    harness.wait_status(Status::Alerting).await;

    harness.handle.reset();
    harness.wait_status(Status::Standby).await;
    harness.idle(Duration::from_secs(10)).await;

    assert_eq!(harness.handle.snapshot().status, Status::Standby);
    assert!(!harness.voice.said(CHALLENGE_PHRASE));

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_new_cycle_after_reset() {
    let harness = Setup::default().start();
    harness.identify().await;

    harness.handle.reset();
    harness
        .wait_for("standby", |s| s.status == Status::Standby && s.camera.sampling)
        .await;

    // The first frame after re-arming is a fresh baseline.
    let second = harness.identify().await;
    assert_eq!(second.cycle, 2);
    assert!(second.capture.is_some());

    let stats = harness.stop().await;
    assert_eq!(stats.motion_events, 2);
    assert_eq!(stats.photos_captured, 2);
}

// ---------------------------------------------------------------------------
// Voice chat
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_chat_auto_starts_after_verdict() {
    let recognizer = ScriptedRecognizer::default();
    let harness = Setup::default().recognizer(&recognizer).start();

    let identified = harness.identify().await;
    let entered = Instant::now();
    assert!(identified.voice_chat_available);
    assert_eq!(identified.pending_timers, 1);

    let chatting = harness.wait_status(Status::Chatting).await;
    assert!(entered.elapsed() >= Duration::from_millis(2000));
    assert_eq!(chatting.label, "CHAT ACTIVO");
    assert!(chatting.listening);
    assert_eq!(recognizer.starts(), 1);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_chat_without_ai_apologizes() {
    let recognizer = ScriptedRecognizer::with_sessions(vec![vec![RecognitionEvent::Utterance(
        "¿Quién eres?".to_string(),
    )]]);
    let harness = Setup::default().recognizer(&recognizer).start();

    harness.identify().await;
    let snapshot = harness
        .wait_for("apology", |s| s.conversation.len() == 2)
        .await;

    let speakers: Vec<Speaker> = snapshot.conversation.iter().map(|e| e.speaker).collect();
    assert_eq!(speakers, vec![Speaker::User, Speaker::System]);
    assert_eq!(snapshot.conversation[0].text, "¿Quién eres?");
    assert_eq!(snapshot.conversation[1].text, UNAVAILABLE_APOLOGY);
    assert!(harness.voice.said(UNAVAILABLE_APOLOGY));
    assert!(!snapshot.awaiting_reply);

    // Listening restarts after the session ends.
    harness.idle(Duration::from_secs(1)).await;
    assert_eq!(recognizer.starts(), 2);
    assert!(harness.handle.snapshot().listening);

    let stats = harness.stop().await;
    assert_eq!(stats.utterances, 1);
}

#[tokio::test(start_paused = true)]
async fn test_chat_with_ai_replies_in_persona() {
    let ai = ScriptedAi::new(
        Outcome::Reply("Holograma"),
        Outcome::Reply("Acceso denegado. Permanezca en su posición."),
    );
    let recognizer = ScriptedRecognizer::with_sessions(vec![vec![RecognitionEvent::Utterance(
        "Déjame pasar".to_string(),
    )]]);
    let harness = Setup::default().ai(ai.clone()).recognizer(&recognizer).start();

    harness.identify().await;
    let snapshot = harness
        .wait_for("reply", |s| s.conversation.len() == 2)
        .await;

    assert_eq!(snapshot.conversation[1].speaker, Speaker::System);
    assert_eq!(
        snapshot.conversation[1].text,
        "Acceso denegado. Permanezca en su posición."
    );
    assert!(harness.voice.said("Acceso denegado. Permanezca en su posición."));

    let prompts = ai.prompts.lock().unwrap().clone();
    assert_eq!(
        prompts,
        vec![(PERSONA_PREAMBLE.to_string(), "Déjame pasar".to_string())]
    );

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_chat_failure_adds_error_entry() {
    let ai = ScriptedAi::new(Outcome::Reply("Holograma"), Outcome::Fail);
    let recognizer = ScriptedRecognizer::with_sessions(vec![vec![RecognitionEvent::Utterance(
        "Hola".to_string(),
    )]]);
    let harness = Setup::default().ai(ai).recognizer(&recognizer).start();

    harness.identify().await;
    let snapshot = harness
        .wait_for("error entry", |s| s.conversation.len() == 2)
        .await;

    assert_eq!(snapshot.conversation[1].speaker, Speaker::Error);
    assert_eq!(snapshot.conversation[1].text, CALL_FAILED_APOLOGY);
    assert!(matches!(snapshot.last_error, Some(SentryError::AiCallFailed(_))));
    assert_eq!(snapshot.status, Status::Chatting);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_late_chat_reply_is_discarded() {
    let ai = ScriptedAi::new(
        Outcome::Reply("Holograma"),
        Outcome::Slow(Duration::from_secs(5), "Respuesta tardía"),
    );
    let recognizer = ScriptedRecognizer::with_sessions(vec![vec![RecognitionEvent::Utterance(
        "Hola".to_string(),
    )]]);
    let harness = Setup::default().ai(ai).recognizer(&recognizer).start();

    harness.identify().await;
    let waiting = harness.wait_for("awaiting reply", |s| s.awaiting_reply).await;
    assert_eq!(waiting.conversation.len(), 1);

    harness.handle.stop_chat();
    let identified = harness.wait_status(Status::Identified).await;
    assert!(!identified.awaiting_reply);
    assert!(!identified.listening);

    harness.idle(Duration::from_secs(10)).await;
    let snapshot = harness.handle.snapshot();
    assert_eq!(snapshot.conversation.len(), 1);
    assert!(!harness.voice.said("Respuesta tardía"));

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_chat_does_not_restart_automatically() {
    let recognizer = ScriptedRecognizer::default();
    let harness = Setup::default().recognizer(&recognizer).start();

    harness.identify().await;
    harness.wait_status(Status::Chatting).await;

    harness.handle.stop_chat();
    let identified = harness.wait_status(Status::Identified).await;
    assert_eq!(identified.pending_timers, 0);
    assert!(recognizer.stops() >= 1);

    // The aborted session's `Aborted` and `Ended` are dropped, not acted on.
    harness.idle(Duration::from_secs(10)).await;
    let idle = harness.handle.snapshot();
    assert_eq!(idle.status, Status::Identified);
    assert!(!idle.listening);
    assert!(idle.last_error.is_none());
    assert_eq!(idle.pending_timers, 0);
    assert_eq!(recognizer.starts(), 1);

    // Chat can still be started on request.
    harness.handle.start_chat();
    harness.wait_status(Status::Chatting).await;
    assert_eq!(recognizer.starts(), 2);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_recognition_error_retries_with_backoff() {
    let recognizer = ScriptedRecognizer::with_sessions(vec![
        vec![RecognitionEvent::Error(RecognitionError::NoSpeech)],
        vec![RecognitionEvent::Utterance("Hola".to_string())],
    ]);
    let harness = Setup::default().recognizer(&recognizer).start();

    harness.identify().await;
    let snapshot = harness
        .wait_for("utterance", |s| s.conversation.len() == 2)
        .await;
    assert_eq!(snapshot.conversation[0].text, "Hola");
    // Ordinary recognition errors are not surfaced.
    assert!(snapshot.last_error.is_none());
    assert!(recognizer.starts() >= 2);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_recognizer_disables_voice_chat() {
    let recognizer = ScriptedRecognizer::default();
    *recognizer.refuse.lock().unwrap() = Some(RecognitionError::Unavailable("mic gone".to_string()));
    let harness = Setup::default().recognizer(&recognizer).start();

    harness.identify().await;
    let snapshot = harness
        .wait_for("chat disabled", |s| !s.voice_chat_available)
        .await;
    assert!(!snapshot.listening);
    assert!(matches!(
        snapshot.last_error,
        Some(SentryError::SpeechRecognition(_))
    ));

    harness.handle.stop_chat();
    harness.wait_status(Status::Identified).await;
    harness.handle.start_chat();
    harness.idle(Duration::from_secs(1)).await;
    assert_eq!(harness.handle.snapshot().status, Status::Identified);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_chat_ignored_outside_identified() {
    let recognizer = ScriptedRecognizer::default();
    let harness = Setup::default().recognizer(&recognizer).start();
    harness.wait_for("camera", |s| s.camera.sampling).await;

    harness.handle.start_chat();
    harness.handle.stop_chat();
    harness.idle(Duration::from_secs(1)).await;

    assert_eq!(harness.handle.snapshot().status, Status::Standby);
    assert_eq!(recognizer.starts(), 0);

    harness.stop().await;
}

// ---------------------------------------------------------------------------
// Camera and capability errors
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_denied_camera_then_retry() {
    let feed = MemoryFeed::new();
    feed.deny("permission denied by user");
    let harness = Setup {
        feed,
        ..Setup::default()
    }
    .start();

    let snapshot = harness.wait_for("camera error", |s| s.last_error.is_some()).await;
    let error = snapshot.last_error.expect("error");
    assert!(matches!(error, SentryError::CameraUnavailable(_)));
    assert!(error.is_blocking());
    assert!(!snapshot.camera.held);

    harness.feed.allow();
    harness.handle.retry_camera();
    let snapshot = harness.wait_for("camera", |s| s.camera.sampling).await;
    assert!(snapshot.last_error.is_none());
    assert_eq!(harness.feed.acquisitions(), 1);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_ai_capability_is_reported() {
    let harness = Setup {
        ai: AiCapability::Failed("invalid client configuration".to_string()),
        ..Setup::default()
    }
    .start();

    let snapshot = harness.handle.snapshot();
    assert!(!snapshot.ai_available);
    assert!(matches!(
        snapshot.last_error,
        Some(SentryError::AiCapabilityAbsent(_))
    ));

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_camera() {
    let harness = Setup::default().start();
    harness.wait_for("camera", |s| s.camera.held).await;
    assert!(harness.feed.is_held());

    let feed = harness.feed.clone();
    let stats = harness.stop().await;
    assert!(!feed.is_held());
    assert_eq!(feed.releases(), 1);
    assert_eq!(stats.motion_events, 0);
}
