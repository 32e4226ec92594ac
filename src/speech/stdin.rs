//! Line-based recognizer: every line typed while listening is one utterance.

use crate::speech::{RecognitionError, RecognitionEvent, RecognitionSink, Recognizer};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Recognizer fed by a line reader (stdin by default).
///
/// Lines arriving while no session is open are discarded, the way a
/// microphone hears nothing while recognition is off. An empty line counts as
/// "no speech". When the input closes, the open session fails with
/// [`RecognitionError::Unavailable`] and later starts are refused. Stopping
/// an open session reports [`RecognitionError::Aborted`].
pub struct StdinRecognizer {
    lines: Arc<Mutex<UnboundedReceiver<String>>>,
    listening: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    session: Option<(JoinHandle<()>, RecognitionSink)>,
}

impl StdinRecognizer {
    /// Read utterances from the process's standard input.
    pub fn stdin() -> Self {
        Self::from_reader(std::io::BufReader::new(std::io::stdin()))
    }

    /// Read utterances from any line source.
    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = unbounded_channel();
        let listening = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));

        let thread_listening = listening.clone();
        let thread_closed = closed.clone();
        std::thread::spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if !thread_listening.load(Ordering::SeqCst) {
                    tracing::debug!("Ignoring input while not listening");
                    continue;
                }
                if tx.send(line.trim().to_string()).is_err() {
                    return;
                }
            }
            thread_closed.store(true, Ordering::SeqCst);
            // Dropping `tx` wakes a waiting session.
        });

        Self {
            lines: Arc::new(Mutex::new(rx)),
            listening,
            closed,
            session: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Recognizer for StdinRecognizer {
    fn start(&mut self, sink: RecognitionSink) -> Result<(), RecognitionError> {
        if self.is_closed() {
            return Err(RecognitionError::Unavailable("input closed".to_string()));
        }
        self.stop();

        let lines = self.lines.clone();
        let listening = self.listening.clone();
        listening.store(true, Ordering::SeqCst);

        let task_sink = sink.clone();
        let task = tokio::spawn(async move {
            let next = lines.lock().await.recv().await;
            listening.store(false, Ordering::SeqCst);

            let event = match next {
                Some(line) if line.is_empty() => RecognitionEvent::Error(RecognitionError::NoSpeech),
                Some(line) => RecognitionEvent::Utterance(line),
                None => RecognitionEvent::Error(RecognitionError::Unavailable(
                    "input closed".to_string(),
                )),
            };
            task_sink.emit(event);
            task_sink.emit(RecognitionEvent::Ended);
        });
        self.session = Some((task, sink));
        Ok(())
    }

    fn stop(&mut self) {
        self.listening.store(false, Ordering::SeqCst);
        if let Some((task, sink)) = self.session.take() {
            if !task.is_finished() {
                task.abort();
                sink.emit(RecognitionEvent::Error(RecognitionError::Aborted));
                sink.emit(RecognitionEvent::Ended);
            }
        }
    }
}

impl Drop for StdinRecognizer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    async fn next_event(
        rx: &mut UnboundedReceiver<(u64, RecognitionEvent)>,
    ) -> (u64, RecognitionEvent) {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_closed_input_fails_session_then_refuses() {
        let mut recognizer = StdinRecognizer::from_reader(Cursor::new(Vec::<u8>::new()));
        let (tx, mut rx) = unbounded_channel();

        // The reader may already have hit EOF; either path ends unavailable.
        match recognizer.start(RecognitionSink::new(1, tx)) {
            Ok(()) => {
                let (session, event) = next_event(&mut rx).await;
                assert_eq!(session, 1);
                assert!(matches!(
                    event,
                    RecognitionEvent::Error(RecognitionError::Unavailable(_))
                ));
                assert_eq!(next_event(&mut rx).await.1, RecognitionEvent::Ended);
            }
            Err(e) => assert!(matches!(e, RecognitionError::Unavailable(_))),
        }

        for _ in 0..100 {
            if recognizer.is_closed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let (tx, _rx) = unbounded_channel();
        assert!(recognizer.start(RecognitionSink::new(2, tx)).is_err());
    }

    #[tokio::test]
    async fn test_stop_aborts_session() {
        // A reader that never yields keeps the session waiting.
        let (_keep, reader) = blocking_reader();
        let mut recognizer = StdinRecognizer::from_reader(reader);
        let (tx, mut rx) = unbounded_channel();

        recognizer.start(RecognitionSink::new(3, tx)).unwrap();
        recognizer.stop();
        assert_eq!(
            next_event(&mut rx).await,
            (3, RecognitionEvent::Error(RecognitionError::Aborted))
        );
        assert_eq!(next_event(&mut rx).await, (3, RecognitionEvent::Ended));

        // Stopping again is a no-op.
        recognizer.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    /// A reader whose `read` blocks until the returned sender is dropped.
    fn blocking_reader() -> (std::sync::mpsc::Sender<()>, std::io::BufReader<Gate>) {
        let (tx, rx) = std::sync::mpsc::channel();
        (tx, std::io::BufReader::new(Gate(rx)))
    }

    struct Gate(std::sync::mpsc::Receiver<()>);

    impl std::io::Read for Gate {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }
}
