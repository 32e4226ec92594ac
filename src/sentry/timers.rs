//! Self-scheduled narrative timers.
//!
//! At most one timer is pending per [`Phase`]. Scheduling a phase cancels the
//! earlier timer for it. A fired timer only counts if its id is still the one
//! registered for its phase, so an event that was already queued when the
//! timer got cancelled is ignored.

use crate::sentry::event::SentryEvent;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Deferred transition points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Alert tone to challenge phrase
    Challenge,
    /// Scanning to photo capture
    Capture,
    /// Generating to identified
    Verdict,
    /// Identified to chatting
    ChatAutoStart,
    /// Restart recognition while chatting
    ListenRestart,
}

struct PendingTimer {
    id: u64,
    handle: JoinHandle<()>,
}

pub struct TimerTable {
    tx: UnboundedSender<SentryEvent>,
    pending: HashMap<Phase, PendingTimer>,
    next_id: u64,
}

impl TimerTable {
    pub fn new(tx: UnboundedSender<SentryEvent>) -> Self {
        Self {
            tx,
            pending: HashMap::new(),
            next_id: 1,
        }
    }

    /// Fire `phase` after `delay`, replacing any pending timer for it.
    pub fn schedule(&mut self, phase: Phase, delay: Duration) -> u64 {
        self.cancel(phase);

        let id = self.next_id;
        self.next_id += 1;

        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SentryEvent::TimerFired { phase, id });
        });

        tracing::debug!(?phase, id, delay_ms = delay.as_millis() as u64, "Timer scheduled");
        self.pending.insert(phase, PendingTimer { id, handle });
        id
    }

    /// Accept a fired timer. Returns `false` for a cancelled or superseded one.
    pub fn fire(&mut self, phase: Phase, id: u64) -> bool {
        match self.pending.get(&phase) {
            Some(timer) if timer.id == id => {
                self.pending.remove(&phase);
                true
            }
            _ => {
                tracing::debug!(?phase, id, "Ignoring stale timer");
                false
            }
        }
    }

    /// Cancel the pending timer for `phase`, if any.
    pub fn cancel(&mut self, phase: Phase) -> bool {
        match self.pending.remove(&phase) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer. Returns how many were pending.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        for (_, timer) in self.pending.drain() {
            timer.handle.abort();
        }
        count
    }

    pub fn is_pending(&self, phase: Phase) -> bool {
        self.pending.contains_key(&phase)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for TimerTable {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn fired(event: SentryEvent) -> (Phase, u64) {
        match event {
            SentryEvent::TimerFired { phase, id } => (phase, id),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (tx, mut rx) = unbounded_channel();
        let mut timers = TimerTable::new(tx);

        let id = timers.schedule(Phase::Verdict, Duration::from_millis(3000));
        assert!(timers.is_pending(Phase::Verdict));

        let start = tokio::time::Instant::now();
        let (phase, got) = fired(rx.recv().await.unwrap());
        assert_eq!((phase, got), (Phase::Verdict, id));
        assert!(start.elapsed() >= Duration::from_millis(3000));

        assert!(timers.fire(phase, got));
        assert!(!timers.fire(phase, got));
        assert_eq!(timers.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_replaces_earlier_timer() {
        let (tx, mut rx) = unbounded_channel();
        let mut timers = TimerTable::new(tx);

        let first = timers.schedule(Phase::ListenRestart, Duration::from_millis(100));
        let second = timers.schedule(Phase::ListenRestart, Duration::from_millis(500));
        assert_eq!(timers.pending_count(), 1);

        let (phase, id) = fired(rx.recv().await.unwrap());
        assert_eq!(id, second);
        assert!(timers.fire(phase, id));
        assert!(!timers.fire(Phase::ListenRestart, first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_silences_timers() {
        let (tx, mut rx) = unbounded_channel();
        let mut timers = TimerTable::new(tx);

        timers.schedule(Phase::Challenge, Duration::from_millis(10));
        timers.schedule(Phase::Capture, Duration::from_millis(20));
        assert_eq!(timers.cancel_all(), 2);
        assert_eq!(timers.pending_count(), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_event_rejected_after_cancel() {
        let (tx, mut rx) = unbounded_channel();
        let mut timers = TimerTable::new(tx);

        timers.schedule(Phase::Capture, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(20)).await;
        // The event is already queued; cancelling must still neutralize it.
        timers.cancel_all();

        let (phase, id) = fired(rx.recv().await.unwrap());
        assert!(!timers.fire(phase, id));
    }
}
