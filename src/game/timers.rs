use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// The three deadline-driven transitions a room can have pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    WritingDeadline,
    QuestionDeadline,
    AutoAdvance,
}

/// Scheduled per-room deadline tasks.
///
/// At most one task per (room, kind): scheduling replaces and aborts any
/// pending one, and `cancel` aborts explicitly. Aborting is only half the
/// race guard; a task that already woke up may still run its callback, so
/// every callback re-validates room state (phase, question index,
/// `showing_results`) under the room lock before applying its effect.
#[derive(Debug, Default)]
pub struct TimerRegistry {
    tasks: Mutex<HashMap<(String, TimerKind), JoinHandle<()>>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `callback` after `delay`, replacing any pending timer of the
    /// same kind for the room.
    pub fn schedule<F>(&self, room_code: &str, kind: TimerKind, delay: Duration, callback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(room_code = %room_code, ?kind, delay_secs = delay.as_secs_f64(), "Scheduling timer");
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback.await;
        });

        let mut tasks = self.tasks.lock().unwrap();
        if let Some(previous) = tasks.insert((room_code.to_string(), kind), handle) {
            previous.abort();
        }
    }

    /// Aborts a pending timer, if any. Safe to call repeatedly.
    pub fn cancel(&self, room_code: &str, kind: TimerKind) {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(handle) = tasks.remove(&(room_code.to_string(), kind)) {
            debug!(room_code = %room_code, ?kind, "Canceling timer");
            handle.abort();
        }
    }

    /// Aborts every pending timer for a room (room deletion, quiz end).
    pub fn cancel_all_for_room(&self, room_code: &str) {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.retain(|(code, kind), handle| {
            if code == room_code {
                debug!(room_code = %room_code, ?kind, "Canceling timer");
                handle.abort();
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_callback_fires_after_delay() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_clone = Arc::clone(&fired);
        registry.schedule("1234", TimerKind::WritingDeadline, Duration::from_secs(10), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_clone = Arc::clone(&fired);
        registry.schedule("1234", TimerKind::AutoAdvance, Duration::from_secs(5), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        registry.cancel("1234", TimerKind::AutoAdvance);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_pending_timer() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let fired_clone = Arc::clone(&fired);
            registry.schedule(
                "1234",
                TimerKind::QuestionDeadline,
                Duration::from_secs(5),
                async move {
                    fired_clone.fetch_add(1, Ordering::SeqCst);
                },
            );
        }

        tokio::time::sleep(Duration::from_secs(10)).await;
        // Only the last scheduled task survives
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_for_room_leaves_other_rooms() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for code in ["1111", "2222"] {
            let fired_clone = Arc::clone(&fired);
            registry.schedule(code, TimerKind::QuestionDeadline, Duration::from_secs(5), async move {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            });
        }
        registry.cancel_all_for_room("1111");

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
