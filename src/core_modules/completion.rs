// THEORY:
// The `CompletionTracker` is how the main control flow knows the run is over. The
// producer counts every work item in *before* handing it to the queue, and the sink
// counts every terminal outcome (row written or failure reported) back out. The
// producer also *seals* the tracker once input is exhausted.
//
// `wait` resolves only when the tracker is sealed and nothing is outstanding. Without
// the seal, a fast sink could drain the counter to zero while the producer is still
// reading, and the process would exit with work unsubmitted.
//
// The tracker is a cheap handle (`Clone`) over shared atomics and a `Notify`. Counter
// updates are lock free; waiters are woken whenever a transition could have made the
// run complete.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct TrackerState {
    submitted: AtomicU64,
    completed: AtomicU64,
    sealed: AtomicBool,
    notify: Notify,
}

/// Counted-completion primitive shared by the producer, the sink and the waiter.
#[derive(Debug, Clone, Default)]
pub struct CompletionTracker {
    state: Arc<TrackerState>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one work item. Must happen before the item can possibly complete.
    pub fn submit(&self) {
        self.state.submitted.fetch_add(1, Ordering::AcqRel);
    }

    /// Records one terminal outcome.
    pub fn complete(&self) {
        let completed = self.state.completed.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert!(completed <= self.state.submitted.load(Ordering::Acquire));
        self.wake_if_done();
    }

    /// Declares that no further items will be submitted.
    pub fn seal(&self) {
        self.state.sealed.store(true, Ordering::Release);
        self.wake_if_done();
    }

    pub fn is_sealed(&self) -> bool {
        self.state.sealed.load(Ordering::Acquire)
    }

    pub fn submitted(&self) -> u64 {
        self.state.submitted.load(Ordering::Acquire)
    }

    pub fn completed(&self) -> u64 {
        self.state.completed.load(Ordering::Acquire)
    }

    /// Items submitted but not yet in a terminal state.
    pub fn outstanding(&self) -> u64 {
        let completed = self.completed();
        self.submitted().saturating_sub(completed)
    }

    pub fn is_done(&self) -> bool {
        self.is_sealed() && self.outstanding() == 0
    }

    /// Resolves once the tracker is sealed and every submitted item has completed.
    pub async fn wait(&self) {
        loop {
            // Register before checking so a wake between the check and the await is kept.
            let notified = self.state.notify.notified();
            if self.is_done() {
                return;
            }
            notified.await;
        }
    }

    fn wake_if_done(&self) {
        if self.is_done() {
            self.state.notify.notify_waiters();
        }
    }
}
