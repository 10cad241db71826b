//! Retransmission timer scheduling.
//!
//! One [`TimerScheduler`] serves many concurrently pending timeouts (one per
//! in-flight packet).  Internally it keeps a min-heap of `(deadline, id)`
//! pairs behind a mutex, and a dedicated background worker that sleeps until
//! the nearest deadline, invokes due callbacks, and otherwise parks on a
//! [`Notify`] that is signalled whenever a timer is armed or cancelled.
//!
//! Callbacks run **on the worker's context, never the caller's**, and each
//! executes at most once.  Periodic retransmission is built by having the
//! callback re-schedule itself on completion, so every firing is a fresh,
//! independently cancellable timer.
//!
//! # Cancellation race
//!
//! `cancel` only removes the callback from the pending map.  If the worker
//! already popped the entry and is mid-invocation, the callback completes
//! once; for retransmission that means at most one stray duplicate packet,
//! which the receiver treats as any other duplicate.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

/// Opaque handle identifying one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Error returned by [`TimerScheduler::schedule`] after [`TimerScheduler::stop`].
///
/// Correct shutdown ordering (cancel session timers, stop the scheduler,
/// release the socket) never produces this.
#[derive(Debug, PartialEq, Eq)]
pub struct SchedulerStopped;

impl std::fmt::Display for SchedulerStopped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer scheduler has been stopped")
    }
}

impl std::error::Error for SchedulerStopped {}

type Callback = Box<dyn FnOnce() + Send + 'static>;

struct Inner {
    /// Min-heap of pending deadlines (`Reverse` flips `BinaryHeap`'s order).
    heap: BinaryHeap<Reverse<(Instant, TimerId)>>,
    /// Callbacks for timers that are still live; `cancel` removes from here,
    /// leaving a stale heap entry the worker skips.
    callbacks: HashMap<TimerId, Callback>,
    stopped: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    /// Signalled whenever a timer is armed or cancelled, or on stop.
    notify: Notify,
    next_id: AtomicU64,
}

/// A shared facility for many concurrently pending timeouts.
///
/// Explicitly owned and passed around as `Arc<TimerScheduler>`; there is no
/// process-wide instance, which keeps lifecycle and shutdown ordering in the
/// hands of whoever created it.
pub struct TimerScheduler {
    shared: Arc<Shared>,
}

impl TimerScheduler {
    /// Create a scheduler and spawn its background worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Arc<Self> {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                callbacks: HashMap::new(),
                stopped: false,
            }),
            notify: Notify::new(),
            next_id: AtomicU64::new(0),
        });
        tokio::spawn(worker(Arc::clone(&shared)));
        Arc::new(Self { shared })
    }

    /// Arm a one-shot timer.
    ///
    /// `callback` executes exactly once, after at least `delay`, on the
    /// scheduler's worker — never on the caller's stack.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> Result<TimerId, SchedulerStopped>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.stopped {
            return Err(SchedulerStopped);
        }
        let id = TimerId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        inner.heap.push(Reverse((Instant::now() + delay, id)));
        inner.callbacks.insert(id, Box::new(callback));
        drop(inner);
        self.shared.notify.notify_one();
        Ok(id)
    }

    /// Best-effort cancellation.
    ///
    /// A no-op when the timer already fired or was already cancelled.
    pub fn cancel(&self, id: TimerId) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.callbacks.remove(&id);
        drop(inner);
        self.shared.notify.notify_one();
    }

    /// Drop all pending timers and stop the worker.
    ///
    /// Subsequent [`schedule`](Self::schedule) calls fail with
    /// [`SchedulerStopped`].
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.stopped = true;
        inner.heap.clear();
        inner.callbacks.clear();
        drop(inner);
        self.shared.notify.notify_one();
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        // Unblocks the worker task so it does not outlive the scheduler.
        self.stop();
    }
}

/// Background worker: pop due timers, run their callbacks outside the lock,
/// then sleep until the nearest deadline or the next wakeup signal.
async fn worker(shared: Arc<Shared>) {
    loop {
        let (due, next_deadline) = {
            let mut inner = shared.inner.lock().unwrap();
            if inner.stopped {
                return;
            }
            let now = Instant::now();
            let mut due: Vec<Callback> = Vec::new();
            while let Some(&Reverse((deadline, id))) = inner.heap.peek() {
                if deadline > now {
                    break;
                }
                inner.heap.pop();
                // Cancelled timers leave a stale heap entry with no callback.
                if let Some(cb) = inner.callbacks.remove(&id) {
                    due.push(cb);
                }
            }
            let next = inner.heap.peek().map(|&Reverse((deadline, _))| deadline);
            (due, next)
        };

        for cb in due {
            cb();
        }

        match next_deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    _ = shared.notify.notified() => {}
                }
            }
            None => shared.notify.notified().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
