//! Background batching of indexer change events.
//!
//! One worker thread drains a blocking queue, merges bursts of events into a
//! [`ChangeAccumulator`], backs off while the user interacts with the tree,
//! and hands each finished batch to a [`ChangeSink`].
//!
//! ```text
//!   Idle ──event──▶ Draining ──queue empty, batch small──▶ BatchWindow
//!    ▲                 │  ▲                                    │
//!    │                 │  └───────────── window over ──────────┘
//!    │                 ▼
//!    └──────────── Applying
//! ```
//!
//! The first window is always waited out. Further windows follow only
//! while the last one merged new events, up to `max_wait_rounds`, so a
//! lone event is applied after `minimal_delay + batch_mode_delay`.
//!
//! Stopping cancels a token and closes a dedicated stop channel; every
//! blocking receive and every pause selects on that channel, so the thread
//! exits promptly. A batch already being applied is never interrupted.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, select, unbounded};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::BatchingConfig;
use crate::error::{ClassViewError, ClassViewResult};
use crate::events::{ChangeAccumulator, ChangeEvent};
use crate::symbols::SymbolIndex;

/// Consumer of finished batches.
pub trait ChangeSink: Send + Sync {
    fn apply(&self, batch: ChangeAccumulator) -> ClassViewResult<()>;

    /// True while the user is interacting with the tree; batches are held
    /// back meanwhile.
    fn is_user_active(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Blocked waiting for the first event of a batch.
    Idle = 0,
    /// Merging queued events.
    Draining = 1,
    /// Pausing to let a burst finish.
    BatchWindow = 2,
    /// Handing a batch to the sink.
    Applying = 3,
    Stopped = 4,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Draining,
            2 => Self::BatchWindow,
            3 => Self::Applying,
            _ => Self::Stopped,
        }
    }
}

/// Timing policy of the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPolicy {
    pub minimal_delay: Duration,
    pub batch_mode_delay: Duration,
    pub max_batch_size: usize,
    pub max_wait_rounds: u32,
    pub user_activity_backoff: Duration,
}

impl From<&BatchingConfig> for BatchPolicy {
    fn from(config: &BatchingConfig) -> Self {
        Self {
            minimal_delay: config.minimal_delay(),
            batch_mode_delay: config.batch_mode_delay(),
            max_batch_size: config.max_batch_size,
            max_wait_rounds: config.max_batch_wait_rounds,
            user_activity_backoff: config.user_activity_backoff(),
        }
    }
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self::from(&BatchingConfig::default())
    }
}

/// Producer handle of the worker's queue.
#[derive(Clone)]
pub struct UpdateQueue {
    tx: Sender<ChangeEvent>,
    token: CancellationToken,
}

impl UpdateQueue {
    pub fn push(&self, event: ChangeEvent) -> ClassViewResult<()> {
        if self.token.is_cancelled() {
            return Err(ClassViewError::ChannelClosed);
        }
        self.tx
            .send(event)
            .map_err(|_| ClassViewError::ChannelClosed)
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// Handle of the background worker. Dropping it stops the thread.
pub struct BatchingWorker {
    queue: UpdateQueue,
    state: Arc<AtomicU8>,
    applied: Arc<AtomicU64>,
    token: CancellationToken,
    stop_tx: Mutex<Option<Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BatchingWorker {
    pub fn spawn(
        index: Arc<dyn SymbolIndex>,
        sink: Arc<dyn ChangeSink>,
        policy: BatchPolicy,
    ) -> ClassViewResult<Self> {
        let (tx, rx) = unbounded();
        let (stop_tx, stop_rx) = unbounded::<()>();
        let token = CancellationToken::new();
        let state = Arc::new(AtomicU8::new(WorkerState::Idle as u8));
        let applied = Arc::new(AtomicU64::new(0));

        let worker = WorkerLoop {
            rx,
            stop_rx,
            token: token.clone(),
            index,
            sink,
            policy,
            state: Arc::clone(&state),
            applied: Arc::clone(&applied),
            pending: None,
        };
        let handle = thread::Builder::new()
            .name("classview-worker".to_string())
            .spawn(move || worker.run())?;

        crate::debug_event!("worker", "started");
        Ok(Self {
            queue: UpdateQueue {
                tx,
                token: token.clone(),
            },
            state,
            applied,
            token,
            stop_tx: Mutex::new(Some(stop_tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Cloneable producer handle.
    pub fn queue(&self) -> UpdateQueue {
        self.queue.clone()
    }

    pub fn enqueue(&self, event: ChangeEvent) -> ClassViewResult<()> {
        self.queue.push(event)
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of batches the sink accepted.
    pub fn batches_applied(&self) -> u64 {
        self.applied.load(Ordering::Acquire)
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// Safe to call repeatedly, and from the worker thread itself (in which
    /// case it does not wait).
    pub fn set_stop(&self) {
        self.token.cancel();
        self.stop_tx.lock().take();

        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            crate::error_event!("worker", "thread terminated abnormally");
        }
        crate::debug_event!("worker", "stopped");
    }
}

impl Drop for BatchingWorker {
    fn drop(&mut self) {
        self.set_stop();
    }
}

struct WorkerLoop {
    rx: Receiver<ChangeEvent>,
    stop_rx: Receiver<()>,
    token: CancellationToken,
    index: Arc<dyn SymbolIndex>,
    sink: Arc<dyn ChangeSink>,
    policy: BatchPolicy,
    state: Arc<AtomicU8>,
    applied: Arc<AtomicU64>,
    /// Event refused by the previous batch; seeds the next one.
    pending: Option<ChangeEvent>,
}

impl WorkerLoop {
    fn run(mut self) {
        while !self.token.is_cancelled() {
            let first = match self.pending.take() {
                Some(event) => event,
                None => {
                    self.set_state(WorkerState::Idle);
                    match self.wait_first() {
                        Some(event) => event,
                        None => break,
                    }
                }
            };

            self.set_state(WorkerState::Draining);
            let mut compose = ChangeAccumulator::new(&first, &*self.index);
            if self.rx.is_empty() && !self.pause(self.policy.minimal_delay) {
                break;
            }
            if !self.collect(&mut compose) {
                break;
            }

            self.set_state(WorkerState::Applying);
            self.apply(compose);
        }
        self.set_state(WorkerState::Stopped);
        crate::debug_event!("worker", "exiting");
    }

    /// Grow the batch until draining stalls and the user is idle.
    ///
    /// The first window is always taken; after that a window is only
    /// extended while the previous one merged something.
    ///
    /// Returns false if stopped meanwhile.
    fn collect(&mut self, compose: &mut ChangeAccumulator) -> bool {
        let mut rounds = 0;
        loop {
            self.set_state(WorkerState::Draining);
            let before = compose.count();
            let refused = self.drain(compose);
            let grew = compose.count() > before;

            if !refused
                && self.rx.is_empty()
                && compose.count() < self.policy.max_batch_size
                && rounds < self.policy.max_wait_rounds
                && (rounds == 0 || grew)
            {
                rounds += 1;
                self.set_state(WorkerState::BatchWindow);
                if !self.pause(self.policy.batch_mode_delay) {
                    return false;
                }
                continue;
            }

            if self.sink.is_user_active() {
                crate::debug_event!("worker", "backoff", "user is active");
                if !self.pause(self.policy.user_activity_backoff) {
                    return false;
                }
                continue;
            }
            return true;
        }
    }

    /// Merge queued events. Returns true once a merge was refused; the
    /// refused event is kept for the next batch.
    fn drain(&mut self, compose: &mut ChangeAccumulator) -> bool {
        if self.pending.is_some() {
            return true;
        }
        while let Ok(event) = self.rx.try_recv() {
            if !compose.add_change_event(&event, &*self.index) {
                self.pending = Some(event);
                return true;
            }
        }
        false
    }

    fn wait_first(&self) -> Option<ChangeEvent> {
        select! {
            recv(self.rx) -> event => event.ok(),
            recv(self.stop_rx) -> _ => None,
        }
    }

    /// Sleep unless stopped. Returns false if stopped.
    fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.token.is_cancelled();
        }
        select! {
            recv(self.stop_rx) -> _ => false,
            default(delay) => !self.token.is_cancelled(),
        }
    }

    fn apply(&self, compose: ChangeAccumulator) {
        let count = compose.count();
        let sink = Arc::clone(&self.sink);
        match panic::catch_unwind(AssertUnwindSafe(move || sink.apply(compose))) {
            Ok(Ok(())) => {
                self.applied.fetch_add(1, Ordering::AcqRel);
                crate::debug_event!("worker", "applied", "{count} events");
            }
            Ok(Err(e)) => {
                crate::error_event!("worker", "batch failed", "{count} events: {e}");
            }
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                crate::error_event!("worker", "batch panicked", "{count} events: {reason}");
            }
        }
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}
