//! Bounded-concurrency worker pool.
//!
//! A pool runs a caller-supplied async unit of work over items submitted to
//! a bounded input queue, emitting successes and failures on separate
//! channels. Completion order is not guaranteed; the `index` carried through
//! [`WorkItem`]/[`WorkOutput`] is the only correlation between submissions
//! and results. Submission applies backpressure when the queue is full, which
//! naturally throttles producers to the rate the workers drain.
//!
//! With `min_workers < max_workers` the pool is elastic: a controller task
//! spawns an extra worker whenever the input queue has been saturated, and
//! workers above the floor exit after an idle timeout. `current_workers`
//! always reads the live count.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

use crate::error::EngineError;
use kvbulk_config::constants::POOL_QUEUE_FACTOR;

/// How often the elastic controller re-evaluates the queue.
const SCALE_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// How long an elastic worker above the floor waits for work before exiting.
const WORKER_IDLE_TIMEOUT: Duration = Duration::from_millis(500);

/// One unit of work submitted to a pool.
#[derive(Debug, Clone)]
pub struct WorkItem<T> {
    pub index: usize,
    pub payload: T,
}

/// A successful unit of work.
#[derive(Debug, Clone)]
pub struct WorkOutput<R> {
    pub index: usize,
    pub value: R,
}

/// A failed unit of work. The pool keeps running; the caller decides
/// whether to cancel.
#[derive(Debug)]
pub struct WorkFailure {
    pub index: usize,
    pub error: EngineError,
}

/// Worker count bounds for a pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolBounds {
    pub min_workers: usize,
    pub max_workers: usize,
}

impl PoolBounds {
    /// A fixed-size pool.
    pub fn fixed(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            min_workers: workers,
            max_workers: workers,
        }
    }

    /// An elastic pool scaling between `min` and `max` workers.
    pub fn elastic(min: usize, max: usize) -> Self {
        let min = min.max(1);
        Self {
            min_workers: min,
            max_workers: max.max(min),
        }
    }

    fn is_elastic(&self) -> bool {
        self.max_workers > self.min_workers
    }
}

/// Everything a worker needs, shared by reference count so the controller
/// can spawn more of them after construction. The result senders are NOT in
/// here: each worker owns its own clones, so the output channels close as
/// soon as the last worker exits.
struct PoolShared<T> {
    input_rx: Mutex<mpsc::Receiver<WorkItem<T>>>,
    cancel: CancellationToken,
    active: AtomicUsize,
    current: AtomicUsize,
    queued: AtomicUsize,
    min_workers: usize,
}

enum Received<T> {
    Item(WorkItem<T>),
    Closed,
    Cancelled,
    Idle,
}

/// Batch results collected by [`WorkerPool::dispatch`].
#[derive(Debug)]
pub struct DispatchOutcome<R> {
    pub outputs: Vec<WorkOutput<R>>,
    pub failures: Vec<WorkFailure>,
    /// True when cancellation cut the batch short.
    pub cancelled: bool,
}

// Manual impl: the derive would demand `R: Default` even though no field
// needs it.
impl<R> Default for DispatchOutcome<R> {
    fn default() -> Self {
        Self {
            outputs: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
        }
    }
}

/// Bounded-concurrency pool of async workers.
pub struct WorkerPool<T, R> {
    input_tx: Option<mpsc::Sender<WorkItem<T>>>,
    results_rx: mpsc::Receiver<WorkOutput<R>>,
    failures_rx: mpsc::Receiver<WorkFailure>,
    shared: Arc<PoolShared<T>>,
    tracker: TaskTracker,
    controller_stop: CancellationToken,
    queue_capacity: usize,
    next_index: usize,
}

impl<T, R> WorkerPool<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Spawn a pool with the given bounds and unit of work.
    ///
    /// `worker_fn` is cloned into every worker; it receives the payload and
    /// returns the result for the output stream.
    pub fn spawn<F, Fut>(bounds: PoolBounds, cancel: CancellationToken, worker_fn: F) -> Self
    where
        F: Fn(T) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<R, EngineError>> + Send,
    {
        let queue_capacity = bounds.max_workers * POOL_QUEUE_FACTOR;
        let (input_tx, input_rx) = mpsc::channel(queue_capacity);
        let (results_tx, results_rx) = mpsc::channel(queue_capacity);
        let (failures_tx, failures_rx) = mpsc::channel(queue_capacity);

        let shared = Arc::new(PoolShared {
            input_rx: Mutex::new(input_rx),
            cancel,
            active: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            min_workers: bounds.min_workers,
        });

        let tracker = TaskTracker::new();
        let elastic = bounds.is_elastic();
        for id in 0..bounds.min_workers {
            spawn_worker(
                &tracker,
                shared.clone(),
                results_tx.clone(),
                failures_tx.clone(),
                worker_fn.clone(),
                id,
                elastic,
            );
        }

        let controller_stop = CancellationToken::new();
        if elastic {
            let shared_for_controller = shared.clone();
            let stop = controller_stop.clone();
            let tracker_for_controller = tracker.clone();
            let max_workers = bounds.max_workers;
            let worker_fn_for_controller = worker_fn.clone();
            let capacity = queue_capacity;
            // The controller owns sender clones only for as long as it runs;
            // they drop with it so the output channels can close.
            tokio::spawn(async move {
                let mut next_id = shared_for_controller.current.load(Ordering::SeqCst);
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        _ = shared_for_controller.cancel.cancelled() => break,
                        _ = tokio::time::sleep(SCALE_CHECK_INTERVAL) => {}
                    }
                    let queued = shared_for_controller.queued.load(Ordering::SeqCst);
                    let current = shared_for_controller.current.load(Ordering::SeqCst);
                    if queued >= capacity && current < max_workers {
                        debug!(queued, current, "input queue saturated, adding a worker");
                        spawn_worker(
                            &tracker_for_controller,
                            shared_for_controller.clone(),
                            results_tx.clone(),
                            failures_tx.clone(),
                            worker_fn_for_controller.clone(),
                            next_id,
                            true,
                        );
                        next_id += 1;
                    }
                }
            });
        }

        Self {
            input_tx: Some(input_tx),
            results_rx,
            failures_rx,
            shared,
            tracker,
            controller_stop,
            queue_capacity,
            next_index: 0,
        }
    }

    /// Number of workers currently executing a unit of work.
    pub fn active_workers(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Number of live workers right now, elastic scaling included.
    pub fn current_workers(&self) -> usize {
        self.shared.current.load(Ordering::SeqCst)
    }

    /// Submit one payload. Blocks when the input queue is full; errors when
    /// the pool is closed or cancelled.
    pub async fn submit(&mut self, payload: T) -> Result<usize, EngineError> {
        let index = self.next_index;
        let tx = self
            .input_tx
            .as_ref()
            .ok_or_else(|| EngineError::Worker("pool is closed".to_string()))?;
        self.shared.queued.fetch_add(1, Ordering::SeqCst);
        let sent = tokio::select! {
            _ = self.shared.cancel.cancelled() => Err(EngineError::cancelled()),
            res = tx.send(WorkItem { index, payload }) => {
                res.map_err(|_| EngineError::Worker("pool input closed".to_string()))
            }
        };
        if sent.is_err() {
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
            return sent.map(|_| index);
        }
        self.next_index += 1;
        Ok(index)
    }

    /// Receive the next completed unit, success or failure. `None` once the
    /// pool has shut down and both streams are drained.
    pub async fn next_completed(&mut self) -> Option<Result<WorkOutput<R>, WorkFailure>> {
        tokio::select! {
            out = self.results_rx.recv() => out.map(Ok),
            fail = self.failures_rx.recv() => fail.map(Err),
        }
    }

    /// Run one batch of payloads through the pool and collect every result.
    ///
    /// The batch is fed from a helper task so submission backpressure cannot
    /// deadlock against result collection. Indices in the returned outputs
    /// are the payload positions within this batch. On cancellation the
    /// already-produced results are drained and returned with
    /// `cancelled = true`.
    pub async fn dispatch(&mut self, payloads: Vec<T>) -> DispatchOutcome<R> {
        let expected = payloads.len();
        let mut outcome = DispatchOutcome::default();
        if expected == 0 {
            return outcome;
        }

        let Some(tx) = self.input_tx.clone() else {
            outcome.cancelled = true;
            return outcome;
        };
        let shared = self.shared.clone();
        let feeder = tokio::spawn(async move {
            for (index, payload) in payloads.into_iter().enumerate() {
                shared.queued.fetch_add(1, Ordering::SeqCst);
                let aborted = tokio::select! {
                    _ = shared.cancel.cancelled() => true,
                    res = tx.send(WorkItem { index, payload }) => res.is_err(),
                };
                if aborted {
                    shared.queued.fetch_sub(1, Ordering::SeqCst);
                    break;
                }
            }
        });

        while outcome.outputs.len() + outcome.failures.len() < expected {
            tokio::select! {
                _ = self.shared.cancel.cancelled() => {
                    outcome.cancelled = true;
                    break;
                }
                out = self.results_rx.recv() => match out {
                    Some(o) => outcome.outputs.push(o),
                    None => break,
                },
                fail = self.failures_rx.recv() => match fail {
                    Some(f) => outcome.failures.push(f),
                    None => break,
                },
            }
        }

        if outcome.cancelled {
            // Workers drain quickly after cancellation; collect what they
            // already produced without blocking.
            while let Ok(o) = self.results_rx.try_recv() {
                outcome.outputs.push(o);
            }
            while let Ok(f) = self.failures_rx.try_recv() {
                outcome.failures.push(f);
            }
        }

        let _ = feeder.await;
        outcome
    }

    /// Close the input, wait for the workers to finish, and drain every
    /// remaining result.
    ///
    /// Results are consumed while waiting: a worker blocked on a full output
    /// channel would otherwise never exit.
    pub async fn join(mut self) -> DispatchOutcome<R> {
        self.input_tx = None;
        self.controller_stop.cancel();
        self.tracker.close();

        let mut outcome = DispatchOutcome {
            cancelled: self.shared.cancel.is_cancelled(),
            ..Default::default()
        };

        let mut all_exited = std::pin::pin!(self.tracker.wait());
        loop {
            tokio::select! {
                _ = &mut all_exited => break,
                out = self.results_rx.recv() => if let Some(o) = out {
                    outcome.outputs.push(o);
                },
                fail = self.failures_rx.recv() => if let Some(f) = fail {
                    outcome.failures.push(f);
                },
            }
        }

        // Every sender clone died with its worker (or the controller), so
        // these drains terminate at the channel close.
        while let Some(o) = self.results_rx.recv().await {
            outcome.outputs.push(o);
        }
        while let Some(f) = self.failures_rx.recv().await {
            outcome.failures.push(f);
        }
        outcome
    }

    /// Capacity of the input queue (2 × max workers).
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}

impl<T, R> Drop for WorkerPool<T, R> {
    fn drop(&mut self) {
        // Stop the elastic controller; a dropped pool must not leak it.
        self.controller_stop.cancel();
    }
}

fn spawn_worker<T, R, F, Fut>(
    tracker: &TaskTracker,
    shared: Arc<PoolShared<T>>,
    results_tx: mpsc::Sender<WorkOutput<R>>,
    failures_tx: mpsc::Sender<WorkFailure>,
    worker_fn: F,
    id: usize,
    elastic: bool,
) where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<R, EngineError>> + Send,
{
    shared.current.fetch_add(1, Ordering::SeqCst);
    tracker.spawn(async move {
        trace!(worker = id, "worker started");
        let mut scaled_down = false;
        loop {
            match next_item(&shared, elastic).await {
                Received::Item(item) => {
                    shared.queued.fetch_sub(1, Ordering::SeqCst);
                    shared.active.fetch_add(1, Ordering::SeqCst);
                    let result = worker_fn(item.payload).await;
                    shared.active.fetch_sub(1, Ordering::SeqCst);
                    let delivered = match result {
                        Ok(value) => {
                            let output = WorkOutput {
                                index: item.index,
                                value,
                            };
                            tokio::select! {
                                _ = shared.cancel.cancelled() => false,
                                res = results_tx.send(output) => res.is_ok(),
                            }
                        }
                        Err(error) => {
                            let failure = WorkFailure {
                                index: item.index,
                                error,
                            };
                            tokio::select! {
                                _ = shared.cancel.cancelled() => false,
                                res = failures_tx.send(failure) => res.is_ok(),
                            }
                        }
                    };
                    if !delivered {
                        break;
                    }
                }
                Received::Idle => {
                    // Scale down with a guarded decrement so concurrent idle
                    // workers cannot drop the pool below its floor.
                    let min = shared.min_workers;
                    let took_slot = shared
                        .current
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                            (c > min).then_some(c - 1)
                        })
                        .is_ok();
                    if took_slot {
                        trace!(worker = id, "idle worker exiting");
                        scaled_down = true;
                        break;
                    }
                }
                Received::Closed | Received::Cancelled => break,
            }
        }
        if !scaled_down {
            shared.current.fetch_sub(1, Ordering::SeqCst);
        }
        trace!(worker = id, "worker stopped");
    });
}

async fn next_item<T>(shared: &PoolShared<T>, elastic: bool) -> Received<T> {
    let recv = async {
        let mut rx = shared.input_rx.lock().await;
        rx.recv().await
    };
    tokio::select! {
        _ = shared.cancel.cancelled() => Received::Cancelled,
        received = async {
            if elastic {
                match tokio::time::timeout(WORKER_IDLE_TIMEOUT, recv).await {
                    Ok(Some(item)) => Received::Item(item),
                    Ok(None) => Received::Closed,
                    Err(_) => Received::Idle,
                }
            } else {
                match recv.await {
                    Some(item) => Received::Item(item),
                    None => Received::Closed,
                }
            }
        } => received,
    }
}
