//! The scheduler: concurrency gate, rate-limit spacing, retry/backoff,
//! circuit breaker, and label-based deduplication over a priority queue of
//! [`RequestRecord`]s.
//!
//! Exactly one dispatcher task per [`RequestQueue`] ever pops from the
//! priority queue and decides what runs next, so concurrency and spacing
//! invariants fall out of that serialization rather than needing their own
//! lock dance. Work itself still runs on separate spawned tasks (gated by
//! a semaphore) so slow requests don't block the scheduler.

use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use shared_utils::clock::{Clock, SystemClock};
use tokio::sync::{broadcast, Mutex, Notify, Semaphore};
use tokio::task::AbortHandle;
use tracing::{debug, instrument};

use crate::config::RequestQueueConfig;

use super::breaker::CircuitBreaker;
use super::error::RequestError;
use super::record::{BoxFuture, Execute, RequestRecord};

/// GCRA limiter gating how often the dispatcher may hand off a new request,
/// shared across every submitter rather than per-request.
type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Snapshot of queue occupancy and breaker state, surfaced through the
/// engine's stats/observability facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub queued: usize,
    pub in_flight: usize,
    pub consecutive_failures: u32,
    pub breaker_open: bool,
}

/// A unit of work to submit. `execute` is re-invoked on every retry, so it
/// must be idempotent to call repeatedly.
pub struct SubmitRequest<T> {
    pub priority: i32,
    pub label: Option<String>,
    pub execute: Execute<T>,
}

struct Inner<T> {
    queue: BinaryHeap<RequestRecord<T>>,
    /// Completion channel per dedup key (the label if one was given, else a
    /// synthesized per-id key). Present for the lifetime of a request from
    /// first submission through final resolution.
    in_flight: HashMap<String, broadcast::Sender<Result<T, RequestError>>>,
    breaker: CircuitBreaker,
    next_id: u64,
    next_sequence: i64,
    /// Monotonically increasing offset used to compute "front of band"
    /// sequence numbers for retries: always far below any fresh
    /// submission's sequence, but still internally FIFO-ordered.
    next_retry_offset: i64,
    /// Abort handles for in-flight execute() tasks and pending retry-delay
    /// timers, keyed by request id, so `clear()` leaves nothing scheduled.
    running: HashMap<u64, AbortHandle>,
}

impl<T> Inner<T> {
    fn completion_key(label: &Option<String>, id: u64) -> String {
        match label {
            Some(l) => l.clone(),
            None => format!("__id:{id}"),
        }
    }

    fn complete(&mut self, key: &str, result: Result<T, RequestError>)
    where
        T: Clone,
    {
        if let Some(tx) = self.in_flight.remove(key) {
            let _ = tx.send(result);
        }
    }

    fn front_of_band_sequence(&mut self) -> i64 {
        self.next_retry_offset += 1;
        i64::MIN + self.next_retry_offset
    }

    fn fresh_sequence(&mut self) -> i64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }
}

/// Mediates all outbound requests: one shared concurrency cap, one shared
/// rate limiter, and a priority ordering that every caller funnels through.
pub struct RequestQueue<T: Clone + Send + Sync + 'static> {
    inner: Arc<Mutex<Inner<T>>>,
    semaphore: Arc<Semaphore>,
    notify: Arc<Notify>,
    config: RequestQueueConfig,
    clock: Arc<dyn Clock>,
    dispatcher: AbortHandle,
    closed: Arc<AtomicBool>,
}

impl<T: Clone + Send + Sync + 'static> RequestQueue<T> {
    pub fn new(config: RequestQueueConfig) -> Self {
        Self::new_with_clock(config, Arc::new(SystemClock))
    }

    /// Builds the queue against an explicit clock, so breaker cooldowns are
    /// testable by advancing a `FakeClock` rather than waiting on real time.
    pub fn new_with_clock(config: RequestQueueConfig, clock: Arc<dyn Clock>) -> Self {
        let inner = Arc::new(Mutex::new(Inner {
            queue: BinaryHeap::new(),
            in_flight: HashMap::new(),
            breaker: CircuitBreaker::new(config.breaker_threshold, config.breaker_reset()),
            next_id: 0,
            next_sequence: 0,
            next_retry_offset: 0,
            running: HashMap::new(),
        }));
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        let notify = Arc::new(Notify::new());
        let closed = Arc::new(AtomicBool::new(false));
        let limiter = Quota::with_period(config.min_interval()).map(|quota| Arc::new(RateLimiter::direct(quota)));

        let handle = tokio::spawn(dispatch_loop(
            inner.clone(),
            semaphore.clone(),
            notify.clone(),
            limiter,
            clock.clone(),
            config,
            closed.clone(),
        ));

        Self {
            inner,
            semaphore,
            notify,
            config,
            clock,
            dispatcher: handle.abort_handle(),
            closed,
        }
    }

    /// Submits work to the queue and awaits its outcome. If `label` matches
    /// an already pending or in-flight request, this call attaches to that
    /// request's outcome instead of enqueueing new work.
    #[instrument(skip(self, req), fields(priority = req.priority, label = req.label.as_deref()))]
    pub async fn submit(&self, req: SubmitRequest<T>) -> Result<T, RequestError> {
        let mut rx = {
            let mut inner = self.inner.lock().await;

            if let Some(label) = &req.label {
                if let Some(tx) = inner.in_flight.get(label) {
                    debug!(label, "deduplicated against in-flight request");
                    let rx = tx.subscribe();
                    drop(inner);
                    return recv_outcome(rx).await;
                }
            }

            let id = inner.next_id;
            inner.next_id += 1;
            let key = Inner::<T>::completion_key(&req.label, id);
            let (tx, rx) = broadcast::channel(1);
            inner.in_flight.insert(key.clone(), tx);

            let sequence = inner.fresh_sequence();
            inner.queue.push(RequestRecord {
                id,
                sequence,
                label: req.label,
                priority: req.priority,
                created_at: self.clock.now(),
                attempt: 0,
                execute: req.execute,
            });

            rx
        };
        self.notify.notify_one();
        recv_outcome_ref(&mut rx).await
    }

    /// Fails every queued and in-flight request with `Cancelled` and cancels
    /// all internal timers. No leftover scheduled callbacks remain.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        for (_, handle) in inner.running.drain() {
            handle.abort();
        }
        inner.queue.clear();
        let keys: Vec<String> = inner.in_flight.keys().cloned().collect();
        for key in keys {
            inner.complete(&key, Err(RequestError::Cancelled));
        }
    }

    pub async fn stats(&self) -> QueueStats {
        let inner = self.inner.lock().await;
        QueueStats {
            queued: inner.queue.len(),
            in_flight: inner.running.len(),
            consecutive_failures: inner.breaker.consecutive_failures(),
            breaker_open: inner.breaker.is_open_state(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for RequestQueue<T> {
    fn drop(&mut self) {
        self.closed.store(true, AtomicOrdering::SeqCst);
        self.notify.notify_one();
        self.dispatcher.abort();
    }
}

async fn recv_outcome<T: Clone>(
    mut rx: broadcast::Receiver<Result<T, RequestError>>,
) -> Result<T, RequestError> {
    recv_outcome_ref(&mut rx).await
}

async fn recv_outcome_ref<T: Clone>(
    rx: &mut broadcast::Receiver<Result<T, RequestError>>,
) -> Result<T, RequestError> {
    match rx.recv().await {
        Ok(result) => result,
        // The sender side only ever disappears after sending exactly once,
        // so a channel closing without a value means the queue itself was
        // torn down mid-flight.
        Err(_) => Err(RequestError::Cancelled),
    }
}

async fn dispatch_loop<T: Clone + Send + Sync + 'static>(
    inner: Arc<Mutex<Inner<T>>>,
    semaphore: Arc<Semaphore>,
    notify: Arc<Notify>,
    limiter: Option<Arc<Limiter>>,
    clock: Arc<dyn Clock>,
    config: RequestQueueConfig,
    closed: Arc<AtomicBool>,
) {
    loop {
        if closed.load(AtomicOrdering::SeqCst) {
            return;
        }

        let now = clock.now();
        let next = {
            let mut guard = inner.lock().await;
            if guard.breaker.is_open_at(now) {
                reject_all_queued(&mut guard, RequestError::CircuitOpen);
                None
            } else {
                guard.queue.peek().map(|r| r.priority)
            }
        };

        if next.is_none() {
            notify.notified().await;
            continue;
        }

        if let Some(limiter) = &limiter {
            limiter.until_ready().await;
        }

        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            return;
        };

        let dispatched = {
            let mut guard = inner.lock().await;
            let now = clock.now();
            if guard.breaker.is_open_at(now) {
                reject_all_queued(&mut guard, RequestError::CircuitOpen);
                drop(permit);
                None
            } else if let Some(record) = guard.queue.pop() {
                Some(record)
            } else {
                drop(permit);
                None
            }
        };

        let Some(record) = dispatched else {
            continue;
        };

        let id = record.id;
        let task_inner = inner.clone();
        let task_config = config;
        let task_clock = clock.clone();
        let task_notify = notify.clone();
        let join = tokio::spawn(async move {
            run_one(task_inner, record, task_config, task_clock, task_notify, permit).await;
        });

        inner
            .lock()
            .await
            .running
            .insert(id, join.abort_handle());
    }
}

fn reject_all_queued<T: Clone>(inner: &mut Inner<T>, err: RequestError) {
    while let Some(record) = inner.queue.pop() {
        let key = Inner::<T>::completion_key(&record.label, record.id);
        inner.complete(&key, Err(err.clone()));
    }
}

async fn run_one<T: Clone + Send + Sync + 'static>(
    inner: Arc<Mutex<Inner<T>>>,
    mut record: RequestRecord<T>,
    config: RequestQueueConfig,
    clock: Arc<dyn Clock>,
    notify: Arc<Notify>,
    permit: tokio::sync::OwnedSemaphorePermit,
) {
    let fut: BoxFuture<T> = (record.execute)();
    let outcome = tokio::time::timeout(config.request_timeout(), fut).await;
    drop(permit);

    let result = match outcome {
        Err(_elapsed) => Err(RequestError::Timeout),
        Ok(inner_result) => inner_result,
    };

    let mut guard = inner.lock().await;
    guard.running.remove(&record.id);
    let key = Inner::<T>::completion_key(&record.label, record.id);

    // The key may already be gone if `clear()` raced us; treat that as a
    // cancellation that simply arrived first.
    if !guard.in_flight.contains_key(&key) {
        return;
    }

    match result {
        Ok(value) => {
            guard.breaker.record_success();
            guard.complete(&key, Ok(value));
            debug!(id = record.id, "request completed");
        }
        Err(err) if err.is_retryable() => {
            record.attempt += 1;
            if record.attempt <= config.max_retries {
                let delay = config.backoff_for_attempt(record.attempt);
                debug!(id = record.id, attempt = record.attempt, ?delay, "retrying");
                record.sequence = guard.front_of_band_sequence();
                drop(guard);
                schedule_retry(inner, record, delay, notify).await;
            } else {
                let permanent = RequestError::PermanentUpstream(err.to_string());
                guard.breaker.record_permanent_failure_at(clock.now());
                guard.complete(&key, Err(permanent));
            }
        }
        Err(err) => {
            if err.counts_toward_breaker() {
                guard.breaker.record_permanent_failure_at(clock.now());
            }
            guard.complete(&key, Err(err));
        }
    }
}

async fn schedule_retry<T: Clone + Send + Sync + 'static>(
    inner: Arc<Mutex<Inner<T>>>,
    record: RequestRecord<T>,
    delay: std::time::Duration,
    notify: Arc<Notify>,
) {
    let id = record.id;
    let timer_inner = inner.clone();
    let join = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let mut guard = timer_inner.lock().await;
        guard.running.remove(&id);
        guard.queue.push(record);
        drop(guard);
        // Wakes the dispatcher if it's parked on `notified()` with an
        // otherwise-empty queue, which is exactly the state a single
        // in-flight request leaves it in.
        notify.notify_one();
    });
    inner.lock().await.running.insert(id, join.abort_handle());
}
