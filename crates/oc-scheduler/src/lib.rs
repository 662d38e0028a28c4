//! C3: the priority task scheduler. A bounded worker pool (default width
//! 10, spec §5) running tasks ordered by priority then FIFO (spec §3
//! PriorityTask, §8 invariants 5-6).
//!
//! Tasks are submitted as a boxed future factory that receives a
//! [`CancelToken`] — the scheduler never inspects or reorders a task's
//! captured arguments (spec §4.3, design note on `w_*` kwargs: "scheduler
//! carries no user args, only the closure and priority").

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use oc_schemas::TaskPriority;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, Semaphore};

pub type TaskId = u64;
pub type TaskOutcome = Result<(), String>;
pub type TaskFactory = Box<dyn FnOnce(CancelToken) -> BoxFuture<'static, TaskOutcome> + Send>;

/// Cooperative cancellation signal for one task. Tasks observe this at their
/// own suspension points (spec §4.3 `shutdown`, §5 cancellation).
#[derive(Clone)]
pub struct CancelToken(Arc<CancelInner>);

struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl Default for CancelToken {
    fn default() -> Self {
        CancelToken(Arc::new(CancelInner {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
        }))
    }
}

impl CancelToken {
    pub fn cancel(&self) {
        self.0.cancelled.store(true, AtomicOrdering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(AtomicOrdering::SeqCst)
    }

    /// Resolves once `cancel()` has been called; a no-op future if it
    /// already has been.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.0.notify.notified().await;
    }
}

struct QueuedTask {
    priority: TaskPriority,
    seq: u64,
    id: TaskId,
    order_id: String,
    token: CancelToken,
    factory: TaskFactory,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    /// `BinaryHeap` is a max-heap; "greater" here means "should run sooner":
    /// lower `TaskPriority` value wins, ties broken by earlier `seq` (FIFO).
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub order_id: String,
    pub outcome: Option<TaskOutcome>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Bounded worker pool. Construction spawns one dispatcher task that pulls
/// the highest-priority queued task whenever a capacity permit is free.
pub struct Scheduler {
    heap: Arc<Mutex<BinaryHeap<QueuedTask>>>,
    heap_notify: Arc<Notify>,
    semaphore: Arc<Semaphore>,
    results: Arc<Mutex<HashMap<TaskId, TaskRecord>>>,
    seq: AtomicU64,
    shutdown: Arc<AtomicBool>,
    dispatcher: tokio::task::JoinHandle<()>,
}

impl Scheduler {
    pub fn new(width: usize) -> Self {
        let heap: Arc<Mutex<BinaryHeap<QueuedTask>>> = Arc::new(Mutex::new(BinaryHeap::new()));
        let heap_notify = Arc::new(Notify::new());
        let semaphore = Arc::new(Semaphore::new(width));
        let results = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let dispatcher = tokio::spawn(Self::run_dispatcher(
            heap.clone(),
            heap_notify.clone(),
            semaphore.clone(),
            results.clone(),
            shutdown.clone(),
        ));

        Scheduler {
            heap,
            heap_notify,
            semaphore,
            results,
            seq: AtomicU64::new(0),
            shutdown,
            dispatcher,
        }
    }

    /// Enqueues a task; returns its id and a cancel token the caller can
    /// use to cancel this task specifically without affecting others
    /// (spec §5: client disconnect cancels only its own per-stream task).
    pub async fn submit(
        &self,
        priority: TaskPriority,
        order_id: impl Into<String>,
        factory: TaskFactory,
    ) -> (TaskId, CancelToken) {
        let id = self.seq.fetch_add(1, AtomicOrdering::SeqCst);
        let token = CancelToken::default();
        let queued = QueuedTask {
            priority,
            seq: id,
            id,
            order_id: order_id.into(),
            token: token.clone(),
            factory,
        };
        self.heap.lock().await.push(queued);
        self.heap_notify.notify_one();
        (id, token)
    }

    pub async fn result(&self, id: TaskId) -> Option<TaskRecord> {
        self.results.lock().await.get(&id).cloned()
    }

    /// Drops completed results older than `age` (spec C3 `cleanup_older_than`).
    pub async fn cleanup_older_than(&self, age: Duration) {
        let cutoff = Utc::now() - chrono::Duration::from_std(age).unwrap_or(chrono::Duration::zero());
        self.results.lock().await.retain(|_, rec| match rec.completed_at {
            Some(t) => t > cutoff,
            None => true,
        });
    }

    pub async fn stats(&self) -> SchedulerStats {
        let queued = self.heap.lock().await.len();
        let running = {
            // Permits in use = width - available. We don't retain width here
            // directly, so derive it from the semaphore's current availability.
            self.semaphore.available_permits()
        };
        let completed = self
            .results
            .lock()
            .await
            .values()
            .filter(|r| r.outcome.is_some())
            .count();
        SchedulerStats {
            queued,
            available_permits: running,
            completed,
        }
    }

    /// Cancels all queued tasks (they never run, recorded as cancelled) and
    /// cooperatively signals every currently-running task. Does not wait for
    /// running tasks to observe the signal.
    pub async fn shutdown(&self) {
        self.shutdown.store(true, AtomicOrdering::SeqCst);
        let mut heap = self.heap.lock().await;
        let mut results = self.results.lock().await;
        while let Some(queued) = heap.pop() {
            queued.token.cancel();
            results.insert(
                queued.id,
                TaskRecord {
                    order_id: queued.order_id,
                    outcome: Some(Err("cancelled before running".to_string())),
                    completed_at: Some(Utc::now()),
                },
            );
        }
        drop(results);
        drop(heap);
        self.heap_notify.notify_waiters();
        self.dispatcher.abort();
    }

    async fn run_dispatcher(
        heap: Arc<Mutex<BinaryHeap<QueuedTask>>>,
        heap_notify: Arc<Notify>,
        semaphore: Arc<Semaphore>,
        results: Arc<Mutex<HashMap<TaskId, TaskRecord>>>,
        shutdown: Arc<AtomicBool>,
    ) {
        loop {
            if shutdown.load(AtomicOrdering::SeqCst) {
                return;
            }
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };

            let queued = loop {
                if shutdown.load(AtomicOrdering::SeqCst) {
                    drop(permit);
                    return;
                }
                let next = heap.lock().await.pop();
                match next {
                    Some(q) => break q,
                    None => heap_notify.notified().await,
                }
            };

            let results = results.clone();
            tokio::spawn(async move {
                let outcome = if queued.token.is_cancelled() {
                    Err("cancelled before running".to_string())
                } else {
                    (queued.factory)(queued.token.clone()).await
                };
                results.lock().await.insert(
                    queued.id,
                    TaskRecord {
                        order_id: queued.order_id,
                        outcome: Some(outcome),
                        completed_at: Some(Utc::now()),
                    },
                );
                drop(permit);
            });
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerStats {
    pub queued: usize,
    pub available_permits: usize,
    pub completed: usize,
}
