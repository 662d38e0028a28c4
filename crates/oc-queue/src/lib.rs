//! C2: the per-order message queue. A bounded FIFO of queue-grammar strings
//! (spec §3 OrderQueue, §6 message grammar), one per order, drained by at
//! most one stream consumer.
//!
//! Overflow policy: drop the oldest entry with a logged warning (spec §4.2,
//! boundary behavior in §8) — losing old codes is preferable to blocking an
//! HTTP handler on a full queue, since the stream always emits a final
//! expiry event regardless.

use oc_schemas::{OrderId, QueueMessage};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, RwLock};
use tokio::time::Duration;

struct Inner {
    buf: VecDeque<String>,
    dropped: bool,
}

/// One order's bounded FIFO. `enqueue` never blocks (the critical section is
/// a short, uncontended `std::sync::Mutex` lock); `dequeue` suspends up to a
/// caller-supplied timeout and returns `None` on timeout rather than
/// failing, so the stream handler can interleave expiry checks (spec §4.2).
pub struct OrderQueue {
    capacity: usize,
    state: Mutex<Inner>,
    notify: Notify,
}

impl OrderQueue {
    pub fn new(capacity: usize) -> Self {
        OrderQueue {
            capacity,
            state: Mutex::new(Inner {
                buf: VecDeque::with_capacity(capacity.min(64)),
                dropped: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Pushes an already-encoded queue-grammar message. A full queue drops
    /// its oldest entry to make room.
    pub fn enqueue(&self, msg: impl Into<String>) {
        let msg = msg.into();
        let mut guard = self.state.lock().expect("order queue mutex poisoned");
        if guard.dropped {
            return;
        }
        if guard.buf.len() >= self.capacity {
            let discarded = guard.buf.pop_front();
            tracing::warn!(discarded = ?discarded, "order queue overflow, dropping oldest");
        }
        guard.buf.push_back(msg);
        drop(guard);
        self.notify.notify_one();
    }

    pub fn enqueue_message(&self, msg: &QueueMessage) {
        self.enqueue(msg.encode());
    }

    /// Blocks up to `timeout`; returns `None` on timeout or after `drop()`.
    pub async fn dequeue(&self, timeout: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut guard = self.state.lock().expect("order queue mutex poisoned");
                if guard.dropped {
                    return None;
                }
                if let Some(msg) = guard.buf.pop_front() {
                    return Some(msg);
                }
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return None;
            }
            let remaining = deadline - now;
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }

    /// Idempotent. Future `dequeue` calls return `None`; `enqueue` becomes a
    /// silent no-op.
    pub fn drop_queue(&self) {
        let mut guard = self.state.lock().expect("order queue mutex poisoned");
        guard.dropped = true;
        guard.buf.clear();
        drop(guard);
        self.notify.notify_waiters();
    }
}

/// Registry of per-order queues, keyed 1:1 with `OrderState` (spec §3). The
/// top-level map is locked only for insert/remove, matching
/// `oc_state::OrderStateManager`.
#[derive(Default)]
pub struct QueueRegistry {
    queues: RwLock<HashMap<OrderId, Arc<OrderQueue>>>,
    capacity: usize,
}

impl QueueRegistry {
    pub fn new(capacity: usize) -> Self {
        QueueRegistry {
            queues: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    pub async fn get_or_create(&self, order_id: &str) -> Arc<OrderQueue> {
        if let Some(q) = self.queues.read().await.get(order_id) {
            return q.clone();
        }
        let mut guard = self.queues.write().await;
        if let Some(q) = guard.get(order_id) {
            return q.clone();
        }
        let q = Arc::new(OrderQueue::new(self.capacity));
        guard.insert(order_id.to_string(), q.clone());
        q
    }

    pub async fn get(&self, order_id: &str) -> Option<Arc<OrderQueue>> {
        self.queues.read().await.get(order_id).cloned()
    }

    /// Destroys the queue along with its `OrderState` (spec §3). Idempotent.
    pub async fn drop_order(&self, order_id: &str) {
        let removed = self.queues.write().await.remove(order_id);
        if let Some(q) = removed {
            q.drop_queue();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fifo_order_preserved() {
        let q = OrderQueue::new(8);
        q.enqueue("P1/New");
        q.enqueue("P1/Closed");
        assert_eq!(q.dequeue(Duration::from_millis(10)).await.as_deref(), Some("P1/New"));
        assert_eq!(q.dequeue(Duration::from_millis(10)).await.as_deref(), Some("P1/Closed"));
    }

    #[tokio::test]
    async fn overflow_drops_oldest() {
        let q = OrderQueue::new(2);
        q.enqueue("a");
        q.enqueue("b");
        q.enqueue("c");
        assert_eq!(q.dequeue(Duration::from_millis(10)).await.as_deref(), Some("b"));
        assert_eq!(q.dequeue(Duration::from_millis(10)).await.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn dequeue_times_out_on_empty() {
        let q = OrderQueue::new(8);
        let res = q.dequeue(Duration::from_millis(20)).await;
        assert!(res.is_none());
    }

    #[tokio::test]
    async fn drop_is_idempotent_and_silences_future_enqueues() {
        let q = OrderQueue::new(8);
        q.drop_queue();
        q.drop_queue();
        q.enqueue("ignored");
        assert!(q.dequeue(Duration::from_millis(10)).await.is_none());
    }

    #[tokio::test]
    async fn registry_returns_same_queue_for_same_order() {
        let reg = QueueRegistry::new(8);
        let q1 = reg.get_or_create("O1").await;
        let q2 = reg.get_or_create("O1").await;
        assert!(Arc::ptr_eq(&q1, &q2));
    }
}
