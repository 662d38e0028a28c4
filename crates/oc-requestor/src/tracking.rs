//! C10: order tracking. The client-side authority on duplicate-stream
//! prevention — `POST /orders/initiate` consults this before asking C9 to
//! open a new stream (spec §4.9, §6, scenario S4).

use oc_schemas::OrderId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct TrackedOrder {
    pub session: String,
    pub notes: Vec<String>,
    pub stream_active: bool,
}

/// `order_id -> {session, notes[], stream_active}` (spec §4.9). Locked only
/// for insert/mutate, same shape as `oc_state::OrderStateManager` on the
/// processor side.
#[derive(Default)]
pub struct OrderTracking {
    orders: RwLock<HashMap<OrderId, TrackedOrder>>,
}

pub type SharedOrderTracking = Arc<OrderTracking>;

impl OrderTracking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a stream is already marked active for this order —
    /// the caller must short-circuit rather than open a second one.
    pub async fn is_stream_active(&self, order_id: &str) -> bool {
        self.orders.read().await.get(order_id).map(|o| o.stream_active).unwrap_or(false)
    }

    /// Marks (creating the entry if absent) a stream as active for this
    /// order. Called exactly once, right before C9 opens the connection.
    pub async fn mark_stream_active(&self, order_id: &str, session: &str) {
        let mut guard = self.orders.write().await;
        let entry = guard.entry(order_id.to_string()).or_default();
        entry.session = session.to_string();
        entry.stream_active = true;
    }

    /// Called on clean EOF or after retries are exhausted (spec §4.9:
    /// "on success-then-EOF it marks stream_active=false without retrying").
    pub async fn mark_stream_inactive(&self, order_id: &str) {
        if let Some(entry) = self.orders.write().await.get_mut(order_id) {
            entry.stream_active = false;
        }
    }

    pub async fn append_note(&self, order_id: &str, note: String) {
        self.orders.write().await.entry(order_id.to_string()).or_default().notes.push(note);
    }

    pub async fn get(&self, order_id: &str) -> Option<TrackedOrder> {
        self.orders.read().await.get(order_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_initiate_short_circuits_while_active() {
        let tracking = OrderTracking::new();
        assert!(!tracking.is_stream_active("O1").await);
        tracking.mark_stream_active("O1", "").await;
        assert!(tracking.is_stream_active("O1").await);
    }

    #[tokio::test]
    async fn eof_clears_active_flag_without_retry() {
        let tracking = OrderTracking::new();
        tracking.mark_stream_active("O1", "").await;
        tracking.mark_stream_inactive("O1").await;
        assert!(!tracking.is_stream_active("O1").await);
    }
}
