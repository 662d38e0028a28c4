//! C1: the Order State Manager. Owns the process-wide map
//! `OrderID -> OrderState` (spec §4.1) and the proposal state machine
//! observed by the stream handler (§4.7).
//!
//! Concurrency shape (spec §5): the top-level map is guarded by an
//! `RwLock` taken only for insert/remove; each order's mutable state lives
//! behind its own `Mutex` so readers that already hold an `Arc` to an
//! `OrderState` never contend with unrelated orders.

pub mod proposal_fsm;

use chrono::{DateTime, Duration, Utc};
use oc_schemas::{Note, OrderId, Proposal, ProposalId, ProposalStatus, SellerEntry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Mutable per-order state (spec §3 OrderState). `expiry_at` is set once at
/// creation and never decreases; `get_or_create` never resets it.
#[derive(Debug, Clone)]
pub struct OrderState {
    pub order_id: OrderId,
    pub session: String,
    pub expiry_at: DateTime<Utc>,
    pub sellers: Vec<SellerEntry>,
    sellers_assigned: bool,
    pub proposals: Vec<Proposal>,
    pub notes: Vec<Note>,
}

impl OrderState {
    fn new(order_id: OrderId, session: String, expiry_at: DateTime<Utc>) -> Self {
        OrderState {
            order_id,
            session,
            expiry_at,
            sellers: Vec::new(),
            sellers_assigned: false,
            proposals: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry_at
    }

    pub fn proposal(&self, proposal_id: &str) -> Option<&Proposal> {
        self.proposals.iter().find(|p| p.proposal_id == proposal_id)
    }

    pub fn proposal_mut(&mut self, proposal_id: &str) -> Option<&mut Proposal> {
        self.proposals
            .iter_mut()
            .find(|p| p.proposal_id == proposal_id)
    }

    /// C5 assigns sellers exactly once (§4.5 step 5); subsequent calls are a
    /// no-op so a retried seller-selection task can't clobber the result.
    pub fn assign_sellers_once(&mut self, sellers: Vec<SellerEntry>) {
        if !self.sellers_assigned {
            self.sellers = sellers;
            self.sellers_assigned = true;
        }
    }

    pub fn sellers_assigned(&self) -> bool {
        self.sellers_assigned
    }

    pub fn push_proposal(&mut self, proposal_id: ProposalId, price: f64, delivery_date: DateTime<Utc>) {
        self.proposals.push(Proposal {
            proposal_id,
            price,
            delivery_date,
            notes: Vec::new(),
            status: ProposalStatus::Submitted,
        });
    }
}

/// Handle to one order's guarded state. Cloning is cheap (`Arc` clone);
/// callers lock it for the duration of a single mutation, never across a
/// suspension point that touches another order.
pub type OrderHandle = Arc<Mutex<OrderState>>;

#[derive(Default)]
pub struct OrderStateManager {
    orders: RwLock<HashMap<OrderId, OrderHandle>>,
}

impl OrderStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: if the entry already exists, it is returned unchanged —
    /// in particular `expiry_at` is not reset (spec §4.1, invariant 1 of §8).
    pub async fn get_or_create(
        &self,
        order_id: &str,
        expiry_duration: Duration,
        session: &str,
    ) -> OrderHandle {
        if let Some(existing) = self.orders.read().await.get(order_id) {
            return existing.clone();
        }

        let mut guard = self.orders.write().await;
        if let Some(existing) = guard.get(order_id) {
            return existing.clone();
        }
        let state = OrderState::new(
            order_id.to_string(),
            session.to_string(),
            Utc::now() + expiry_duration,
        );
        let handle: OrderHandle = Arc::new(Mutex::new(state));
        guard.insert(order_id.to_string(), handle.clone());
        handle
    }

    pub async fn get(&self, order_id: &str) -> Option<OrderHandle> {
        self.orders.read().await.get(order_id).cloned()
    }

    /// Returns `true` if an entry was present and removed.
    pub async fn remove(&self, order_id: &str) -> bool {
        self.orders.write().await.remove(order_id).is_some()
    }

    /// Ids whose `expiry_at <= now`. Read-only; does not mutate (spec §4.1).
    pub async fn expired_ids(&self, now: DateTime<Utc>) -> Vec<OrderId> {
        let snapshot: Vec<(OrderId, OrderHandle)> = self
            .orders
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut expired = Vec::new();
        for (id, handle) in snapshot {
            let state = handle.lock().await;
            if state.expiry_at <= now {
                expired.push(id);
            }
        }
        expired
    }

    pub async fn all(&self) -> Vec<OrderId> {
        self.orders.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let mgr = OrderStateManager::new();
        let h1 = mgr.get_or_create("O1", Duration::minutes(30), "").await;
        let expiry1 = h1.lock().await.expiry_at;

        let h2 = mgr.get_or_create("O1", Duration::minutes(30), "").await;
        let expiry2 = h2.lock().await.expiry_at;

        assert_eq!(expiry1, expiry2);
        assert!(Arc::ptr_eq(&h1, &h2));
    }

    #[tokio::test]
    async fn expired_ids_does_not_mutate() {
        let mgr = OrderStateManager::new();
        mgr.get_or_create("O1", Duration::seconds(-1), "").await;
        let expired = mgr.expired_ids(Utc::now()).await;
        assert_eq!(expired, vec!["O1".to_string()]);
        assert_eq!(mgr.len().await, 1);
    }

    #[tokio::test]
    async fn sellers_assigned_exactly_once() {
        let mgr = OrderStateManager::new();
        let handle = mgr.get_or_create("O1", Duration::minutes(30), "").await;
        {
            let mut s = handle.lock().await;
            s.assign_sellers_once(vec![SellerEntry { seller_id: "S1".into(), distance_km: 1.0 }]);
            s.assign_sellers_once(vec![SellerEntry { seller_id: "S2".into(), distance_km: 2.0 }]);
        }
        let s = handle.lock().await;
        assert_eq!(s.sellers.len(), 1);
        assert_eq!(s.sellers[0].seller_id, "S1");
    }
}
