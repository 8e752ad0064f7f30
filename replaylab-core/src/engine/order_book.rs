//! Resting-order book: time in force, stop triggers, brackets and OCO groups.
//!
//! The book tracks order state only. Pricing, validation and ledger effects
//! belong to the simulator, which drives the book once per slice:
//!
//! 1. `submit` each new order (bracket children start dormant)
//! 2. `expire` orders past their expiry or trading date
//! 3. walk `processing_order`, filling via `get_mut` / `complete` / `remove`
//!
//! Entries are addressed by the book's submission sequence number, never by
//! `OrderId`: caller IDs may repeat, and only parent and OCO links use them.
//! 4. `end_of_slice` drops IOC leftovers and cancels orphaned children

use crate::domain::{
    ActivationReason, CancelReason, Order, OrderActivation, OrderCancellation, OrderType,
    TimeInForce,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;

/// An order on the book plus its fill progress.
#[derive(Debug, Clone, PartialEq)]
pub struct RestingOrder {
    /// Submission sequence number, unique within the book's lifetime.
    pub seq: u64,
    pub order: Order,
    pub remaining: Decimal,
    /// False while a bracket child waits for its parent to fill.
    pub active: bool,
    pub triggered: bool,
    pub triggered_at: Option<DateTime<Utc>>,
}

impl RestingOrder {
    /// Type the order executes as right now. Untriggered stops keep their stop type.
    pub fn executable_type(&self) -> OrderType {
        if self.triggered {
            self.order.order_type.after_trigger()
        } else {
            self.order.order_type
        }
    }

    /// Stops may not execute until triggered.
    pub fn can_execute(&self) -> bool {
        !self.order.order_type.is_stop() || self.triggered
    }

    fn cancellation(&self, timestamp: DateTime<Utc>, reason: CancelReason) -> OrderCancellation {
        OrderCancellation {
            timestamp,
            order_id: self.order.order_id.clone(),
            symbol: self.order.symbol.clone(),
            side: self.order.side,
            quantity: self.remaining,
            order_type: self.order.order_type,
            time_in_force: self.order.time_in_force,
            submitted_at: self.order.timestamp,
            expire_at: self.order.expire_at,
            reason,
            source: self.order.source.clone(),
        }
    }

    fn is_expired(&self, timestamp: DateTime<Utc>) -> bool {
        if self.order.expire_at.is_some_and(|at| at <= timestamp) {
            return true;
        }
        match self.order.time_in_force {
            TimeInForce::Day => self.order.timestamp.date_naive() < timestamp.date_naive(),
            TimeInForce::Gtc | TimeInForce::Ioc => false,
        }
    }
}

fn id_key(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    /// Book order is submission order.
    orders: Vec<RestingOrder>,
    /// Lowercased IDs of fully filled orders, for late-arriving children.
    filled: HashSet<String>,
    next_seq: u64,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn get(&self, seq: u64) -> Option<&RestingOrder> {
        self.orders.iter().find(|r| r.seq == seq)
    }

    pub fn get_mut(&mut self, seq: u64) -> Option<&mut RestingOrder> {
        self.orders.iter_mut().find(|r| r.seq == seq)
    }

    pub fn orders(&self) -> &[RestingOrder] {
        &self.orders
    }

    pub fn has_filled(&self, id: &str) -> bool {
        self.filled.contains(&id_key(id))
    }

    /// Sequence numbers in the order they should be worked this slice. With
    /// queue priority the book is stably sorted by submission time.
    pub fn processing_order(&self, queue_priority: bool) -> Vec<u64> {
        let mut view: Vec<&RestingOrder> = self.orders.iter().collect();
        if queue_priority {
            view.sort_by_key(|r| r.order.timestamp);
        }
        view.into_iter().map(|r| r.seq).collect()
    }

    // ── Lifecycle ──────────────────────────────────────────────────────

    /// Place an order and return its sequence number. Children whose parent
    /// already filled start active.
    pub fn submit(&mut self, order: Order) -> u64 {
        let active = match &order.parent_order_id {
            None => true,
            Some(parent) => self.has_filled(parent.as_str()),
        };
        self.next_seq += 1;
        let seq = self.next_seq;
        self.orders.push(RestingOrder {
            seq,
            remaining: order.quantity,
            order,
            active,
            triggered: false,
            triggered_at: None,
        });
        seq
    }

    /// Remove and report orders past `expire_at` or their trading date.
    pub fn expire(&mut self, timestamp: DateTime<Utc>) -> Vec<OrderCancellation> {
        let mut rows = Vec::new();
        self.orders.retain(|r| {
            if r.is_expired(timestamp) {
                rows.push(r.cancellation(timestamp, CancelReason::Expired));
                false
            } else {
                true
            }
        });
        rows
    }

    /// Drop an order without a row (rejections report themselves).
    pub fn remove(&mut self, seq: u64) -> Option<RestingOrder> {
        let index = self.orders.iter().position(|r| r.seq == seq)?;
        Some(self.orders.remove(index))
    }

    /// Record a full fill: take the order off the book and activate its children.
    pub fn complete(&mut self, seq: u64, timestamp: DateTime<Utc>) -> Vec<OrderActivation> {
        let Some(done) = self.remove(seq) else {
            return Vec::new();
        };
        let id = done.order.order_id;
        self.filled.insert(id_key(id.as_str()));

        let mut activations = Vec::new();
        for child in self.orders.iter_mut().filter(|r| !r.active) {
            let Some(parent) = child.order.parent_order_id.as_ref() else {
                continue;
            };
            if !parent.matches(id.as_str()) {
                continue;
            }
            child.active = true;
            activations.push(OrderActivation {
                timestamp,
                order_id: child.order.order_id.clone(),
                parent_order_id: parent.clone(),
                symbol: child.order.symbol.clone(),
                side: child.order.side,
                quantity: child.remaining,
                reason: ActivationReason::ParentFilled,
                source: child.order.source.clone(),
            });
        }
        activations
    }

    /// Cancel every other open member of `group` after a fill in it.
    pub fn cancel_oco_siblings(
        &mut self,
        filled_seq: u64,
        group: &str,
        timestamp: DateTime<Utc>,
    ) -> Vec<OrderCancellation> {
        let mut rows = Vec::new();
        self.orders.retain(|r| {
            let sibling = r.seq != filled_seq
                && r.remaining > Decimal::ZERO
                && r
                    .order
                    .oco_group
                    .as_deref()
                    .is_some_and(|g| g.eq_ignore_ascii_case(group));
            if sibling {
                rows.push(r.cancellation(timestamp, CancelReason::OcoSiblingFilled));
            }
            !sibling
        });
        rows
    }

    /// Drop active IOC orders silently, then cancel dormant children whose
    /// parent left the book without filling (repeated until none remain, so
    /// grandchildren follow their parents).
    pub fn end_of_slice(&mut self, timestamp: DateTime<Utc>) -> Vec<OrderCancellation> {
        self.orders
            .retain(|r| !(r.active && r.order.time_in_force == TimeInForce::Ioc));

        let mut rows = Vec::new();
        loop {
            let live: HashSet<String> = self
                .orders
                .iter()
                .map(|r| id_key(r.order.order_id.as_str()))
                .collect();
            let filled = &self.filled;
            let before = rows.len();
            self.orders.retain(|r| {
                let orphaned = !r.active
                    && r.order.parent_order_id.as_ref().is_some_and(|p| {
                        let key = id_key(p.as_str());
                        !live.contains(&key) && !filled.contains(&key)
                    });
                if orphaned {
                    rows.push(r.cancellation(timestamp, CancelReason::ParentCancelled));
                }
                !orphaned
            });
            if rows.len() == before {
                break;
            }
        }
        rows
    }
}
