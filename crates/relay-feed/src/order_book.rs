//! Local order book.
//!
//! Orders are keyed by id and never removed; a cancellation is just another
//! state. Upserts overwrite by arrival order and keep the handshake state;
//! handshake events only touch orders already in the book.

use crate::parser::{BookEvent, OrderUpsert};
use parking_lot::RwLock;
use relay_core::{CounterpartyOrder, HandshakeState, OrderId};
use std::collections::HashMap;
use tokio::sync::watch;
use tracing::debug;

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// First event for the order.
    Inserted,
    /// Existing order overwritten.
    Updated,
    /// Handshake state set on an existing order.
    HandshakeUpdated(HandshakeState),
    /// Handshake event for an order not in the book; nothing changed.
    UnknownOrder,
}

impl ApplyOutcome {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::UnknownOrder)
    }
}

/// Counterparty order store.
#[derive(Debug)]
pub struct OrderBook {
    orders: RwLock<HashMap<OrderId, CounterpartyOrder>>,
    /// Bumped on every mutation.
    revision: watch::Sender<u64>,
}

impl OrderBook {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            orders: RwLock::new(HashMap::new()),
            revision,
        }
    }

    /// Apply a decoded order book or MPC event.
    pub fn apply(&self, event: &BookEvent) -> ApplyOutcome {
        match event {
            BookEvent::NewOrder(order) | BookEvent::OrderStateChange(order) => self.upsert(order),
            BookEvent::HandshakeStarted { local_order_id } => {
                self.set_handshake(local_order_id, HandshakeState::InProgress)
            }
            BookEvent::HandshakeCompleted { local_order_id } => {
                self.set_handshake(local_order_id, HandshakeState::Completed)
            }
        }
    }

    /// Insert or overwrite an order. An existing handshake state is kept;
    /// new orders start at `NotMatching`.
    pub fn upsert(&self, order: &OrderUpsert) -> ApplyOutcome {
        let outcome = {
            let mut orders = self.orders.write();
            let handshake_state = orders
                .get(&order.id)
                .map(|existing| existing.handshake_state);

            orders.insert(
                order.id.clone(),
                CounterpartyOrder {
                    order_id: order.id.clone(),
                    public_share_nullifier: order.public_share_nullifier.clone(),
                    is_local: order.local,
                    cluster_id: order.cluster.clone(),
                    state: order.state.clone(),
                    timestamp: order.timestamp,
                    handshake_state: handshake_state.unwrap_or_default(),
                },
            );

            if handshake_state.is_some() {
                ApplyOutcome::Updated
            } else {
                ApplyOutcome::Inserted
            }
        };

        debug!(order_id = %order.id, state = %order.state, ?outcome, "Order upserted");
        self.bump();
        outcome
    }

    /// Set the handshake state of an order already in the book.
    pub fn set_handshake(&self, id: &OrderId, state: HandshakeState) -> ApplyOutcome {
        {
            let mut orders = self.orders.write();
            let Some(order) = orders.get_mut(id) else {
                debug!(order_id = %id, %state, "Handshake event for unknown order");
                return ApplyOutcome::UnknownOrder;
            };
            order.handshake_state = state;
        }

        debug!(order_id = %id, %state, "Handshake state updated");
        self.bump();
        ApplyOutcome::HandshakeUpdated(state)
    }

    pub fn get(&self, id: &OrderId) -> Option<CounterpartyOrder> {
        self.orders.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }

    /// Orders managed by the connected relayer.
    pub fn local_order_count(&self) -> usize {
        self.orders.read().values().filter(|o| o.is_local).count()
    }

    /// All orders, ordered by id.
    pub fn snapshot(&self) -> Vec<CounterpartyOrder> {
        let mut orders: Vec<CounterpartyOrder> = self.orders.read().values().cloned().collect();
        orders.sort_by(|a, b| a.order_id.cmp(&b.order_id));
        orders
    }

    /// Receiver that changes on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::OrderState;

    fn upsert(id: &str, state: &str, ts: u64, local: bool) -> OrderUpsert {
        OrderUpsert {
            id: OrderId::new(id),
            public_share_nullifier: "0x01".to_string(),
            local,
            cluster: "c-1".to_string(),
            state: OrderState::new(state),
            timestamp: ts,
        }
    }

    #[test]
    fn test_new_order_starts_not_matching() {
        let book = OrderBook::new();
        assert_eq!(
            book.apply(&BookEvent::NewOrder(upsert("o-1", "Received", 1, true))),
            ApplyOutcome::Inserted
        );

        let order = book.get(&OrderId::new("o-1")).unwrap();
        assert_eq!(order.handshake_state, HandshakeState::NotMatching);
        assert_eq!(order.cluster_id, "c-1");
        assert!(order.is_local);
    }

    #[test]
    fn test_last_arrival_wins() {
        let events = [
            BookEvent::NewOrder(upsert("o-1", "Received", 1, false)),
            BookEvent::OrderStateChange(upsert("o-1", "Matching", 5, false)),
            BookEvent::OrderStateChange(upsert("o-1", "Cancelled", 3, false)),
        ];
        let orders: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        let id = OrderId::new("o-1");

        // Arrival order is authoritative whatever the timestamps say.
        for order in orders {
            let book = OrderBook::new();
            book.apply(&events[order[0]]);
            book.apply(&BookEvent::HandshakeStarted {
                local_order_id: id.clone(),
            });
            book.apply(&events[order[1]]);
            book.apply(&events[order[2]]);

            let (BookEvent::NewOrder(last) | BookEvent::OrderStateChange(last)) = &events[order[2]]
            else {
                unreachable!();
            };
            let stored = book.get(&id).unwrap();
            assert_eq!(stored.state, last.state, "order {order:?}");
            assert_eq!(stored.timestamp, last.timestamp, "order {order:?}");
            assert_eq!(stored.handshake_state, HandshakeState::InProgress, "order {order:?}");
            assert_eq!(book.len(), 1);
        }
    }

    #[test]
    fn test_upsert_keeps_handshake_state() {
        let book = OrderBook::new();
        let id = OrderId::new("o-1");
        book.apply(&BookEvent::NewOrder(upsert("o-1", "Received", 1, true)));
        book.apply(&BookEvent::HandshakeStarted {
            local_order_id: id.clone(),
        });

        assert_eq!(
            book.apply(&BookEvent::OrderStateChange(upsert("o-1", "Matching", 2, true))),
            ApplyOutcome::Updated
        );
        assert_eq!(book.get(&id).unwrap().handshake_state, HandshakeState::InProgress);

        book.apply(&BookEvent::HandshakeCompleted {
            local_order_id: id.clone(),
        });
        assert_eq!(book.get(&id).unwrap().handshake_state, HandshakeState::Completed);
    }

    #[test]
    fn test_handshake_for_absent_order_is_ignored() {
        let book = OrderBook::new();
        let rev = book.revision();

        assert_eq!(
            book.apply(&BookEvent::HandshakeCompleted {
                local_order_id: OrderId::new("missing"),
            }),
            ApplyOutcome::UnknownOrder
        );
        assert!(book.is_empty());
        assert_eq!(book.revision(), rev);
    }

    #[test]
    fn test_local_order_count() {
        let book = OrderBook::new();
        book.apply(&BookEvent::NewOrder(upsert("a", "Received", 1, true)));
        book.apply(&BookEvent::NewOrder(upsert("b", "Received", 1, false)));
        book.apply(&BookEvent::NewOrder(upsert("c", "Received", 1, true)));

        assert_eq!(book.local_order_count(), 2);
        let ids: Vec<_> = book.snapshot().into_iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![OrderId::new("a"), OrderId::new("b"), OrderId::new("c")]);
    }

    #[test]
    fn test_subscribers_see_mutations() {
        let book = OrderBook::new();
        let mut rx = book.subscribe();

        book.apply(&BookEvent::NewOrder(upsert("a", "Received", 1, true)));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
    }
}
