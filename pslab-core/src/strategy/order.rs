//! Order intents recorded during a bar and serviced at the next bar's open.

use crate::domain::Direction;

#[derive(Debug, Clone, PartialEq)]
pub enum OrderIntent {
    /// Open a position named `id`, closing every opposite-direction position.
    Entry {
        id: String,
        direction: Direction,
        qty: f64,
    },
    /// Close the open position created by entry `entry_id`.
    Close { entry_id: String },
    /// Close every open position.
    CloseAll,
}

/// Intents waiting for the next `on_bar_update`, in issue order.
#[derive(Debug, Clone, Default)]
pub struct PendingOrders {
    intents: Vec<OrderIntent>,
}

impl PendingOrders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an intent. A second entry with the same id replaces the first in
    /// place, keeping its position in the queue.
    pub fn push(&mut self, intent: OrderIntent) {
        if let OrderIntent::Entry { id, .. } = &intent {
            let existing = self
                .intents
                .iter_mut()
                .find(|queued| matches!(queued, OrderIntent::Entry { id: q, .. } if q == id));
            if let Some(slot) = existing {
                *slot = intent;
                return;
            }
        }
        self.intents.push(intent);
    }

    pub fn take(&mut self) -> Vec<OrderIntent> {
        std::mem::take(&mut self.intents)
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrderIntent> {
        self.intents.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, direction: Direction, qty: f64) -> OrderIntent {
        OrderIntent::Entry {
            id: id.into(),
            direction,
            qty,
        }
    }

    #[test]
    fn same_id_entry_replaces_in_place() {
        let mut pending = PendingOrders::new();
        pending.push(entry("A", Direction::Long, 1.0));
        pending.push(OrderIntent::CloseAll);
        pending.push(entry("A", Direction::Short, 3.0));

        let intents = pending.take();
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[0], entry("A", Direction::Short, 3.0));
        assert_eq!(intents[1], OrderIntent::CloseAll);
        assert!(pending.is_empty());
    }

    #[test]
    fn distinct_ids_queue_in_order() {
        let mut pending = PendingOrders::new();
        pending.push(entry("A", Direction::Long, 1.0));
        pending.push(entry("B", Direction::Long, 1.0));
        pending.push(OrderIntent::Close {
            entry_id: "A".into(),
        });
        assert_eq!(pending.len(), 3);
    }
}
