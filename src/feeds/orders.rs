//! User order updates
//!
//! Nothing is stored: updates go straight to listeners.

use tracing::trace;

use crate::parser::UserOrderUpdate;
use crate::publisher::{Registry, SubscriptionId};

pub type OrderListener = dyn FnMut(&UserOrderUpdate) + Send;

#[derive(Debug, Default)]
pub struct UserOrders {
    listeners: Registry<OrderListener>,
    received: u64,
}

impl UserOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliver(&mut self, update: &UserOrderUpdate) {
        self.received += 1;
        trace!(
            order_id = ?update.order_id,
            status = ?update.status,
            listeners = self.listeners.len(),
            "User order update"
        );
        self.listeners.dispatch(|listener| listener(update));
    }

    /// Updates delivered since creation
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&UserOrderUpdate) + Send + 'static,
    {
        self.listeners.subscribe(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_passthrough() {
        let mut orders = UserOrders::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        orders.subscribe(move |u: &UserOrderUpdate| sink.lock().unwrap().push(u.order_id.clone()));

        let update = UserOrderUpdate {
            order_id: Some("42".to_string()),
            status: Some("FILLED".to_string()),
            ..UserOrderUpdate::default()
        };
        orders.deliver(&update);

        assert_eq!(*seen.lock().unwrap(), vec![Some("42".to_string())]);
        assert_eq!(orders.received(), 1);
    }
}
