use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::models::{Address, Transaction};
use super::ConcurrentMultiMap;

/// Subscribed addresses and the transactions observed for them
pub trait SubscriptionStore: Send + Sync {
    /// Mark `address` as subscribed. Idempotent; an existing entry keeps its
    /// observed log and its last checked block.
    fn insert_subscriber(&self, address: &Address);

    /// Snapshot of subscribed addresses, in no particular order
    fn all_subscribers(&self) -> Vec<Address>;

    fn is_subscribed(&self, address: &Address) -> bool;

    /// Append to the observed log. Does not require a prior subscription.
    fn record_observed_transaction(&self, address: &Address, tx: Transaction);

    /// Observed log, empty if nothing was recorded
    fn observed_transactions(&self, address: &Address) -> Vec<Transaction>;

    /// Last block the poller matched against this subscriber
    fn last_checked_block(&self, address: &Address) -> Option<u64>;

    /// Remember that `block_number` was matched against this subscriber.
    /// Ignored for addresses that are not subscribed.
    fn mark_checked(&self, address: &Address, block_number: u64);
}

#[derive(Debug, Default)]
pub struct InMemorySubscriptions {
    // Value is the last checked block; `None` until the first poll
    subscribers: RwLock<HashMap<Address, Option<u64>>>,
    observed: ConcurrentMultiMap<Address, Transaction>,
}

impl InMemorySubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl SubscriptionStore for InMemorySubscriptions {
    fn insert_subscriber(&self, address: &Address) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(address.clone())
            .or_insert(None);
    }

    fn all_subscribers(&self) -> Vec<Address> {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn is_subscribed(&self, address: &Address) -> bool {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(address)
    }

    fn record_observed_transaction(&self, address: &Address, tx: Transaction) {
        self.observed.put(address.clone(), tx);
    }

    fn observed_transactions(&self, address: &Address) -> Vec<Transaction> {
        self.observed.get(address).unwrap_or_default()
    }

    fn last_checked_block(&self, address: &Address) -> Option<u64> {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .copied()
            .flatten()
    }

    fn mark_checked(&self, address: &Address, block_number: u64) {
        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(last_checked) = subscribers.get_mut(address) {
            *last_checked = Some(block_number);
        }
    }
}
