use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::models::{Address, Direction, Transaction};
use super::ConcurrentMultiMap;

/// Per-address inbound/outbound ledger with a last-scanned-block watermark
pub trait TransactionHistoryStore: Send + Sync {
    /// Append `tx` to the ledger side given by `direction` and set the
    /// watermark to `block_number`. The watermark write is last-writer-wins;
    /// callers must pass non-decreasing block numbers per address.
    fn record_transaction(
        &self,
        address: &Address,
        block_number: u64,
        tx: Transaction,
        direction: Direction,
    );

    /// Set the watermark without recording a transaction (a block with no matches)
    fn record_scanned_block(&self, address: &Address, block_number: u64);

    /// Highest block incorporated into the ledger, `None` if never scanned
    fn last_scanned_block(&self, address: &Address) -> Option<u64>;

    fn inbound_transactions(&self, address: &Address) -> Vec<Transaction>;

    fn outbound_transactions(&self, address: &Address) -> Vec<Transaction>;

    /// Inbound entries followed by outbound entries
    fn all_transactions(&self, address: &Address) -> Vec<Transaction> {
        let mut transactions = self.inbound_transactions(address);
        transactions.extend(self.outbound_transactions(address));
        transactions
    }
}

/// Process-lifetime ledger. Nothing is ever evicted.
#[derive(Debug, Default)]
pub struct InMemoryTransactionHistory {
    inbound: ConcurrentMultiMap<Address, Transaction>,
    outbound: ConcurrentMultiMap<Address, Transaction>,
    last_scanned: RwLock<HashMap<Address, u64>>,
}

impl InMemoryTransactionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of addresses with a watermark
    pub fn tracked_addresses(&self) -> usize {
        self.last_scanned
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl TransactionHistoryStore for InMemoryTransactionHistory {
    fn record_transaction(
        &self,
        address: &Address,
        block_number: u64,
        tx: Transaction,
        direction: Direction,
    ) {
        self.record_scanned_block(address, block_number);

        match direction {
            Direction::Inbound => self.inbound.put(address.clone(), tx),
            Direction::Outbound => self.outbound.put(address.clone(), tx),
        }
    }

    fn record_scanned_block(&self, address: &Address, block_number: u64) {
        self.last_scanned
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address.clone(), block_number);
    }

    fn last_scanned_block(&self, address: &Address) -> Option<u64> {
        self.last_scanned
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .copied()
    }

    fn inbound_transactions(&self, address: &Address) -> Vec<Transaction> {
        self.inbound.get(address).unwrap_or_default()
    }

    fn outbound_transactions(&self, address: &Address) -> Vec<Transaction> {
        self.outbound.get(address).unwrap_or_default()
    }
}
