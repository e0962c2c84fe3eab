#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use eth_block_scanner::blockchain::{parse_hex_quantity, to_hex_quantity, BlockParser, NodeClient};
use eth_block_scanner::error::{Result, RpcError};
use eth_block_scanner::models::{Block, Transaction};
use eth_block_scanner::storage::{InMemorySubscriptions, InMemoryTransactionHistory};

/// In-memory chain standing in for an Ethereum node
#[derive(Default)]
pub struct MockNode {
    latest: AtomicU64,
    blocks: Mutex<HashMap<u64, Vec<Transaction>>>,
    missing: Mutex<Vec<u64>>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    block_number_calls: AtomicUsize,
    fetched: Mutex<Vec<u64>>,
    cancel_at: Mutex<Option<(u64, CancellationToken)>>,
}

impl MockNode {
    pub fn new(latest: u64) -> Arc<Self> {
        let node = Self::default();
        node.latest.store(latest, Ordering::SeqCst);
        Arc::new(node)
    }

    pub fn set_latest(&self, latest: u64) {
        self.latest.store(latest, Ordering::SeqCst);
    }

    pub fn add_transaction(&self, block_number: u64, tx: Transaction) {
        self.blocks.lock().unwrap().entry(block_number).or_default().push(tx);
    }

    /// Make `eth_getBlockByNumber` answer `null` for this block
    pub fn drop_block(&self, block_number: u64) {
        self.missing.lock().unwrap().push(block_number);
    }

    /// Serve a block previously hidden by `drop_block`
    pub fn restore_block(&self, block_number: u64) {
        self.missing.lock().unwrap().retain(|number| *number != block_number);
    }

    /// Fire `token` once `block_number` has been served
    pub fn cancel_when_fetched(&self, block_number: u64, token: CancellationToken) {
        *self.cancel_at.lock().unwrap() = Some((block_number, token));
    }

    /// Fail every call with a connection error while set
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn block_number_calls(&self) -> usize {
        self.block_number_calls.load(Ordering::SeqCst)
    }

    /// Block numbers requested so far, in request order
    pub fn fetched_blocks(&self) -> Vec<u64> {
        self.fetched.lock().unwrap().clone()
    }

    async fn simulate_latency(&self) -> Result<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(RpcError::Connection("connection refused".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn block_number(&self) -> Result<String> {
        self.block_number_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await?;
        Ok(to_hex_quantity(self.latest.load(Ordering::SeqCst)))
    }

    async fn block_by_number(
        &self,
        block: &str,
        _full_transactions: bool,
    ) -> Result<Option<Block>> {
        self.simulate_latency().await?;
        let number = parse_hex_quantity(block)?;
        self.fetched.lock().unwrap().push(number);

        if let Some((at, token)) = self.cancel_at.lock().unwrap().as_ref() {
            if *at == number {
                token.cancel();
            }
        }

        if self.missing.lock().unwrap().contains(&number) {
            return Ok(None);
        }

        let transactions = self.blocks.lock().unwrap().get(&number).cloned().unwrap_or_default();
        Ok(Some(Block {
            number: block.to_string(),
            hash: format!("0x{:064x}", number),
            parent_hash: None,
            timestamp: None,
            transactions,
            other: Default::default(),
        }))
    }
}

/// Parser wired to `node` with fresh in-memory stores
pub struct Harness {
    pub node: Arc<MockNode>,
    pub history: Arc<InMemoryTransactionHistory>,
    pub subscriptions: Arc<InMemorySubscriptions>,
    pub parser: Arc<BlockParser>,
}

impl Harness {
    pub fn new(node: Arc<MockNode>) -> Self {
        let history = Arc::new(InMemoryTransactionHistory::new());
        let subscriptions = Arc::new(InMemorySubscriptions::new());
        let parser = Arc::new(BlockParser::new(
            node.clone(),
            history.clone(),
            subscriptions.clone(),
        ));
        Self {
            node,
            history,
            subscriptions,
            parser,
        }
    }
}

pub fn transfer(hash: &str, from: &str, to: &str) -> Transaction {
    Transaction::new(hash, from, Some(to))
}
