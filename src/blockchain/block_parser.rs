use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::blockchain::rpc_client::{parse_hex_quantity, to_hex_quantity, NodeClient};
use crate::error::{Result, RpcError, ScannerError, ValidationError};
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{Address, Transaction};
use crate::storage::{SubscriptionStore, TransactionHistoryStore};

/// Operations the HTTP layer and the observer need from the scanner
#[async_trait]
pub trait Parser: Send + Sync {
    /// Latest block number known to the node
    async fn current_block(&self, cancel: &CancellationToken) -> Result<u64>;

    /// Full transaction list of one block
    async fn block_transactions(
        &self,
        cancel: &CancellationToken,
        block_number: u64,
    ) -> Result<Vec<Transaction>>;

    /// Register `address` with the observer. Always `Ok(true)` for a non-blank address.
    fn subscribe(&self, address: &str) -> Result<bool>;

    /// Transactions the observer has recorded for `address`
    fn observed_transactions(&self, address: &str) -> Result<Vec<Transaction>>;

    /// Scan blocks for transactions touching `address` and return its whole ledger
    async fn scan_address(
        &self,
        cancel: &CancellationToken,
        address: &str,
        block_range: i64,
    ) -> Result<Vec<Transaction>>;
}

/// Range scanner backed by a node client and the two in-process stores
pub struct BlockParser {
    client: Arc<dyn NodeClient>,
    history: Arc<dyn TransactionHistoryStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
}

impl BlockParser {
    pub fn new(
        client: Arc<dyn NodeClient>,
        history: Arc<dyn TransactionHistoryStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
    ) -> Self {
        Self {
            client,
            history,
            subscriptions,
        }
    }

    /// First block to scan for `address`.
    ///
    /// The watermark block is already in the ledger, so a resumed scan starts
    /// right after it and never reaches back past it.
    fn scan_floor(&self, address: &Address, latest: u64, block_range: u64) -> u64 {
        match self.history.last_scanned_block(address) {
            Some(watermark) => watermark.saturating_add(1),
            None => latest.saturating_sub(block_range),
        }
    }
}

#[async_trait]
impl Parser for BlockParser {
    async fn current_block(&self, cancel: &CancellationToken) -> Result<u64> {
        let hex = with_cancellation(cancel, self.client.block_number()).await?;
        parse_hex_quantity(&hex)
    }

    async fn block_transactions(
        &self,
        cancel: &CancellationToken,
        block_number: u64,
    ) -> Result<Vec<Transaction>> {
        let block = with_cancellation(
            cancel,
            self.client.block_by_number(&to_hex_quantity(block_number), true),
        )
        .await?;

        block
            .map(|block| block.transactions)
            .ok_or_else(|| RpcError::BlockNotFound { block_number }.into())
    }

    fn subscribe(&self, address: &str) -> Result<bool> {
        let address = Address::parse(address)?;
        self.subscriptions.insert_subscriber(&address);

        LogContext::new("block_parser", "subscribe")
            .with_address(address.as_str())
            .info("Address subscribed");

        Ok(true)
    }

    fn observed_transactions(&self, address: &str) -> Result<Vec<Transaction>> {
        let address = Address::parse(address)?;
        Ok(self.subscriptions.observed_transactions(&address))
    }

    async fn scan_address(
        &self,
        cancel: &CancellationToken,
        address: &str,
        block_range: i64,
    ) -> Result<Vec<Transaction>> {
        let address = Address::parse(address)?;
        let block_range = u64::try_from(block_range)
            .map_err(|_| ValidationError::NegativeBlockRange(block_range))?;

        let monitor = PerformanceMonitor::new("scan_address");
        let latest = self.current_block(cancel).await?;
        let from_block = self.scan_floor(&address, latest, block_range);

        if from_block > latest {
            LogContext::new("block_parser", "scan_address")
                .with_address(address.as_str())
                .with_block_number(latest)
                .debug("Ledger already covers the chain head");
            return Ok(self.history.all_transactions(&address));
        }

        // Blocks are committed one at a time in ascending order, so an interrupted
        // scan keeps its progress and the watermark is the last block fully recorded
        let mut matched = 0;
        for block_number in from_block..=latest {
            let transactions = self.block_transactions(cancel, block_number).await?;

            for tx in transactions {
                if let Some(direction) = tx.direction_for(&address) {
                    self.history.record_transaction(&address, block_number, tx, direction);
                    matched += 1;
                }
            }
            self.history.record_scanned_block(&address, block_number);
        }

        MetricsLogger::log_scan_completed(
            address.as_str(),
            from_block,
            latest,
            matched,
            monitor.elapsed_ms(),
        );

        Ok(self.history.all_transactions(&address))
    }
}

/// Race `operation` against `cancel`, yielding `ScannerError::Cancelled` if the token
/// fires first
pub async fn with_cancellation<T, F>(cancel: &CancellationToken, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScannerError::Cancelled),
        result = operation => result,
    }
}
