use std::sync::Arc;
use std::time::Duration;
use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::blockchain::Parser;
use crate::config::ObserverConfig;
use crate::error::{Result, ScannerError};
use crate::logging::{ErrorLogger, LogContext, MetricsLogger};
use crate::models::Address;
use crate::storage::SubscriptionStore;

/// What a single poll tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No subscribers; the node was not contacted
    Idle,
    /// Every subscriber had already been matched against the chain head
    UpToDate { block_number: u64 },
    /// The chain head was fetched and matched against pending subscribers
    Polled { block_number: u64, matched: usize },
}

/// Background poller that matches the latest block against subscribed addresses
pub struct BlockObserver {
    parser: Arc<dyn Parser>,
    subscriptions: Arc<dyn SubscriptionStore>,
    poll_interval: Duration,
}

impl BlockObserver {
    pub fn new(
        parser: Arc<dyn Parser>,
        subscriptions: Arc<dyn SubscriptionStore>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            parser,
            subscriptions,
            poll_interval,
        }
    }

    pub fn from_config(
        parser: Arc<dyn Parser>,
        subscriptions: Arc<dyn SubscriptionStore>,
        config: &ObserverConfig,
    ) -> Self {
        Self::new(parser, subscriptions, config.poll_interval())
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run one poll cycle
    pub async fn tick(&self, cancel: &CancellationToken) -> Result<TickOutcome> {
        let subscribers = self.subscriptions.all_subscribers();
        if subscribers.is_empty() {
            return Ok(TickOutcome::Idle);
        }

        let latest = self.parser.current_block(cancel).await?;

        // A subscriber matched against this block on an earlier tick is skipped
        let pending: Vec<Address> = subscribers
            .into_iter()
            .filter(|address| {
                self.subscriptions
                    .last_checked_block(address)
                    .map_or(true, |checked| checked < latest)
            })
            .collect();

        if pending.is_empty() {
            return Ok(TickOutcome::UpToDate { block_number: latest });
        }

        let transactions = self.parser.block_transactions(cancel, latest).await?;

        let mut matched = 0;
        for address in &pending {
            for tx in transactions.iter().filter(|tx| tx.involves(address)) {
                LogContext::new("block_observer", "tick")
                    .with_address(address.as_str())
                    .with_block_number(latest)
                    .with_transaction_hash(&tx.hash)
                    .debug("Observed subscriber transaction");
                self.subscriptions.record_observed_transaction(address, tx.clone());
                matched += 1;
            }
            self.subscriptions.mark_checked(address, latest);
        }

        MetricsLogger::log_poll_tick(latest, pending.len(), matched);

        Ok(TickOutcome::Polled {
            block_number: latest,
            matched,
        })
    }

    /// Poll until `cancel` fires. Tick failures are reported on `errors` and the loop carries on.
    pub async fn run(self, cancel: CancellationToken, errors: mpsc::UnboundedSender<ScannerError>) {
        info!(
            "Starting block observer with {} second polling interval",
            self.poll_interval.as_secs_f64()
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick(&cancel).await {
                Ok(TickOutcome::Idle) => debug!("No subscribers, skipping poll"),
                Ok(_) => {}
                Err(ScannerError::Cancelled) => break,
                Err(e) => self.report(e, &errors),
            }
        }

        info!("Block observer stopped");
    }

    /// Spawn [`BlockObserver::run`] on the runtime and hand back the error stream
    pub fn spawn(
        self,
        cancel: CancellationToken,
    ) -> (JoinHandle<()>, mpsc::UnboundedReceiver<ScannerError>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(cancel, sender));
        (handle, receiver)
    }

    fn report(&self, error: ScannerError, errors: &mpsc::UnboundedSender<ScannerError>) {
        ErrorLogger::log_error(&error, Some(LogContext::new("block_observer", "tick")));
        if errors.send(error).is_err() {
            debug!("Observer error receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcError;
    use crate::models::Transaction;
    use crate::storage::InMemorySubscriptions;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubParser {
        head: u64,
        transactions: Vec<Transaction>,
        fail: AtomicBool,
        block_fetches: AtomicUsize,
    }

    impl StubParser {
        fn new(head: u64, transactions: Vec<Transaction>) -> Self {
            Self {
                head,
                transactions,
                fail: AtomicBool::new(false),
                block_fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Parser for StubParser {
        async fn current_block(&self, _cancel: &CancellationToken) -> Result<u64> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(RpcError::Connection("node unreachable".to_string()).into());
            }
            Ok(self.head)
        }

        async fn block_transactions(
            &self,
            _cancel: &CancellationToken,
            _block_number: u64,
        ) -> Result<Vec<Transaction>> {
            self.block_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.transactions.clone())
        }

        fn subscribe(&self, _address: &str) -> Result<bool> {
            Ok(true)
        }

        fn observed_transactions(&self, _address: &str) -> Result<Vec<Transaction>> {
            Ok(Vec::new())
        }

        async fn scan_address(
            &self,
            _cancel: &CancellationToken,
            _address: &str,
            _block_range: i64,
        ) -> Result<Vec<Transaction>> {
            Ok(Vec::new())
        }
    }

    fn observer_with(
        parser: StubParser,
    ) -> (BlockObserver, Arc<StubParser>, Arc<InMemorySubscriptions>) {
        let parser = Arc::new(parser);
        let subscriptions = Arc::new(InMemorySubscriptions::new());
        let observer =
            BlockObserver::new(parser.clone(), subscriptions.clone(), Duration::from_millis(10));
        (observer, parser, subscriptions)
    }

    #[tokio::test]
    async fn test_tick_without_subscribers_is_idle() {
        let (observer, parser, _) = observer_with(StubParser::new(10, vec![]));
        parser.fail.store(true, Ordering::SeqCst);

        let outcome = observer.tick(&CancellationToken::new()).await.unwrap();

        assert_eq!(outcome, TickOutcome::Idle);
        assert_eq!(parser.block_fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tick_records_matches_once_per_block() {
        let transactions = vec![
            Transaction::new("0x01", "0xAAA", Some("0xccc")),
            Transaction::new("0x02", "0xccc", Some("0xbbb")),
            Transaction::new("0x03", "0xddd", Some("0xeee")),
        ];
        let (observer, parser, subscriptions) = observer_with(StubParser::new(10, transactions));
        subscriptions.insert_subscriber(&Address::new("0xaaa"));
        subscriptions.insert_subscriber(&Address::new("0xbbb"));
        let cancel = CancellationToken::new();

        let outcome = observer.tick(&cancel).await.unwrap();
        assert_eq!(outcome, TickOutcome::Polled { block_number: 10, matched: 2 });

        let outcome = observer.tick(&cancel).await.unwrap();
        assert_eq!(outcome, TickOutcome::UpToDate { block_number: 10 });
        assert_eq!(parser.block_fetches.load(Ordering::SeqCst), 1);

        let observed = subscriptions.observed_transactions(&Address::new("0xaaa"));
        assert_eq!(observed.len(), 1);
        assert_eq!(observed[0].hash, "0x01");
        assert_eq!(subscriptions.observed_transactions(&Address::new("0xbbb"))[0].hash, "0x02");
    }

    #[tokio::test]
    async fn test_run_reports_errors_and_stops_on_cancel() {
        let (observer, parser, subscriptions) = observer_with(StubParser::new(10, vec![]));
        subscriptions.insert_subscriber(&Address::new("0xaaa"));
        parser.fail.store(true, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        let (handle, mut errors) = observer.spawn(cancel.clone());

        let first = errors.recv().await.expect("observer should report the failed tick");
        assert!(matches!(first, ScannerError::Upstream(RpcError::Connection(_))));
        assert!(errors.recv().await.is_some(), "loop should keep polling after a failure");

        cancel.cancel();
        handle.await.unwrap();
    }
}
