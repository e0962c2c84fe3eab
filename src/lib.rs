pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod storage;

pub use blockchain::{BlockObserver, BlockParser, NodeClient, Parser, RpcClient, TickOutcome};
pub use error::{Result, ScannerError};
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use config::{ApiConfig, AppConfig, LoggingConfig, ObserverConfig, RpcConfig, ScannerConfig};
pub use models::{Address, Block, Direction, Transaction};
pub use storage::{
    InMemorySubscriptions, InMemoryTransactionHistory, SubscriptionStore, TransactionHistoryStore,
};
