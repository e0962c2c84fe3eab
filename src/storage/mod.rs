pub mod history;
pub mod multimap;
pub mod subscriptions;

pub use history::{InMemoryTransactionHistory, TransactionHistoryStore};
pub use multimap::ConcurrentMultiMap;
pub use subscriptions::{InMemorySubscriptions, SubscriptionStore};
