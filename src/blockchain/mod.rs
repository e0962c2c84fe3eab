pub mod rpc_client;
pub mod block_parser;
pub mod block_observer;

pub use rpc_client::{parse_hex_quantity, to_hex_quantity, NodeClient, RpcClient};
pub use block_parser::{with_cancellation, BlockParser, Parser};
pub use block_observer::{BlockObserver, TickOutcome};
