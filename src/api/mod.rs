pub mod http;

pub use http::{
    get_address_transactions, get_current_block, get_observed_transactions, health, router,
    subscribe, ApiError, ApiServer, AppState, CurrentBlockResponse, ErrorResponse, HealthResponse,
};
