use thiserror::Error;

/// Main error type for the Ethereum block scanner
#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("Upstream error: {0}")]
    Upstream(#[from] RpcError),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Node transport and protocol errors
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("HTTP status {status} returned by node")]
    Status { status: u16 },

    #[error("RPC method error: code={code}, message={message}")]
    Method { code: i64, message: String },

    #[error("No result in response to {method}")]
    MissingResult { method: String },

    #[error("Block not found: {block_number}")]
    BlockNotFound { block_number: u64 },
}

/// Rejected query parameters
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Address must not be empty")]
    EmptyAddress,

    #[error("Block range must not be negative: {0}")]
    NegativeBlockRange(i64),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, ScannerError>;

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Requires operator attention, the process cannot do useful work
    Critical,
    /// Node unreachable or rejecting requests
    High,
    /// Transient or node-side data problems
    Medium,
    /// Caller mistakes and shutdown noise
    Low,
}

impl ScannerError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ScannerError::Config(_) => ErrorSeverity::Critical,

            ScannerError::Upstream(RpcError::Connection(_)) => ErrorSeverity::High,
            ScannerError::Upstream(RpcError::Status { .. }) => ErrorSeverity::High,

            ScannerError::Upstream(RpcError::Timeout { .. }) => ErrorSeverity::Medium,
            ScannerError::Upstream(_) => ErrorSeverity::Medium,
            ScannerError::MalformedResponse(_) => ErrorSeverity::Medium,

            ScannerError::InvalidInput(_) => ErrorSeverity::Low,
            ScannerError::Cancelled => ErrorSeverity::Low,
        }
    }

    /// Whether repeating the same call later can succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            ScannerError::Upstream(RpcError::Timeout { .. }) => true,
            ScannerError::Upstream(RpcError::Connection(_)) => true,
            ScannerError::Upstream(RpcError::Http(_)) => true,
            ScannerError::Upstream(RpcError::Status { status }) => *status >= 500 || *status == 429,
            ScannerError::Upstream(RpcError::BlockNotFound { .. }) => true,
            ScannerError::Upstream(RpcError::Method { .. }) => false,
            ScannerError::Upstream(RpcError::MissingResult { .. }) => false,

            ScannerError::MalformedResponse(_) => false,
            ScannerError::InvalidInput(_) => false,
            ScannerError::Config(_) => false,
            ScannerError::Cancelled => false,
        }
    }

    /// Short machine-readable name used in API error bodies and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            ScannerError::Upstream(_) => "upstream_error",
            ScannerError::MalformedResponse(_) => "malformed_response",
            ScannerError::InvalidInput(_) => "invalid_input",
            ScannerError::Config(_) => "config_error",
            ScannerError::Cancelled => "cancelled",
        }
    }
}
