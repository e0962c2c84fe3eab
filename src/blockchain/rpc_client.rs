use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigError, Result, RpcError, ScannerError};
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::Block;

/// The two node calls the scanner depends on
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// `eth_blockNumber`: latest block number as a hex quantity
    async fn block_number(&self) -> Result<String>;

    /// `eth_getBlockByNumber`. `Ok(None)` when the node answers `null`.
    async fn block_by_number(&self, block: &str, full_transactions: bool) -> Result<Option<Block>>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    // Missing and `null` results both come out as `Value::Null`
    #[serde(default)]
    result: Value,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 client over HTTP
#[derive(Clone)]
pub struct RpcClient {
    client: Client,
    endpoint: String,
    timeout_seconds: u64,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(endpoint: &str, timeout_seconds: u64) -> Result<Self> {
        LogContext::new("rpc_client", "initialization")
            .with_metadata("endpoint", serde_json::json!(endpoint))
            .with_metadata("timeout_seconds", serde_json::json!(timeout_seconds))
            .info("Initializing RPC client");

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                ScannerError::Config(ConfigError::InvalidValue {
                    key: "rpc.endpoint".to_string(),
                    value: format!("{} ({})", endpoint, e),
                })
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            timeout_seconds,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Call `method` and return its raw `result`
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let monitor = PerformanceMonitor::new(&format!("rpc_{}", method));
        let result = self.send(method, params).await;
        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_rpc_call(method, duration, result.is_ok());
        result
    }

    /// Call `method` and deserialize its `result` into `T`
    pub async fn call_for<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| ScannerError::MalformedResponse(format!("{} result: {}", method, e)))
    }

    async fn send(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        LogContext::new("rpc_client", "send")
            .with_metadata("method", serde_json::json!(method))
            .with_metadata("id", serde_json::json!(request.id))
            .trace(&format!("Sending RPC request: {}", method));

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status { status: status.as_u16() }.into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        let rpc_response: JsonRpcResponse = serde_json::from_slice(&body)
            .map_err(|e| ScannerError::MalformedResponse(format!("{} response: {}", method, e)))?;

        if let Some(error) = rpc_response.error {
            return Err(RpcError::Method {
                code: error.code,
                message: error.message,
            }
            .into());
        }

        Ok(rpc_response.result)
    }

    fn classify_transport_error(&self, e: reqwest::Error) -> ScannerError {
        let error = if e.is_timeout() {
            RpcError::Timeout {
                seconds: self.timeout_seconds,
            }
        } else if e.is_connect() {
            RpcError::Connection(e.to_string())
        } else {
            RpcError::Http(e)
        };
        ScannerError::Upstream(error)
    }
}

#[async_trait]
impl NodeClient for RpcClient {
    async fn block_number(&self) -> Result<String> {
        match self.call("eth_blockNumber", vec![]).await? {
            Value::String(hex) => Ok(hex),
            Value::Null => Err(RpcError::MissingResult {
                method: "eth_blockNumber".to_string(),
            }
            .into()),
            other => Err(ScannerError::MalformedResponse(format!(
                "eth_blockNumber result is not a string: {}",
                other
            ))),
        }
    }

    async fn block_by_number(&self, block: &str, full_transactions: bool) -> Result<Option<Block>> {
        let params = vec![Value::String(block.to_string()), Value::Bool(full_transactions)];
        self.call_for("eth_getBlockByNumber", params).await
    }
}

/// Parse a JSON-RPC hex quantity such as `0x1b4`. The prefix is optional.
pub fn parse_hex_quantity(hex: &str) -> Result<u64> {
    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ScannerError::MalformedResponse(format!("invalid hex quantity '{}'", hex)));
    }

    u64::from_str_radix(digits, 16).map_err(|e| {
        ScannerError::MalformedResponse(format!("invalid hex quantity '{}': {}", hex, e))
    })
}

/// Encode a block number as a JSON-RPC hex quantity
pub fn to_hex_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rpc_client_creation() {
        let client = RpcClient::new("http://localhost:8545", 30).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8545");
    }

    #[test]
    fn test_json_rpc_request_serialization() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "eth_getBlockByNumber",
            params: vec![json!("0x3e8"), json!(true)],
            id: 1,
        };

        let serialized = serde_json::to_string(&request).unwrap();
        let expected =
            r#"{"jsonrpc":"2.0","method":"eth_getBlockByNumber","params":["0x3e8",true],"id":1}"#;
        assert_eq!(serialized, expected);
    }

    #[test]
    fn test_json_rpc_response_deserialization() {
        let response: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","result":"0x1234","id":1}"#).unwrap();
        assert_eq!(response.result, json!("0x1234"));
        assert!(response.error.is_none());

        let response: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":1}"#,
        )
        .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found");
        assert_eq!(response.result, Value::Null);
    }

    #[test]
    fn test_null_result_is_preserved_as_null() {
        let response: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","result":null,"id":1}"#).unwrap();
        assert_eq!(response.result, Value::Null);

        let block: Option<Block> = serde_json::from_value(response.result).unwrap();
        assert!(block.is_none());
    }

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity("0x3e8").unwrap(), 1000);
        assert_eq!(parse_hex_quantity("0X3E8").unwrap(), 1000);
        assert_eq!(parse_hex_quantity("3e8").unwrap(), 1000);
        assert_eq!(parse_hex_quantity("0x0").unwrap(), 0);
    }

    #[test]
    fn test_parse_hex_quantity_rejects_garbage() {
        for input in ["", "0x", "0xzz", "+1", "0x-1", "0x10000000000000000"] {
            assert!(
                matches!(parse_hex_quantity(input), Err(ScannerError::MalformedResponse(_))),
                "{} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_to_hex_quantity() {
        assert_eq!(to_hex_quantity(0), "0x0");
        assert_eq!(to_hex_quantity(1000), "0x3e8");
        assert_eq!(parse_hex_quantity(&to_hex_quantity(u64::MAX)).unwrap(), u64::MAX);
    }
}
