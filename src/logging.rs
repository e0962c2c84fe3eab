use log::{debug, error, info, trace, warn, LevelFilter};
use serde_json::{json, Map, Value};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::config::LoggingConfig;
use crate::error::{ErrorSeverity, ScannerError};

/// Structured logging context: one JSON object per log line
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: Map<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_address(self, address: &str) -> Self {
        self.with_metadata("address", json!(address))
    }

    pub fn with_block_number(self, block_number: u64) -> Self {
        self.with_metadata("block_number", json!(block_number))
    }

    pub fn with_block_range(self, from_block: u64, to_block: u64) -> Self {
        self.with_metadata("from_block", json!(from_block))
            .with_metadata("to_block", json!(to_block))
    }

    pub fn with_transaction_hash(self, tx_hash: &str) -> Self {
        self.with_metadata("transaction_hash", json!(tx_hash))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    fn format_message(&self, level: &str, message: &str) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut entry = Map::new();
        entry.insert("timestamp".to_string(), json!(timestamp));
        entry.insert("level".to_string(), json!(level));
        entry.insert("component".to_string(), json!(self.component));
        entry.insert("operation".to_string(), json!(self.operation));
        entry.insert("message".to_string(), json!(message));
        for (key, value) in &self.metadata {
            entry.insert(key.clone(), value.clone());
        }

        Value::Object(entry).to_string()
    }

    pub fn info(&self, message: &str) {
        info!("{}", self.format_message("INFO", message));
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", self.format_message("WARN", message));
    }

    pub fn error(&self, message: &str) {
        error!("{}", self.format_message("ERROR", message));
    }

    pub fn debug(&self, message: &str) {
        debug!("{}", self.format_message("DEBUG", message));
    }

    pub fn trace(&self, message: &str) {
        trace!("{}", self.format_message("TRACE", message));
    }
}

/// Wall-clock timer for a single operation
pub struct PerformanceMonitor {
    start: Instant,
    operation: String,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Stop the timer, logging failures at warn level, and return the elapsed milliseconds
    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = self.elapsed_ms();
        let context = LogContext::new("performance", &self.operation).with_duration_ms(duration);

        match result {
            Ok(_) => context.trace(&format!("Operation completed in {}ms", duration)),
            Err(e) => context
                .with_metadata("error", json!(e.to_string()))
                .warn(&format!("Operation failed after {}ms: {}", duration, e)),
        }

        duration
    }
}

pub struct ErrorLogger;

impl ErrorLogger {
    /// Log an error at a level derived from its severity
    pub fn log_error(error: &ScannerError, context: Option<LogContext>) {
        let severity = error.severity();

        let context = context
            .unwrap_or_else(|| LogContext::new("error", "unknown"))
            .with_metadata("error_kind", json!(error.kind()))
            .with_metadata("severity", json!(format!("{:?}", severity)))
            .with_metadata("recoverable", json!(error.is_recoverable()));

        let message = format!("Error occurred: {}", error);

        match severity {
            ErrorSeverity::Critical | ErrorSeverity::High => context.error(&message),
            ErrorSeverity::Medium => context.warn(&message),
            ErrorSeverity::Low => context.info(&message),
        }
    }
}

pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_rpc_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "rpc_call")
            .with_metadata("method", json!(method))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.debug(&format!("RPC call {} completed in {}ms", method, duration_ms));
        } else {
            context.warn(&format!("RPC call {} failed after {}ms", method, duration_ms));
        }
    }

    pub fn log_scan_completed(
        address: &str,
        from_block: u64,
        to_block: u64,
        matched: usize,
        duration_ms: u64,
    ) {
        LogContext::new("metrics", "scan_completed")
            .with_address(address)
            .with_block_range(from_block, to_block)
            .with_metadata("matched", json!(matched))
            .with_duration_ms(duration_ms)
            .info(&format!(
                "Scanned blocks {}..={} for {}: {} new transactions",
                from_block, to_block, address, matched
            ));
    }

    pub fn log_poll_tick(block_number: u64, subscribers: usize, matched: usize) {
        let context = LogContext::new("metrics", "poll_tick")
            .with_block_number(block_number)
            .with_metadata("subscribers", json!(subscribers))
            .with_metadata("matched", json!(matched));

        if matched > 0 {
            context.info(&format!(
                "Block {} matched {} transactions for {} subscribers",
                block_number, matched, subscribers
            ));
        } else {
            context.debug(&format!("Block {} had no subscriber activity", block_number));
        }
    }
}

/// Initialize env_logger from the logging configuration.
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<(), log::SetLoggerError> {
    let level = config.level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    let json_format = config.format == "json";

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(move |buf, record| {
            use std::io::Write;

            let message = record.args().to_string();
            if json_format {
                // Structured entries are already JSON; wrap plain messages so every line parses
                match serde_json::from_str::<Value>(&message) {
                    Ok(Value::Object(entry)) => writeln!(buf, "{}", Value::Object(entry)),
                    _ => writeln!(
                        buf,
                        "{}",
                        json!({
                            "timestamp": chrono::Utc::now().to_rfc3339(),
                            "level": record.level().to_string(),
                            "target": record.target(),
                            "message": message,
                        })
                    ),
                }
            } else {
                writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    message
                )
            }
        })
        .try_init()?;

    info!("Logging initialized at level {} ({} format)", level, config.format);
    Ok(())
}
