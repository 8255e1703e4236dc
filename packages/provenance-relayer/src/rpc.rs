//! JSON-RPC client with primary → fallback failover and circuit breaker.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use provenance_types::abi;
use rand::Rng;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::ledger::{Ledger, Receipt};
use crate::metrics::METRICS;
use crate::{Config, Error};

const CIRCUIT_BREAKER_THRESHOLD: u64 = 5;
const CIRCUIT_BREAKER_WINDOW_MS: u64 = 30_000;
/// Node error code for an execution revert.
const REVERT_ERROR_CODE: i64 = 3;

struct CircuitState {
    failures: u64,
    last_failure_ms: u64,
    open: bool,
}

/// Why a single JSON-RPC round trip failed.
#[derive(Debug)]
enum RpcFailure {
    /// Connection, HTTP status or malformed envelope. Eligible for failover.
    Transport(String),
    /// The node answered with a JSON-RPC error object.
    Node {
        code: i64,
        message: String,
        data: Option<Vec<u8>>,
    },
}

impl RpcFailure {
    fn into_error(self, method: &str) -> Error {
        match self {
            RpcFailure::Transport(msg) => Error::Rpc(format!("{method}: {msg}")),
            RpcFailure::Node {
                code,
                message,
                data,
            } => {
                if code == REVERT_ERROR_CODE || message.contains("revert") {
                    let reason = data
                        .as_deref()
                        .and_then(abi::decode_revert_reason)
                        .unwrap_or_else(|| {
                            message
                                .strip_prefix("execution reverted: ")
                                .unwrap_or(&message)
                                .to_string()
                        });
                    Error::from_revert(reason)
                } else {
                    Error::Rpc(format!("{method}: node error {code}: {message}"))
                }
            }
        }
    }
}

/// JSON-RPC ledger client. Reads retry with jittered backoff and fail over;
/// submissions go to the active node once.
pub struct RpcClient {
    http: reqwest::Client,
    primary_url: String,
    fallback_url: String,
    circuit: Mutex<CircuitState>,
    total_failovers: AtomicU64,
    next_id: AtomicU64,
    read_retries: u32,
    retry_base: Duration,
    relayer_account: OnceCell<Address>,
}

impl RpcClient {
    pub fn new(primary_url: &str, fallback_url: &str) -> Self {
        info!(
            primary = primary_url,
            fallback = fallback_url,
            "RPC client initialized with failover"
        );
        Self {
            http: reqwest::Client::new(),
            primary_url: primary_url.to_string(),
            fallback_url: fallback_url.to_string(),
            circuit: Mutex::new(CircuitState {
                failures: 0,
                last_failure_ms: 0,
                open: false,
            }),
            total_failovers: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
            read_retries: 3,
            retry_base: Duration::from_millis(200),
            relayer_account: OnceCell::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.rpc_url, &config.fallback_rpc_url)
            .with_retries(config.read_retries, Duration::from_millis(config.retry_base_ms))
    }

    pub fn with_retries(mut self, read_retries: u32, retry_base: Duration) -> Self {
        self.read_retries = read_retries;
        self.retry_base = retry_base;
        self
    }

    /// Pin the fee-paying account instead of asking the node.
    pub fn with_relayer_account(self, account: Address) -> Self {
        let _ = self.relayer_account.set(account);
        self
    }

    pub fn primary_url(&self) -> &str {
        &self.primary_url
    }

    pub fn fallback_url(&self) -> &str {
        &self.fallback_url
    }

    // --- Transport ---

    async fn post(&self, url: &str, method: &str, params: &Value) -> Result<Value, RpcFailure> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(RpcFailure::Transport(format!("HTTP {}", resp.status())));
        }
        let payload: Value = resp
            .json()
            .await
            .map_err(|e| RpcFailure::Transport(format!("invalid JSON-RPC body: {e}")))?;
        parse_envelope(payload)
    }

    /// One round trip against the active node, falling back once on transport failure.
    async fn with_failover(&self, method: &str, params: &Value) -> Result<Value, RpcFailure> {
        let circuit_open = self.is_circuit_open();
        let first = if circuit_open {
            &self.fallback_url
        } else {
            &self.primary_url
        };
        match self.post(first, method, params).await {
            Err(RpcFailure::Transport(e)) => {
                if circuit_open {
                    return Err(RpcFailure::Transport(e));
                }
                self.record_failure();
                warn!(method, error = %e, "Primary RPC failed, trying fallback");
                self.post(&self.fallback_url, method, params)
                    .await
                    .map_err(|e2| match e2 {
                        RpcFailure::Transport(e2) => RpcFailure::Transport(format!(
                            "failed on both RPCs: primary={e}, fallback={e2}"
                        )),
                        node => node,
                    })
            }
            other => {
                if !circuit_open {
                    self.record_success();
                }
                other
            }
        }
    }

    /// Read-only request with failover and jittered exponential backoff.
    async fn read(&self, method: &str, params: Value) -> Result<Value, Error> {
        let mut attempt = 0u32;
        loop {
            match self.with_failover(method, &params).await {
                Ok(value) => return Ok(value),
                Err(RpcFailure::Transport(e)) if attempt < self.read_retries => {
                    attempt += 1;
                    METRICS.rpc_retries.fetch_add(1, Ordering::Relaxed);
                    let delay = backoff(self.retry_base, attempt);
                    warn!(method, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying read");
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => return Err(failure.into_error(method)),
            }
        }
    }

    /// Fee-paying account managed by the node (`eth_accounts[0]` unless pinned).
    pub async fn relayer_account(&self) -> Result<Address, Error> {
        self.relayer_account
            .get_or_try_init(|| async {
                let accounts = self.read("eth_accounts", json!([])).await?;
                accounts
                    .get(0)
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<Address>().ok())
                    .ok_or_else(|| Error::Rpc("node manages no relayer account".into()))
            })
            .await
            .copied()
    }

    /// Quick connectivity check. Returns "ok", "degraded", or error.
    pub async fn health_check(&self) -> Result<&'static str, Error> {
        let params = json!([]);
        match self.post(&self.primary_url, "eth_blockNumber", &params).await {
            Ok(_) => Ok("ok"),
            Err(_) => match self.post(&self.fallback_url, "eth_blockNumber", &params).await {
                Ok(_) => Ok("degraded"),
                Err(e) => Err(Error::Rpc(format!("Both RPCs unreachable: {e:?}"))),
            },
        }
    }

    // --- Failover / circuit breaker ---

    fn record_success(&self) {
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        if circuit.failures > 0 {
            info!(primary = %self.primary_url, "Primary RPC recovered");
            circuit.failures = 0;
            circuit.open = false;
        }
    }

    fn record_failure(&self) {
        METRICS.rpc_errors.fetch_add(1, Ordering::Relaxed);
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        circuit.failures += 1;
        circuit.last_failure_ms = now_ms();
        if circuit.failures >= CIRCUIT_BREAKER_THRESHOLD && !circuit.open {
            circuit.open = true;
            self.total_failovers.fetch_add(1, Ordering::Relaxed);
            METRICS.rpc_failovers.fetch_add(1, Ordering::Relaxed);
            warn!(
                failures = circuit.failures,
                fallback = %self.fallback_url,
                "Circuit breaker opened, routing to fallback"
            );
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        if !circuit.open {
            return false;
        }
        if now_ms().saturating_sub(circuit.last_failure_ms) > CIRCUIT_BREAKER_WINDOW_MS {
            circuit.open = false;
            circuit.failures = 0;
            info!(primary = %self.primary_url, "Circuit breaker half-open, retrying primary");
            return false;
        }
        true
    }

    pub fn failover_count(&self) -> u64 {
        self.total_failovers.load(Ordering::Relaxed)
    }

    /// Currently active RPC URL.
    pub fn active_url(&self) -> &str {
        if self.is_circuit_open() {
            &self.fallback_url
        } else {
            &self.primary_url
        }
    }
}

#[async_trait]
impl Ledger for RpcClient {
    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, Error> {
        let params = json!([{"to": to, "data": hex_data(&data)}, "latest"]);
        let result = self.read("eth_call", params).await?;
        parse_bytes(&result)
    }

    async fn send_transaction(&self, to: Address, data: Vec<u8>) -> Result<B256, Error> {
        let from = self.relayer_account().await?;
        let params = json!([{"from": from, "to": to, "data": hex_data(&data)}]);
        let url = self.active_url().to_string();
        let result = self
            .post(&url, "eth_sendTransaction", &params)
            .await
            .map_err(|e| e.into_error("eth_sendTransaction"))?;
        result
            .as_str()
            .and_then(|s| s.parse::<B256>().ok())
            .ok_or_else(|| Error::Rpc(format!("eth_sendTransaction: bad hash {result}")))
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>, Error> {
        let result = self
            .read("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        parse_receipt(&result).map(Some)
    }

    async fn block_number(&self) -> Result<u64, Error> {
        let result = self.read("eth_blockNumber", json!([])).await?;
        parse_quantity(&result)
    }

    async fn chain_id(&self) -> Result<u64, Error> {
        let result = self.read("eth_chainId", json!([])).await?;
        debug!(chain_id = %result, "Chain id fetched");
        parse_quantity(&result)
    }
}

fn parse_envelope(payload: Value) -> Result<Value, RpcFailure> {
    if let Some(err) = payload.get("error") {
        let data = match err.get("data") {
            Some(Value::String(s)) => decode_hex(s).ok(),
            Some(Value::Object(obj)) => obj
                .get("data")
                .and_then(Value::as_str)
                .and_then(|s| decode_hex(s).ok()),
            _ => None,
        };
        return Err(RpcFailure::Node {
            code: err.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            data,
        });
    }
    payload
        .get("result")
        .cloned()
        .ok_or_else(|| RpcFailure::Transport("response has neither result nor error".into()))
}

fn parse_receipt(value: &Value) -> Result<Receipt, Error> {
    let field = |name: &str| {
        value
            .get(name)
            .ok_or_else(|| Error::Rpc(format!("receipt missing {name}")))
    };
    let tx_hash = field("transactionHash")?
        .as_str()
        .and_then(|s| s.parse::<B256>().ok())
        .ok_or_else(|| Error::Rpc("receipt has bad transactionHash".into()))?;
    Ok(Receipt {
        tx_hash,
        block_number: parse_quantity(field("blockNumber")?)?,
        success: parse_quantity(field("status")?)? == 1,
        revert_reason: value
            .get("revertReason")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn parse_quantity(value: &Value) -> Result<u64, Error> {
    let s = value
        .as_str()
        .ok_or_else(|| Error::Rpc(format!("expected hex quantity, got {value}")))?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| Error::Rpc(format!("bad hex quantity {s}: {e}")))
}

fn parse_bytes(value: &Value) -> Result<Vec<u8>, Error> {
    let s = value
        .as_str()
        .ok_or_else(|| Error::Rpc(format!("expected hex data, got {value}")))?;
    decode_hex(s).map_err(|e| Error::Rpc(format!("bad hex data: {e}")))
}

fn decode_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s.trim_start_matches("0x"))
}

fn hex_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// `base * 2^(attempt-1)` plus up to `base` of jitter.
fn backoff(base: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis() as u64;
    let exp = base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    let jitter = if base_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=base_ms)
    };
    Duration::from_millis(exp + jitter)
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
