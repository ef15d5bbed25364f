//! Ethereum JSON-RPC client over HTTP.
//!
//! Read-only calls fail over across the configured endpoints with exponential
//! backoff. Transaction submission goes to the primary endpoint only and is
//! never retried.

use std::time::Duration;

use alloy_primitives::U256;
use reqwest::Client;
use serde_json::{json, Value};

use super::ChainError;
use crate::config::RpcConfig;

pub struct RpcClient {
    pub primary_url: String,
    pub fallback_urls: Vec<String>,
    http: Client,
}

impl RpcClient {
    pub fn from_config(cfg: &RpcConfig) -> Result<Self, ChainError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;

        Ok(Self {
            primary_url: cfg.url.clone(),
            fallback_urls: cfg.fallback_urls.clone(),
            http,
        })
    }

    fn body(method: &str, params: &Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        })
    }

    /// Single request against one URL.
    async fn request(&self, url: &str, method: &str, params: &Value) -> Result<Value, ChainError> {
        let resp = self
            .http
            .post(url)
            .json(&Self::body(method, params))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ChainError::Transport(format!(
                "{url} returned HTTP {}",
                resp.status()
            )));
        }

        let json: Value = resp.json().await?;
        if let Some(err) = json.get("error") {
            if !err.is_null() {
                let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
                let mut message = err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                if let Some(data) = err.get("data").and_then(Value::as_str) {
                    message = format!("{message} ({data})");
                }
                return Err(ChainError::Rpc { code, message });
            }
        }
        Ok(json.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Call with failover and exponential backoff. JSON-RPC error objects are
    /// returned immediately since another node would answer the same.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let urls: Vec<&String> = std::iter::once(&self.primary_url)
            .chain(self.fallback_urls.iter())
            .collect();
        let max_attempts = urls.len();
        let mut backoff_ms = 100u64;
        let mut last_err = ChainError::Transport("no RPC endpoints configured".into());

        for (attempt, url) in urls.into_iter().enumerate() {
            if attempt > 0 {
                tracing::debug!(backoff_ms, method, "backing off before RPC retry");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(10_000);
            }

            match self.request(url, method, &params).await {
                Ok(v) => {
                    if attempt > 0 {
                        tracing::info!(url = %url, method, attempt = attempt + 1, "RPC request succeeded after retry");
                    }
                    return Ok(v);
                }
                Err(e @ ChainError::Rpc { .. }) => {
                    tracing::warn!(method, error = %e, "RPC returned error response");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        url = %url,
                        method,
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts,
                        "RPC request failed"
                    );
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }

    /// Call the primary endpoint exactly once.
    pub async fn call_once(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        self.request(&self.primary_url, method, &params).await
    }

    // ---- typed helpers ----

    pub async fn eth_call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let result = self
            .call(
                "eth_call",
                json!([{ "to": to, "data": format!("0x{}", hex::encode(data)) }, "latest"]),
            )
            .await?;
        decode_hex_data(&result)
    }

    pub async fn gas_price(&self) -> Result<U256, ChainError> {
        parse_quantity(&self.call("eth_gasPrice", json!([])).await?)
    }

    pub async fn transaction_count(&self, address: &str) -> Result<u64, ChainError> {
        let v = self
            .call("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        quantity_to_u64(&v)
    }

    pub async fn estimate_gas(&self, from: &str, to: &str, data: &[u8]) -> Result<u64, ChainError> {
        let v = self
            .call(
                "eth_estimateGas",
                json!([{ "from": from, "to": to, "data": format!("0x{}", hex::encode(data)) }]),
            )
            .await?;
        quantity_to_u64(&v)
    }

    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, ChainError> {
        let v = self
            .call_once(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| ChainError::Decode(format!("unexpected tx hash: {v}")))
    }

    /// `None` while the transaction is still pending.
    pub async fn transaction_receipt(&self, hash: &str) -> Result<Option<Value>, ChainError> {
        let v = self.call("eth_getTransactionReceipt", json!([hash])).await?;
        Ok(if v.is_null() { None } else { Some(v) })
    }
}

/// Parse a hex quantity such as `"0x1a"`.
pub fn parse_quantity(v: &Value) -> Result<U256, ChainError> {
    let s = v
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("expected hex quantity, got {v}")))?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|e| ChainError::Decode(format!("{s}: {e}")))
}

fn quantity_to_u64(v: &Value) -> Result<u64, ChainError> {
    let q = parse_quantity(v)?;
    if q > U256::from(u64::MAX) {
        return Err(ChainError::Decode(format!("quantity too large: {v}")));
    }
    Ok(q.as_limbs()[0])
}

pub fn decode_hex_data(v: &Value) -> Result<Vec<u8>, ChainError> {
    let s = v
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("expected hex data, got {v}")))?;
    hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|e| ChainError::Decode(e.to_string()))
}
