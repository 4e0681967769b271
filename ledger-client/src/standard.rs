//! Production [`LedgerClient`] implementation backed by a JSON-RPC endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{LedgerError, Result};
use crate::traits::LedgerClient;
use crate::types::{Commitment, RawAccount, RawBlock, RawTransaction, SignatureInfo, SignaturePage};

/// A [`LedgerClient`] backed by a single JSON-RPC HTTP endpoint.
///
/// Retries transient errors (connection failures, timeouts, and rate-limit
/// responses) with exponential backoff capped at `max_backoff`. Each retry
/// adds a small amount of jitter derived from the request id so that
/// concurrent callers do not retry in lockstep.
#[derive(Debug)]
pub struct JsonRpcLedgerClient {
    http: reqwest::Client,
    endpoint: String,
    max_retries: usize,
    base_backoff: Duration,
    max_backoff: Duration,
    next_id: AtomicU64,
}

impl JsonRpcLedgerClient {
    /// Construct a client against `endpoint` with the given request timeout.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            endpoint: endpoint.into(),
            max_retries: 5,
            base_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            next_id: AtomicU64::new(1),
        }
    }

    /// Override the retry policy (mainly for tests).
    #[must_use]
    pub const fn with_retry_policy(
        mut self,
        max_retries: usize,
        base_backoff: Duration,
        max_backoff: Duration,
    ) -> Self {
        self.max_retries = max_retries;
        self.base_backoff = base_backoff;
        self.max_backoff = max_backoff;
        self
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut backoff = self.base_backoff;
        let mut attempt = 0usize;
        loop {
            let outcome = self.call_once(&body).await;
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries && err.is_retryable() => {
                    warn!(
                        method,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "retrying ledger RPC call"
                    );
                    tokio::time::sleep(jittered(backoff, id, attempt)).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn call_once(&self, body: &Value) -> Result<Value> {
        let resp = self
            .http
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(LedgerError::from)?;

        let envelope: Value = resp.json().await.map_err(LedgerError::from)?;

        if let Some(err) = envelope.get("error") {
            let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown RPC error")
                .to_string();
            return Err(LedgerError::rpc(code, message));
        }

        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| LedgerError::InvalidResponse("missing `result` field".into()))
    }
}

/// Deterministic jitter in `0..200ms`, derived from the request id and attempt
/// number so repeated retries of the same call don't all wake up together.
fn jittered(backoff: Duration, id: u64, attempt: usize) -> Duration {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    attempt.hash(&mut hasher);
    let jitter = Duration::from_millis(hasher.finish() % 200);
    backoff + jitter
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn list_signatures(
        &self,
        address: &str,
        page: SignaturePage,
    ) -> Result<Vec<SignatureInfo>> {
        let mut opts = json!({ "limit": page.limit });
        if let Some(before) = &page.before {
            opts["before"] = json!(before);
        }
        if let Some(until) = &page.until {
            opts["until"] = json!(until);
        }

        let result = self
            .call("getSignaturesForAddress", json!([address, opts]))
            .await?;

        let entries = result
            .as_array()
            .ok_or_else(|| LedgerError::InvalidResponse("expected array of signatures".into()))?;

        entries
            .iter()
            .map(|entry| {
                let signature = entry
                    .get("signature")
                    .and_then(Value::as_str)
                    .ok_or_else(|| LedgerError::InvalidResponse("missing signature".into()))?
                    .to_string();
                let slot = entry
                    .get("slot")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| LedgerError::InvalidResponse("missing slot".into()))?;
                let block_time = entry.get("blockTime").and_then(Value::as_i64);
                let err = entry.get("err").cloned().filter(|v| !v.is_null());
                Ok(SignatureInfo {
                    signature,
                    slot,
                    block_time,
                    err,
                })
            })
            .collect()
    }

    async fn fetch_transaction(
        &self,
        signature: &str,
        commitment: Commitment,
    ) -> Result<RawTransaction> {
        let result = self
            .call(
                "getTransaction",
                json!([
                    signature,
                    {
                        "encoding": "json",
                        "commitment": commitment.as_str(),
                        "maxSupportedTransactionVersion": 0,
                    }
                ]),
            )
            .await?;

        if result.is_null() {
            return Err(LedgerError::SignatureNotFound(signature.to_string()));
        }

        let slot = result
            .get("slot")
            .and_then(Value::as_u64)
            .ok_or_else(|| LedgerError::InvalidResponse("missing slot".into()))?;
        let block_time = result.get("blockTime").and_then(Value::as_i64);

        Ok(RawTransaction {
            signature: signature.to_string(),
            slot,
            block_time,
            raw: result,
        })
    }

    async fn fetch_account(&self, address: &str, commitment: Commitment) -> Result<RawAccount> {
        let result = self
            .call(
                "getAccountInfo",
                json!([
                    address,
                    { "encoding": "base64", "commitment": commitment.as_str() }
                ]),
            )
            .await?;

        let slot = result
            .get("context")
            .and_then(|c| c.get("slot"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let value = result.get("value").cloned().filter(|v| !v.is_null());

        debug!(address, slot, exists = value.is_some(), "fetched account");

        Ok(RawAccount {
            address: address.to_string(),
            slot,
            raw: value,
        })
    }

    async fn head_slot(&self, commitment: Commitment) -> Result<u64> {
        let result = self
            .call("getSlot", json!([{ "commitment": commitment.as_str() }]))
            .await?;
        result
            .as_u64()
            .ok_or_else(|| LedgerError::InvalidResponse("expected slot number".into()))
    }

    async fn fetch_block(&self, slot: u64, commitment: Commitment) -> Result<RawBlock> {
        let result = self
            .call(
                "getBlock",
                json!([
                    slot,
                    {
                        "encoding": "json",
                        "commitment": commitment.as_str(),
                        "transactionDetails": "signatures",
                        "maxSupportedTransactionVersion": 0,
                    }
                ]),
            )
            .await?;

        let signatures = result
            .get("signatures")
            .and_then(Value::as_array)
            .ok_or_else(|| LedgerError::InvalidResponse("missing block signatures".into()))?
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| LedgerError::InvalidResponse("non-string signature in block".into()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RawBlock { slot, signatures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn head_slot_parses_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": 123_456,
            })))
            .mount(&server)
            .await;

        let client = JsonRpcLedgerClient::new(server.uri(), Duration::from_secs(5));
        let slot = client.head_slot(Commitment::Confirmed).await.unwrap();
        assert_eq!(slot, 123_456);
    }

    #[tokio::test]
    async fn rpc_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32601, "message": "method not found" },
            })))
            .mount(&server)
            .await;

        let client = JsonRpcLedgerClient::new(server.uri(), Duration::from_secs(5))
            .with_retry_policy(0, Duration::from_millis(1), Duration::from_millis(10));
        let err = client.head_slot(Commitment::Confirmed).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rpc { code: -32601, .. }));
    }

    #[tokio::test]
    async fn missing_transaction_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": null,
            })))
            .mount(&server)
            .await;

        let client = JsonRpcLedgerClient::new(server.uri(), Duration::from_secs(5));
        let err = client
            .fetch_transaction("deadbeef", Commitment::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SignatureNotFound(_)));
    }
}
