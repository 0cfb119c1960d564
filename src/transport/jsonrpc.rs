// JSON-RPC transport layer implementation
// This file implements the JSON-RPC 2.0 client used to talk to Solana
// RPC nodes over HTTP
//
// Numan Thabit 2025 Nov

use crate::errors::BackendError;
use crate::metrics::{REQ_ERRORS, REQ_LATENCY};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug)]
pub struct JsonRpc {
    http: Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpc {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| BackendError::Transport(format!("build jsonrpc client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.url
    }

    /// Call `method` and decode its `result` member.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, BackendError> {
        let _timer = REQ_LATENCY
            .with_label_values(&["jsonrpc", method])
            .start_timer();
        let result = self.call_inner(method, params).await;
        if result.is_err() {
            REQ_ERRORS.with_label_values(&["jsonrpc", method]).inc();
        }
        result
    }

    async fn call_inner<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, BackendError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let resp = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("jsonrpc send: {e}")))?;
        if !resp.status().is_success() {
            return Err(BackendError::Provider(format!("http {}", resp.status())));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| BackendError::Transport(format!("json parse: {e}")))?;
        if let Some(err) = body.get("error") {
            return Err(BackendError::Provider(err.to_string()));
        }
        serde_json::from_value(body["result"].clone())
            .map_err(|e| BackendError::Provider(format!("decode {method} result: {e}")))
    }
}
