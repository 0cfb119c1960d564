// Route types and route selection logic
// This file defines the transfer request, the routes and steps returned by
// the Stargate quote service, per-step execution records, and the selection
// of one route out of the candidate list
//
// Numan Thabit 2025 Nov

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Parameters of one cross-chain transfer. Built once before fetching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub src_token: String,
    pub dst_token: String,
    pub src_address: String,
    pub dst_address: String,
    pub src_chain_key: String,
    pub dst_chain_key: String,
    /// Amount to send, in the source token's smallest unit
    pub src_amount: u128,
    /// Minimum amount to receive after fees, in the destination token's smallest unit
    pub dst_amount_min: u128,
}

impl TransferRequest {
    /// Query parameters in the order the quote service documents them.
    pub fn query_pairs(&self) -> [(&'static str, String); 8] {
        [
            ("srcToken", self.src_token.clone()),
            ("dstToken", self.dst_token.clone()),
            ("srcAddress", self.src_address.clone()),
            ("dstAddress", self.dst_address.clone()),
            ("srcChainKey", self.src_chain_key.clone()),
            ("dstChainKey", self.dst_chain_key.clone()),
            ("srcAmount", self.src_amount.to_string()),
            ("dstAmountMin", self.dst_amount_min.to_string()),
        ]
    }
}

/// Body of a `/routes` or `/quotes` response.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutesResponse {
    #[serde(default)]
    pub routes: Option<Vec<Route>>,
    #[serde(default)]
    pub quotes: Option<Vec<Route>>,
}

impl RoutesResponse {
    /// Candidate routes, preferring `routes` over `quotes` when both are present.
    pub fn into_routes(self) -> Option<Vec<Route>> {
        self.routes.or(self.quotes)
    }
}

/// One candidate transfer path. Steps are in executable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Route name, e.g. `stargate/v2/taxi`, `stargate/bus` or `cctp`
    #[serde(default)]
    pub route: Option<String>,
    /// Set by the service when this route cannot be used
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub src_amount: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub dst_amount: Option<String>,
    #[serde(default)]
    pub duration: Option<RouteDuration>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Route {
    pub fn name(&self) -> &str {
        self.route.as_deref().unwrap_or("unnamed")
    }

    pub fn is_usable(&self) -> bool {
        matches!(self.error, None | Some(serde_json::Value::Null)) && !self.steps.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteDuration {
    /// Estimated delivery time in seconds
    #[serde(default)]
    pub estimated: Option<u64>,
}

/// One transaction of a route, as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Step kind, e.g. `approve` or `bridge`
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub chain_key: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    pub transaction: TxDescriptor,
}

/// Opaque transaction payload of a step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TxDescriptor {
    pub to: String,
    /// Hex call data for EVM chains, base64 serialized message for Solana
    pub data: String,
    #[serde(default)]
    pub from: Option<String>,
    /// Native value in the chain's smallest unit; absent or "0" means no transfer
    #[serde(default, deserialize_with = "string_or_number")]
    pub value: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    match raw {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Pick the route to execute: the first usable route named `preferred` if
/// given, else the first usable route.
pub fn select_route<'a>(routes: &'a [Route], preferred: Option<&str>) -> Option<&'a Route> {
    let mut usable = routes.iter().filter(|r| r.is_usable());
    match preferred {
        Some(name) => usable.find(|r| r.route.as_deref() == Some(name)),
        None => usable.next(),
    }
}

/// Per-step confirmation status: `Pending` once submitted, then `Confirmed`
/// or `Failed`. Returned results are always `Confirmed` because a failed step
/// ends the run with an `ExecError`; the other states show up in step logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Record of one executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// 0-based index of the step within its route
    pub step: usize,
    /// Transaction hash (EVM) or signature (Solana)
    pub submission_id: String,
    pub status: StepStatus,
    /// Time from submission to finality
    pub elapsed: Duration,
}
