// EVM chain backend
// Builds EIP-1559 transactions from route steps, signs them with a local
// wallet, and waits for receipts with a configurable confirmation depth
//
// Numan Thabit 2025 Nov

use super::{poll_schedule, ChainBackend, Finality, StepTransaction};
use crate::errors::BackendError;
use alloy::{
    network::{Ethereum, EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, U256},
    providers::{
        fillers::{
            BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
            WalletFiller,
        },
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    transports::{
        http::{Client, Http},
        RpcError, TransportError,
    },
};
use backoff::backoff::Backoff;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use url::Url;

type WalletProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<Http<Client>>,
    Http<Client>,
    Ethereum,
>;

pub struct EvmBackend {
    provider: WalletProvider,
    sender: Address,
    chain: String,
    /// Blocks that must include or follow the receipt's block
    confirmations: u64,
    poll_interval: Duration,
}

impl EvmBackend {
    pub fn new(
        chain: impl Into<String>,
        rpc_url: Url,
        signer: PrivateKeySigner,
        confirmations: u64,
        poll_interval: Duration,
    ) -> Self {
        let sender = signer.address();
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(signer))
            .on_http(rpc_url);
        Self {
            provider,
            sender,
            chain: chain.into(),
            confirmations: confirmations.max(1),
            poll_interval,
        }
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    async fn poll_receipt(&self, hash: TxHash) -> Result<Finality, BackendError> {
        let mut schedule = poll_schedule(self.poll_interval);
        loop {
            if let Some(receipt) = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(classify)?
            {
                let head = if receipt.status() && self.confirmations > 1 {
                    self.provider.get_block_number().await.map_err(classify)?
                } else {
                    0
                };
                if let Some(outcome) = receipt_finality(
                    receipt.status(),
                    receipt.block_number,
                    head,
                    self.confirmations,
                ) {
                    return Ok(outcome);
                }
                debug!(hash = %hash, block = ?receipt.block_number, head, "awaiting confirmations");
            }
            let wait = schedule.next_backoff().unwrap_or(self.poll_interval);
            tokio::time::sleep(wait).await;
        }
    }
}

/// Translate a step into a transaction request. `value` is only set when the
/// step carries a non-zero amount.
pub fn build_request(tx: &StepTransaction) -> Result<TransactionRequest, BackendError> {
    let to = Address::from_str(tx.to.trim())
        .map_err(|e| BackendError::BuildTx(format!("bad destination {}: {e}", tx.to)))?;
    let input = Bytes::from_str(tx.data.trim())
        .map_err(|e| BackendError::BuildTx(format!("call data is not hex: {e}")))?;
    let request = TransactionRequest::default().with_to(to).with_input(input);
    Ok(match tx.value {
        Some(value) => request.with_value(U256::from(value)),
        None => request,
    })
}

/// `None` while the receipt still needs confirmations.
fn receipt_finality(
    succeeded: bool,
    block: Option<u64>,
    head: u64,
    confirmations: u64,
) -> Option<Finality> {
    if !succeeded {
        return Some(Finality::Failed(match block {
            Some(block) => format!("reverted in block {block}"),
            None => "reverted".to_string(),
        }));
    }
    if confirmations <= 1 {
        return Some(Finality::Confirmed);
    }
    let block = block?;
    (head.saturating_sub(block) + 1 >= confirmations).then_some(Finality::Confirmed)
}

fn classify(err: TransportError) -> BackendError {
    match err {
        RpcError::Transport(kind) => BackendError::Transport(kind.to_string()),
        other => BackendError::Provider(other.to_string()),
    }
}

impl ChainBackend for EvmBackend {
    fn chain(&self) -> &str {
        &self.chain
    }

    async fn submit(&self, tx: &StepTransaction) -> Result<String, BackendError> {
        let request = build_request(tx)?;
        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(classify)?;
        let hash = pending.tx_hash().to_string();
        debug!(hash = %hash, from = %self.sender, "evm transaction sent");
        Ok(hash)
    }

    async fn await_finality(
        &self,
        submission_id: &str,
        timeout: Duration,
    ) -> Result<Finality, BackendError> {
        let hash = TxHash::from_str(submission_id)
            .map_err(|e| BackendError::Provider(format!("bad tx hash {submission_id}: {e}")))?;
        match tokio::time::timeout(timeout, self.poll_receipt(hash)).await {
            Ok(outcome) => outcome,
            Err(_) => Ok(Finality::TimedOut),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::parse_evm_signer;
    use alloy::primitives::{address, TxKind};
    use axum::{extract::State, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    // first anvil development key
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TX_HASH: &str = "0xabababababababababababababababababababababababababababababababab";

    fn step(value: Option<u128>) -> StepTransaction {
        StepTransaction {
            to: "0xc026395860Db2d07ee33e05fE50ed7bD583189C7".into(),
            data: "0x095ea7b3".into(),
            value,
        }
    }

    #[test]
    fn request_carries_destination_and_data() {
        let req = build_request(&step(None)).unwrap();
        assert_eq!(
            req.to,
            Some(TxKind::Call(address!("c026395860Db2d07ee33e05fE50ed7bD583189C7")))
        );
        assert_eq!(
            req.input.input().cloned(),
            Some(Bytes::from(vec![0x09, 0x5e, 0xa7, 0xb3]))
        );
        assert_eq!(req.value, None);
    }

    #[test]
    fn request_value_is_exact() {
        let req = build_request(&step(Some(1_000_000))).unwrap();
        assert_eq!(req.value, Some(U256::from(1_000_000u64)));
    }

    #[test]
    fn malformed_steps_are_build_errors() {
        let mut bad_to = step(None);
        bad_to.to = "not-an-address".into();
        assert!(matches!(build_request(&bad_to), Err(BackendError::BuildTx(_))));

        let mut bad_data = step(None);
        bad_data.data = "0xzz".into();
        assert!(matches!(build_request(&bad_data), Err(BackendError::BuildTx(_))));
    }

    #[test]
    fn confirmation_depth_rule() {
        assert_eq!(receipt_finality(true, Some(10), 0, 1), Some(Finality::Confirmed));
        assert_eq!(receipt_finality(true, Some(10), 11, 3), None);
        assert_eq!(receipt_finality(true, Some(10), 12, 3), Some(Finality::Confirmed));
        assert_eq!(receipt_finality(true, None, 12, 3), None);
        assert_eq!(
            receipt_finality(false, Some(10), 0, 3),
            Some(Finality::Failed("reverted in block 10".into()))
        );
    }

    #[derive(Clone, Default)]
    struct MockNode {
        calls: Arc<Mutex<Vec<String>>>,
        raw: Arc<Mutex<Vec<String>>>,
        /// receipts for successive eth_getTransactionReceipt calls; the last one repeats
        receipts: Arc<Mutex<Vec<Value>>>,
        /// heads for successive eth_blockNumber calls; the last one repeats
        heads: Arc<Mutex<Vec<u64>>>,
        reject_all: bool,
    }

    impl MockNode {
        fn count(&self, method: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|m| *m == method).count()
        }
    }

    fn next<T: Clone>(queue: &Mutex<Vec<T>>, empty: T) -> T {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.remove(0)
        } else {
            queue.first().cloned().unwrap_or(empty)
        }
    }

    fn receipt(succeeded: bool, block: u64) -> Value {
        let status = if succeeded { "0x1" } else { "0x0" };
        json!({
            "type": "0x2",
            "status": status,
            "cumulativeGasUsed": "0x5208",
            "logs": [],
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "transactionHash": TX_HASH,
            "transactionIndex": "0x0",
            "blockHash": format!("0x{}", "11".repeat(32)),
            "blockNumber": format!("{block:#x}"),
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "to": "0xc026395860db2d07ee33e05fe50ed7bd583189c7",
            "contractAddress": null
        })
    }

    async fn handle(State(node): State<MockNode>, Json(req): Json<Value>) -> Json<Value> {
        let method = req["method"].as_str().unwrap_or_default().to_string();
        node.calls.lock().unwrap().push(method.clone());
        if node.reject_all {
            return Json(json!({
                "jsonrpc": "2.0",
                "id": req["id"],
                "error": { "code": -32000, "message": "header not found" }
            }));
        }
        let result = match method.as_str() {
            "eth_chainId" => json!("0x1"),
            "eth_getTransactionCount" => json!("0x0"),
            "eth_estimateGas" => json!("0x5208"),
            "eth_gasPrice" | "eth_maxPriorityFeePerGas" => json!("0x3b9aca00"),
            "eth_feeHistory" => json!({
                "oldestBlock": "0x9",
                "baseFeePerGas": ["0x3b9aca00", "0x3b9aca00"],
                "gasUsedRatio": [0.5],
                "reward": [["0x3b9aca00"]]
            }),
            "eth_sendRawTransaction" => {
                let raw = req["params"][0].as_str().unwrap_or_default().to_string();
                node.raw.lock().unwrap().push(raw);
                json!(TX_HASH)
            }
            "eth_getTransactionReceipt" => next(&node.receipts, Value::Null),
            "eth_blockNumber" => json!(format!("{:#x}", next(&node.heads, 0))),
            _ => {
                return Json(json!({
                    "jsonrpc": "2.0",
                    "id": req["id"],
                    "error": { "code": -32601, "message": "method not found" }
                }))
            }
        };
        Json(json!({ "jsonrpc": "2.0", "id": req["id"], "result": result }))
    }

    async fn spawn(node: MockNode) -> Url {
        let app = Router::new().route("/", post(handle)).with_state(node);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    fn backend(url: Url, confirmations: u64) -> EvmBackend {
        EvmBackend::new(
            "ethereum",
            url,
            parse_evm_signer(DEV_KEY).unwrap(),
            confirmations,
            Duration::from_millis(5),
        )
    }

    #[tokio::test]
    async fn submit_fills_signs_and_broadcasts() {
        let node = MockNode::default();
        let backend = backend(spawn(node.clone()).await, 1);
        assert_eq!(
            backend.sender(),
            address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );

        let hash = backend.submit(&step(Some(1_000_000))).await.unwrap();
        assert_eq!(hash, TX_HASH);

        let raw = node.raw.lock().unwrap().clone();
        assert_eq!(raw.len(), 1);
        // EIP-1559 typed envelope
        assert!(raw[0].starts_with("0x02"), "{}", raw[0]);
        assert_eq!(node.count("eth_chainId"), 1);
        assert_eq!(node.count("eth_getTransactionCount"), 1);
    }

    #[tokio::test]
    async fn pending_receipt_is_polled_until_mined() {
        let node = MockNode::default();
        *node.receipts.lock().unwrap() = vec![Value::Null, Value::Null, receipt(true, 10)];
        let backend = backend(spawn(node.clone()).await, 1);

        let outcome = backend
            .await_finality(TX_HASH, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, Finality::Confirmed);
        assert_eq!(node.count("eth_getTransactionReceipt"), 3);
        assert_eq!(node.count("eth_blockNumber"), 0);
    }

    #[tokio::test]
    async fn reverted_receipt_is_failed() {
        let node = MockNode::default();
        *node.receipts.lock().unwrap() = vec![receipt(false, 10)];
        let backend = backend(spawn(node).await, 3);

        let outcome = backend
            .await_finality(TX_HASH, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, Finality::Failed("reverted in block 10".into()));
    }

    #[tokio::test]
    async fn waits_for_confirmation_depth() {
        let node = MockNode::default();
        *node.receipts.lock().unwrap() = vec![receipt(true, 10)];
        *node.heads.lock().unwrap() = vec![10, 11, 12];
        let backend = backend(spawn(node.clone()).await, 3);

        let outcome = backend
            .await_finality(TX_HASH, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, Finality::Confirmed);
        assert_eq!(node.count("eth_blockNumber"), 3);
    }

    #[tokio::test]
    async fn missing_receipt_times_out() {
        let backend = backend(spawn(MockNode::default()).await, 1);
        let outcome = backend
            .await_finality(TX_HASH, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(outcome, Finality::TimedOut);
    }

    #[tokio::test]
    async fn node_errors_are_classified() {
        let node = MockNode {
            reject_all: true,
            ..Default::default()
        };
        let rejecting = backend(spawn(node).await, 1);
        assert!(matches!(
            rejecting.await_finality(TX_HASH, Duration::from_secs(5)).await,
            Err(BackendError::Provider(_))
        ));
        assert!(matches!(
            rejecting.submit(&step(None)).await,
            Err(BackendError::Provider(_))
        ));

        // bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let unreachable = backend(Url::parse(&format!("http://{addr}/")).unwrap(), 1);
        assert!(matches!(
            unreachable.await_finality(TX_HASH, Duration::from_secs(5)).await,
            Err(BackendError::Transport(_))
        ));
        assert!(matches!(
            unreachable.submit(&step(None)).await,
            Err(BackendError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn malformed_submission_id_is_rejected() {
        let backend = backend(Url::parse("http://127.0.0.1:1/").unwrap(), 1);
        assert!(matches!(
            backend.await_finality("0x1234", Duration::from_secs(1)).await,
            Err(BackendError::Provider(_))
        ));
    }
}
