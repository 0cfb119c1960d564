// Solana chain backend
// Deserializes the base64 message a route step carries into a versioned
// message, signs it as the fee payer, broadcasts it over JSON-RPC and polls
// signature statuses until the configured commitment is reached
//
// Numan Thabit 2025 Nov

use super::{poll_schedule, ChainBackend, Finality, StepTransaction};
use crate::errors::BackendError;
use crate::signing::SolanaKeypair;
use crate::transport::jsonrpc::JsonRpc;
use backoff::backoff::Backoff;
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use serde::Deserialize;
use serde_json::json;
use solana_sdk::{
    message::VersionedMessage, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};
use std::time::Duration;
use tracing::{debug, warn};

/// Named Solana commitment levels, ordered by strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

pub struct SolanaBackend {
    rpc: JsonRpc,
    keypair: SolanaKeypair,
    commitment: Commitment,
    poll_interval: Duration,
}

impl SolanaBackend {
    pub fn new(
        rpc: JsonRpc,
        keypair: SolanaKeypair,
        commitment: Commitment,
        poll_interval: Duration,
    ) -> Self {
        Self {
            rpc,
            keypair,
            commitment,
            poll_interval,
        }
    }

    pub fn pubkey(&self) -> String {
        self.keypair.pubkey_base58()
    }

    /// Decode, check and sign a step message, returning the serialized
    /// transaction ready for `sendTransaction`.
    pub fn sign_step(&self, tx: &StepTransaction) -> Result<Vec<u8>, BackendError> {
        if tx.value.is_some() {
            // native value travels inside the message's instructions
            warn!(to = %tx.to, "ignoring value field on solana step");
        }
        let raw = B64
            .decode(tx.data.trim())
            .map_err(|e| BackendError::BuildTx(format!("step data is not base64: {e}")))?;
        let message: VersionedMessage = bincode::deserialize(&raw)
            .map_err(|e| BackendError::BuildTx(format!("step data is not a solana message: {e}")))?;
        message
            .sanitize()
            .map_err(|e| BackendError::BuildTx(format!("malformed solana message: {e}")))?;

        let required = message.header().num_required_signatures;
        if required != 1 {
            return Err(BackendError::BuildTx(format!(
                "message requires {required} signatures, only the fee payer can sign"
            )));
        }
        let signer = Pubkey::new_from_array(self.keypair.pubkey());
        let fee_payer = *message
            .static_account_keys()
            .first()
            .ok_or_else(|| BackendError::BuildTx("message has no fee payer".to_string()))?;
        if fee_payer != signer {
            return Err(BackendError::Signing(format!(
                "message fee payer {fee_payer} is not the configured signer {signer}"
            )));
        }

        let signature = Signature::from(self.keypair.sign_message(&message.serialize()));
        let transaction = VersionedTransaction {
            signatures: vec![signature],
            message,
        };
        bincode::serialize(&transaction)
            .map_err(|e| BackendError::BuildTx(format!("serialize transaction: {e}")))
    }

    async fn poll_status(&self, signature: &str) -> Result<Finality, BackendError> {
        let mut schedule = poll_schedule(self.poll_interval);
        loop {
            let statuses: SignatureStatuses = self
                .rpc
                .call(
                    "getSignatureStatuses",
                    json!([[signature], { "searchTransactionHistory": true }]),
                )
                .await?;
            if let Some(Some(status)) = statuses.value.into_iter().next() {
                if let Some(err) = status.err {
                    return Ok(Finality::Failed(format!("transaction error: {err}")));
                }
                if status
                    .confirmation_status
                    .is_some_and(|level| level >= self.commitment)
                {
                    return Ok(Finality::Confirmed);
                }
                debug!(
                    signature,
                    status = ?status.confirmation_status,
                    "awaiting commitment"
                );
            }
            let wait = schedule.next_backoff().unwrap_or(self.poll_interval);
            tokio::time::sleep(wait).await;
        }
    }
}

impl ChainBackend for SolanaBackend {
    fn chain(&self) -> &str {
        "solana"
    }

    async fn submit(&self, tx: &StepTransaction) -> Result<String, BackendError> {
        let wire = self.sign_step(tx)?;
        let signature: String = self
            .rpc
            .call(
                "sendTransaction",
                json!([
                    B64.encode(&wire),
                    {
                        "encoding": "base64",
                        "preflightCommitment": self.commitment.as_str(),
                    }
                ]),
            )
            .await?;
        debug!(signature = %signature, endpoint = %self.rpc.endpoint(), "solana transaction sent");
        Ok(signature)
    }

    async fn await_finality(
        &self,
        submission_id: &str,
        timeout: Duration,
    ) -> Result<Finality, BackendError> {
        match tokio::time::timeout(timeout, self.poll_status(submission_id)).await {
            Ok(outcome) => outcome,
            Err(_) => Ok(Finality::TimedOut),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SignatureStatuses {
    value: Vec<Option<SignatureStatus>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    #[serde(default)]
    err: Option<serde_json::Value>,
    #[serde(default)]
    confirmation_status: Option<Commitment>,
}
