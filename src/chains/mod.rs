// Chain backends
// This file defines the signing/broadcast capability the route executor
// drives, and the per-family backends that implement it
//
// Numan Thabit 2025 Nov

pub mod evm;
pub mod solana;

use crate::errors::BackendError;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

pub use evm::EvmBackend;
pub use solana::SolanaBackend;

/// Chain-native transaction built from one route step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTransaction {
    pub to: String,
    pub data: String,
    /// Native value to transfer; `None` means the value field is omitted entirely
    pub value: Option<u128>,
}

/// Terminal outcome of waiting on a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finality {
    Confirmed,
    Failed(String),
    /// The wait ran out; the transaction may still land
    TimedOut,
}

/// Signing, broadcast and confirmation for one chain family.
///
/// Implementations own the account they sign with and apply their chain's
/// finality rule; the executor never second-guesses either.
#[allow(async_fn_in_trait)]
pub trait ChainBackend {
    /// Short label used in logs and metrics
    fn chain(&self) -> &str;

    /// Sign and broadcast, returning the submission identifier.
    async fn submit(&self, tx: &StepTransaction) -> Result<String, BackendError>;

    /// Block until the submission is final, failed, or `timeout` elapses.
    async fn await_finality(
        &self,
        submission_id: &str,
        timeout: Duration,
    ) -> Result<Finality, BackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Evm,
    Solana,
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFamily::Evm => f.write_str("evm"),
            ChainFamily::Solana => f.write_str("solana"),
        }
    }
}

/// Backend selected by the caller at startup.
pub enum Backend {
    Evm(EvmBackend),
    Solana(SolanaBackend),
}

impl ChainBackend for Backend {
    fn chain(&self) -> &str {
        match self {
            Backend::Evm(b) => b.chain(),
            Backend::Solana(b) => b.chain(),
        }
    }

    async fn submit(&self, tx: &StepTransaction) -> Result<String, BackendError> {
        match self {
            Backend::Evm(b) => b.submit(tx).await,
            Backend::Solana(b) => b.submit(tx).await,
        }
    }

    async fn await_finality(
        &self,
        submission_id: &str,
        timeout: Duration,
    ) -> Result<Finality, BackendError> {
        match self {
            Backend::Evm(b) => b.await_finality(submission_id, timeout).await,
            Backend::Solana(b) => b.await_finality(submission_id, timeout).await,
        }
    }
}

/// Exponential polling schedule shared by the backends; the caller bounds the
/// total wait with its own timeout.
pub(crate) fn poll_schedule(initial: Duration) -> backoff::ExponentialBackoff {
    backoff::ExponentialBackoff {
        current_interval: initial,
        initial_interval: initial,
        max_interval: initial.saturating_mul(8).max(Duration::from_secs(1)),
        max_elapsed_time: None,
        multiplier: 1.5,
        ..Default::default()
    }
}
