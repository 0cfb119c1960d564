// Error types and error handling module
// This file defines the fetch-time, execution-time and chain backend
// error taxonomy for stargate-exec
//
// Numan Thabit 2025 Nov

use thiserror::Error;

/// Errors raised by the route fetcher. None of them are retried locally.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid transfer request: {0}")]
    InvalidRequest(String),
    #[error("transport error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },
    #[error("upstream returned http {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("response format error: {0}")]
    ResponseFormat(String),
}

/// Errors raised by a chain backend while submitting or polling a transaction.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("signing error: {0}")]
    Signing(String),
    #[error("build tx error: {0}")]
    BuildTx(String),
}

/// Errors raised by the route executor. `step` is the 0-based step index.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("no usable route returned by the quote service")]
    NoRoute,
    #[error("route has no steps")]
    EmptyRoute,
    #[error("step {} failed (submission: {}): {reason}", .step + 1, .submission_id.as_deref().unwrap_or("none"))]
    StepExecution {
        step: usize,
        submission_id: Option<String>,
        reason: String,
    },
    #[error("step {} confirmation timed out; outcome of {submission_id} is unknown", .step + 1)]
    ConfirmationTimeout { step: usize, submission_id: String },
    /// Polling broke off after a successful submit; the transaction may have landed.
    #[error("step {} confirmation failed; outcome of {submission_id} is unknown: {reason}", .step + 1)]
    ConfirmationUnknown {
        step: usize,
        submission_id: String,
        reason: String,
    },
    #[error("cancelled at step {} (submission: {})", .step + 1, .submission_id.as_deref().unwrap_or("none"))]
    Cancelled {
        step: usize,
        submission_id: Option<String>,
    },
}

impl ExecError {
    /// Step the run stopped at, if it got as far as a step.
    pub fn step(&self) -> Option<usize> {
        match self {
            ExecError::NoRoute | ExecError::EmptyRoute => None,
            ExecError::StepExecution { step, .. }
            | ExecError::ConfirmationTimeout { step, .. }
            | ExecError::ConfirmationUnknown { step, .. }
            | ExecError::Cancelled { step, .. } => Some(*step),
        }
    }

    /// Submission identifier of the step that stopped the run, if one was obtained.
    pub fn submission_id(&self) -> Option<&str> {
        match self {
            ExecError::NoRoute | ExecError::EmptyRoute => None,
            ExecError::StepExecution { submission_id, .. }
            | ExecError::Cancelled { submission_id, .. } => submission_id.as_deref(),
            ExecError::ConfirmationTimeout { submission_id, .. }
            | ExecError::ConfirmationUnknown { submission_id, .. } => Some(submission_id),
        }
    }

    /// Whether the outcome of the last submitted transaction is unknown.
    /// Callers must look the submission up on-chain before resuming at `step()`.
    pub fn is_inconclusive(&self) -> bool {
        match self {
            ExecError::ConfirmationTimeout { .. } | ExecError::ConfirmationUnknown { .. } => true,
            ExecError::Cancelled { submission_id, .. } => submission_id.is_some(),
            _ => false,
        }
    }
}

/// Errors raised while decoding key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid key encoding: {0}")]
    Encoding(String),
    #[error("bad secret key size: {0}, expected {1} bytes")]
    Length(usize, usize),
    #[error("public key half does not match secret key")]
    Mismatch,
}
