// Router module - route model, selection, validation and execution
// This file ties the quote service's route shape to the sequential executor
//
// Numan Thabit 2025 Nov

pub mod execution;
pub mod routes;
pub mod validation;

pub use execution::{cancel_pair, CancelHandle, CancelSignal, ExecutorState, RouteExecutor};
pub use routes::{
    select_route, ExecutionResult, Route, Step, StepStatus, TransferRequest, TxDescriptor,
};
