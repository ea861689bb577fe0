use thiserror::Error;

/// Raised by a [`crate::StreamSubscription`] consumer (the session coordinator) when a
/// clock-driven downstream never became ready within its budget.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("stream subscription '{edge}' overran its deadline ({overrun_count} total overruns)")]
pub struct OverrunError {
    pub edge: String,
    pub overrun_count: u64,
}
