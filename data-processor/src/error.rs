use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("indicator catalog error: {0}")]
    Indicator(#[from] indicator_catalog::IndicatorError),
}

/// Error type for the Processor's downstream notification channels.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("downstream notification channel closed")]
    Closed,
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for NotifyError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        NotifyError::Closed
    }
}
