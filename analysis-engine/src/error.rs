use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("strategy '{0}' setup returned false")]
    StrategySetupFailed(String),

    #[error("scanner '{0}' setup returned false")]
    ScannerSetupFailed(String),

    #[error("scanner '{0}' is in state {1:?}, cannot scan")]
    ScannerNotReady(String, crate::scanner::ScannerState),

    #[error("calendar lookup failed: {0}")]
    Calendar(#[from] session_data::error::CalendarError),
}
