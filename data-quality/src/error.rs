use thiserror::Error;

#[derive(Debug, Error)]
pub enum QualityError {
    #[error("calendar lookup failed: {0}")]
    Calendar(#[from] session_data::error::CalendarError),

    #[error("bar repository error during gap fill: {0}")]
    Repository(#[from] session_data::error::RepositoryError),

    #[error("no exchange group registered for symbol '{0}'")]
    UnknownSymbol(String),
}
