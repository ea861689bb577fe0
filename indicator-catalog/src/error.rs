use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndicatorError {
    #[error("unknown indicator '{0}'")]
    UnknownIndicator(String),

    #[error("indicator '{name}' requires carry state of a different shape than it was given")]
    CarryMismatch { name: &'static str },
}
