use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Fit attempted on a corpus with no usable text.
    #[error("Empty corpus: {0}")]
    EmptyCorpus(String),

    /// Transform or recommend attempted before the first successful fit.
    #[error("No vector model has been fitted yet")]
    ModelNotFitted,

    #[error("Validation error: {0}")]
    Validation(String),

    /// Every selected item vectorized to the zero vector.
    #[error("Insufficient signal: none of the {0} selected items has usable text")]
    InsufficientSignal(usize),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether the caller must fix its input, as opposed to a missing precondition
    /// or an internal failure.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::InsufficientSignal(_) | Error::InvalidDimension { .. }
        )
    }
}
