use thiserror::Error;

/// Validation failures surfaced while resolving a parameter declaration.
///
/// Every variant is a fail-fast construction/validation error; no partially
/// resolved state is ever returned alongside one of these.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Self reference: {0}")]
    SelfReference(String),

    #[error("Cyclic reference: {0}")]
    CyclicReference(String),

    #[error("Name collision: {0}")]
    Collision(String),

    #[error("Missing reference: {0}")]
    MissingReference(String),

    #[error("Duplicate reference: {0}")]
    DuplicateReference(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
