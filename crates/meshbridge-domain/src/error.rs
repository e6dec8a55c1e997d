use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("status payload is not a JSON object: {0}")]
    InvalidStatusPayload(String),

    #[error("cipher endpoint not configured")]
    CipherEndpointMissing,

    #[error("cipher transform failed: {0}")]
    CipherTransformFailed(String),

    #[error("repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;
