use crate::error::DomainResult;
use async_trait::async_trait;

/// Trait for the external confidentiality transform.
///
/// Implementations replace a plaintext payload with its transformed
/// equivalent. The result is fail-closed: callers must inspect it and drop
/// the event on any error rather than persisting the plaintext.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CipherGateway: Send + Sync {
    /// Transform a payload, returning the replacement text
    async fn encrypt(&self, text: &str) -> DomainResult<String>;
}
