use async_trait::async_trait;
use condense_common::Result;
use tokio_util::sync::CancellationToken;

use crate::types::GenerateRequest;

/// Common trait for LLM clients
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate text from a prompt.
    ///
    /// Implementations must return `CondenseError::Cancelled` promptly once
    /// `cancel` fires.
    async fn generate(&self, request: GenerateRequest, cancel: &CancellationToken) -> Result<String>;
}
