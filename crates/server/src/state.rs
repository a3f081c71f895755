use condense_common::{AppConfig, Result};
use condense_llm::{Condenser, CondenserOptions, GeminiClient};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Pipeline shared by every request
    pub condenser: Arc<Condenser>,
}

impl AppState {
    /// Create new application state backed by the Gemini client
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = Arc::new(GeminiClient::from_config(&config)?);
        let condenser = Condenser::new(client, CondenserOptions::from_config(&config)?)?;
        Ok(Self::with_condenser(config, condenser))
    }

    pub fn with_condenser(config: AppConfig, condenser: Condenser) -> Self {
        Self {
            config,
            condenser: Arc::new(condenser),
        }
    }
}
