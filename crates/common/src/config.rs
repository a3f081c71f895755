use crate::error::CondenseError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Condense application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server bind address
    pub server_host: String,

    /// Server port
    pub server_port: u16,

    /// API key for the LLM service
    #[serde(default, skip_serializing)]
    pub api_key: String,

    /// LLM API base URL
    pub llm_base_url: String,

    /// Model used to condense segments
    pub llm_model: String,

    /// Model used for the speaker analysis pass
    pub analysis_model: String,

    /// Timeout for a single condensation call
    pub llm_timeout: Duration,

    /// Timeout for the speaker analysis call
    pub analysis_timeout: Duration,

    /// Attempts per LLM call (1 = no retry)
    pub llm_max_retries: u32,

    /// Maximum number of segments processed at once
    pub max_concurrent: usize,

    /// Deadline for processing one request
    pub request_timeout: Duration,

    /// Target words per segment
    pub chunk_size: usize,

    /// Words shared by neighbouring transcript windows
    pub chunk_overlap: usize,

    /// What to do with transcript lines that have no speaker label ("drop" or "append")
    pub orphan_lines: String,

    /// Log directory
    pub log_dir: PathBuf,

    /// Log level
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            api_key: String::new(),
            llm_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            llm_model: "gemini-1.5-flash".to_string(),
            analysis_model: "gemini-2.0-flash".to_string(),
            llm_timeout: Duration::from_secs(60),
            analysis_timeout: Duration::from_secs(90),
            llm_max_retries: 1,
            max_concurrent: 10,
            request_timeout: Duration::from_secs(300),
            chunk_size: 900,
            chunk_overlap: 100,
            orphan_lines: "drop".to_string(),
            log_dir: PathBuf::from("./log"),
            log_level: "info".to_string(),
        }
    }
}

/// Messages gathered while loading configuration.
///
/// Loading happens before any subscriber is installed, so callers emit these
/// once logging is up.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigDiagnostics {
    /// Fallbacks and missing settings
    pub warnings: Vec<String>,

    /// Informational notes
    pub notes: Vec<String>,
}

impl ConfigDiagnostics {
    fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn note(&mut self, msg: impl Into<String>) {
        self.notes.push(msg.into());
    }

    /// Log every gathered message through tracing
    pub fn emit(&self) {
        for note in &self.notes {
            info!("{}", note);
        }
        for warning in &self.warnings {
            warn!("{}", warning);
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and .env file.
    ///
    /// Returns the diagnostics produced while loading; log them with
    /// [`ConfigDiagnostics::emit`] after the logger is set up.
    pub fn from_env() -> Result<(Self, ConfigDiagnostics), CondenseError> {
        // Load .env file (ignore if not exists)
        let _ = dotenv::dotenv();

        let defaults = Self::default();
        let mut diagnostics = ConfigDiagnostics::default();

        let api_key = ["LLM_API_KEY", "GEMINI_API_KEY", "OPENROUTER_API_KEY"]
            .iter()
            .find_map(|key| Self::get_env(key))
            .unwrap_or_default();
        if api_key.is_empty() {
            diagnostics.warn("LLM API key not set (LLM_API_KEY); every LLM call will be rejected");
        } else {
            diagnostics.note("LLM API key: [REDACTED]");
        }

        let d = &mut diagnostics;
        let config = Self {
            server_host: Self::get_env("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: Self::get_env_parsed("PORT", defaults.server_port, d),
            api_key,
            llm_base_url: Self::get_env("LLM_BASE_URL").unwrap_or(defaults.llm_base_url),
            llm_model: Self::get_env("LLM_MODEL").unwrap_or(defaults.llm_model),
            analysis_model: Self::get_env("ANALYSIS_MODEL").unwrap_or(defaults.analysis_model),
            llm_timeout: Self::get_env_secs("LLM_TIMEOUT_SECS", defaults.llm_timeout, d),
            analysis_timeout: Self::get_env_secs("ANALYSIS_TIMEOUT_SECS", defaults.analysis_timeout, d),
            llm_max_retries: Self::get_env_parsed("LLM_MAX_RETRIES", defaults.llm_max_retries, d),
            max_concurrent: Self::get_env_parsed("MAX_CONCURRENT", defaults.max_concurrent, d),
            request_timeout: Self::get_env_secs("REQUEST_TIMEOUT_SECS", defaults.request_timeout, d),
            chunk_size: Self::get_env_parsed("CHUNK_SIZE", defaults.chunk_size, d),
            chunk_overlap: Self::get_env_parsed("CHUNK_OVERLAP", defaults.chunk_overlap, d),
            orphan_lines: Self::get_env("ORPHAN_LINES").unwrap_or(defaults.orphan_lines),
            log_dir: Self::get_env("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            log_level: Self::get_env("LOG_LEVEL").unwrap_or(defaults.log_level),
        };

        config.validate()?;

        Ok((config, diagnostics))
    }

    /// Get a non-empty environment variable
    fn get_env(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    /// Parse an environment variable, falling back to the default on absence or error
    fn get_env_parsed<T>(key: &str, default: T, diagnostics: &mut ConfigDiagnostics) -> T
    where
        T: FromStr + std::fmt::Display,
        T::Err: std::fmt::Display,
    {
        match Self::get_env(key) {
            Some(raw) => match raw.trim().parse() {
                Ok(value) => value,
                Err(e) => {
                    diagnostics.warn(format!(
                        "Failed to parse {} ('{}'): {}, using default: {}",
                        key, raw, e, default
                    ));
                    default
                }
            },
            None => default,
        }
    }

    /// Parse a duration given in whole seconds
    fn get_env_secs(key: &str, default: Duration, diagnostics: &mut ConfigDiagnostics) -> Duration {
        Duration::from_secs(Self::get_env_parsed(key, default.as_secs(), diagnostics))
    }

    /// Get server bind address (host:port)
    pub fn server_bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), CondenseError> {
        if self.chunk_size == 0 {
            return Err(CondenseError::config("CHUNK_SIZE must be greater than 0"));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(CondenseError::config(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if self.max_concurrent == 0 {
            return Err(CondenseError::config("MAX_CONCURRENT must be greater than 0"));
        }

        if !self.llm_base_url.starts_with("http://") && !self.llm_base_url.starts_with("https://") {
            return Err(CondenseError::config(
                "LLM base URL must start with http:// or https://",
            ));
        }

        if self.server_port == 0 {
            return Err(CondenseError::config("Server port cannot be 0"));
        }

        if !matches!(self.orphan_lines.to_lowercase().as_str(), "drop" | "append") {
            return Err(CondenseError::config(format!(
                "ORPHAN_LINES must be 'drop' or 'append', got '{}'",
                self.orphan_lines
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.chunk_size, 900);
        assert_eq!(config.chunk_overlap, 100);
        assert_eq!(config.max_concurrent, 10);
        assert_eq!(config.request_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_server_bind_address() {
        let config = AppConfig::default();
        assert_eq!(config.server_bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_validate() {
        assert!(AppConfig::default().validate().is_ok());

        let mut config = AppConfig::default();
        config.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.chunk_overlap = config.chunk_size;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.max_concurrent = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.llm_base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.orphan_lines = "keep".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.orphan_lines = "Append".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = AppConfig::default();
        config.api_key = "secret".to_string();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_unparseable_value_falls_back_with_warning() {
        std::env::set_var("CONDENSE_TEST_BAD_RETRIES", "lots");
        let mut diagnostics = ConfigDiagnostics::default();

        let value = AppConfig::get_env_parsed("CONDENSE_TEST_BAD_RETRIES", 3u32, &mut diagnostics);
        assert_eq!(value, 3);
        assert_eq!(diagnostics.warnings.len(), 1);
        assert!(diagnostics.warnings[0].contains("CONDENSE_TEST_BAD_RETRIES ('lots')"));
        assert!(diagnostics.warnings[0].contains("using default: 3"));

        let value = AppConfig::get_env_parsed("CONDENSE_TEST_UNSET_KEY", 7usize, &mut diagnostics);
        assert_eq!(value, 7);
        assert_eq!(diagnostics.warnings.len(), 1);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_diagnostics_emitted_once_subscriber_exists() {
        let mut diagnostics = ConfigDiagnostics::default();
        diagnostics.note("LLM API key: [REDACTED]");
        diagnostics.warn("Failed to parse CHUNK_SIZE ('big'): invalid digit found in string, using default: 900");

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        tracing::subscriber::with_default(subscriber, || diagnostics.emit());

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("INFO"));
        assert!(output.contains("LLM API key: [REDACTED]"));
        assert!(output.contains("WARN"));
        assert!(output.contains("Failed to parse CHUNK_SIZE ('big')"));
    }
}
