use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `POST /process` form fields
///
/// Every field is optional at the wire level so the handler can report
/// which one is missing or malformed.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessForm {
    /// Text to condense
    #[serde(default)]
    pub text: Option<String>,

    /// Target length ratio, 0 < ratio <= 1
    #[serde(default)]
    pub ratio: Option<String>,

    /// `document` (default) or `transcript`
    #[serde(default)]
    pub mode: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// Error body returned for every failed request
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
