use condense_common::CondenseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Request handed to an [`LlmClient`](crate::LlmClient)
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// Prompt text
    pub prompt: String,

    /// Model override (client default when `None`)
    pub model: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Per-call timeout override
    pub timeout: Option<Duration>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Gemini `generateContent` request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// Single-turn request carrying one text part
    pub fn from_prompt(prompt: &str, temperature: Option<f32>) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
                role: None,
            }],
            generation_config: temperature.map(|t| GenerationConfig {
                temperature: Some(t),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

/// Generation options
#[derive(Debug, Clone, Serialize, Default)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Gemini `generateContent` response body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,

    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,

    #[serde(default)]
    pub candidates_token_count: u32,

    #[serde(default)]
    pub total_token_count: u32,
}

impl GenerateContentResponse {
    /// Finish reason reported for the first candidate
    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates.first()?.finish_reason.as_deref()
    }

    /// Text of the first part of the first candidate
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()
            .map(|p| p.text.as_str())
    }
}

/// Kind of input being condensed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    #[default]
    Document,
    Transcript,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Transcript => "transcript",
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingMode {
    type Err = CondenseError;

    /// An empty mode means document
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "document" => Ok(Self::Document),
            "transcript" => Ok(Self::Transcript),
            other => Err(CondenseError::invalid_input(format!(
                "Invalid mode value: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = GenerateContentRequest::from_prompt("Condense this", Some(0.4));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Condense this");
        assert!(json["contents"][0].get("role").is_none());
        let temperature = json["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.4).abs() < 1e-6);

        let body = GenerateContentRequest::from_prompt("No config", None);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn test_first_text() {
        let raw = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "Host: Hello."}], "role": "model"},
                "finishReason": "STOP",
                "avgLogprobs": -0.2
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 3, "totalTokenCount": 13},
            "modelVersion": "gemini-1.5-flash"
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.first_text(), Some("Host: Hello."));
        assert_eq!(response.finish_reason(), Some("STOP"));
        assert_eq!(response.model_version.as_deref(), Some("gemini-1.5-flash"));
        assert_eq!(response.usage_metadata.unwrap().total_token_count, 13);
    }

    #[test]
    fn test_first_text_missing_parts() {
        let response: GenerateContentResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(response.first_text(), None);

        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert_eq!(response.first_text(), None);

        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": [{"content": {"parts": []}}]}"#).unwrap();
        assert_eq!(response.first_text(), None);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("".parse::<ProcessingMode>().unwrap(), ProcessingMode::Document);
        assert_eq!("document".parse::<ProcessingMode>().unwrap(), ProcessingMode::Document);
        assert_eq!(" Transcript ".parse::<ProcessingMode>().unwrap(), ProcessingMode::Transcript);
        assert!("podcast".parse::<ProcessingMode>().is_err());
        assert_eq!(ProcessingMode::Transcript.to_string(), "transcript");
    }
}
