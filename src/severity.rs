//! # Severity Lookup Module
//!
//! Asks a generative-text API (Gemini `generateContent`) whether a diagnosed
//! condition is harmful, harmless or pre-cancerous. The lookup is infallible at
//! its boundary: every transport, status or parsing failure is logged and
//! replaced by [`Severity::unavailable`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SeverityConfig;

pub const UNKNOWN_SEVERITY_TAG: &str = "❔ Unknown severity";
pub const UNAVAILABLE_EXPLANATION: &str =
    "Additional information is unavailable right now. Please consult a dermatologist or skin specialist.";
pub const NO_ADDITIONAL_INFO: &str = "No additional information provided.";

/// Severity tag plus free-text explanation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Severity {
    pub tag: String,
    pub explanation: String,
}

impl Severity {
    pub fn new(tag: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            explanation: explanation.into(),
        }
    }

    /// Fallback used whenever the remote lookup fails
    pub fn unavailable() -> Self {
        Self::new(UNKNOWN_SEVERITY_TAG, UNAVAILABLE_EXPLANATION)
    }

    pub fn is_unavailable(&self) -> bool {
        self.tag == UNKNOWN_SEVERITY_TAG && self.explanation == UNAVAILABLE_EXPLANATION
    }
}

/// Source of severity assessments for a diagnosis label.
///
/// `None` means enrichment is switched off and the reply should carry the
/// static condition description instead.
#[async_trait]
pub trait SeverityLookup: Send + Sync {
    async fn assess(&self, label: &str) -> Option<Severity>;
}

/// Lookup used when no API key is configured
pub struct DisabledSeverityLookup;

#[async_trait]
impl SeverityLookup for DisabledSeverityLookup {
    async fn assess(&self, _label: &str) -> Option<Severity> {
        None
    }
}

/// Prompt sent to the generative API for `label`
pub fn build_prompt(label: &str) -> String {
    format!(
        r#"A skin lesion image was classified as "{label}".

Is this condition harmful (cancerous), harmless (non-cancerous), or potentially harmful (pre-cancerous)?

Answer with exactly one of these on the first line:
❗ Harmful - Cancerous
✅ Harmless - Non-cancerous
⚠️ Potentially Harmful - Pre-cancerous

Then, starting on the next line, briefly explain the condition: the signs to look for, common treatment options, and the recommended action for the patient. Use plain text without markdown formatting."#
    )
}

/// Split a model reply into `(tag, explanation)` on its first newline.
///
/// A single-line reply becomes the tag with [`NO_ADDITIONAL_INFO`] as the
/// explanation; a blank reply yields the unavailable fallback.
pub fn parse_severity(text: &str) -> Severity {
    let text = text.trim();
    if text.is_empty() {
        return Severity::unavailable();
    }

    match text.split_once('\n') {
        Some((first, rest)) => {
            let explanation = rest.trim();
            Severity::new(
                first.trim(),
                if explanation.is_empty() {
                    NO_ADDITIONAL_INFO
                } else {
                    explanation
                },
            )
        }
        None => Severity::new(text, NO_ADDITIONAL_INFO),
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

/// Gemini client for severity assessments
pub struct GeminiSeverityClient {
    api_key: String,
    api_url: String,
    client: reqwest::Client,
}

impl GeminiSeverityClient {
    pub fn new(api_key: String, config: &SeverityConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            api_key,
            api_url: config.api_url.clone(),
            client,
        })
    }

    /// Build the configured lookup: Gemini when a key is present, disabled otherwise
    pub fn from_config(config: &SeverityConfig) -> anyhow::Result<Box<dyn SeverityLookup>> {
        match &config.api_key {
            Some(key) => Ok(Box::new(Self::new(key.clone(), config)?)),
            None => {
                info!("GEMINI_API_KEY not set, severity lookup disabled");
                Ok(Box::new(DisabledSeverityLookup))
            }
        }
    }

    async fn generate(&self, prompt: String) -> Result<String, String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("HTTP error: {e}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response: {e}"))?;

        debug!("Gemini response status: {status}");

        if !status.is_success() {
            return Err(format!("API error {status}: {body}"));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| format!("Failed to parse response: {e}"))?;

        parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| "No text in response".to_string())
    }
}

#[async_trait]
impl SeverityLookup for GeminiSeverityClient {
    async fn assess(&self, label: &str) -> Option<Severity> {
        match self.generate(build_prompt(label)).await {
            Ok(text) => {
                let severity = parse_severity(&text);
                info!(label, severity = %severity.tag, "Severity lookup completed");
                Some(severity)
            }
            Err(e) => {
                warn!(label, error = %e, "Severity lookup failed, using fallback");
                Some(Severity::unavailable())
            }
        }
    }
}
