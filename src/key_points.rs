//! Key-point extraction with Gemini.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::KeyPointsConfig;

pub const MODEL_ID: &str = "gemini-2.5-flash";
pub const MAX_KEY_POINTS: usize = 3;

pub const NO_ANALYSIS: &str = "No analysis returned";
pub const EXTRACTION_FAILED: &str = "Failed to extract points";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()
            .map(|part| part.text)
    }
}

#[derive(Debug, thiserror::Error)]
enum ExtractError {
    #[error("GEMINI_API_KEY not set")]
    MissingKey,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gemini API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("empty reply")]
    Empty,
    #[error("reply is not a JSON string array: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub struct KeyPointExtractor {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl KeyPointExtractor {
    pub fn new(client: reqwest::Client, config: &KeyPointsConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.api_base.trim_end_matches('/'),
                MODEL_ID
            ),
        }
    }

    /// Returns up to three key points, or a single fallback entry describing
    /// why none could be produced.
    pub async fn extract(&self, text: &str) -> Vec<String> {
        match self.try_extract(text).await {
            Ok(points) => points,
            Err(ExtractError::Empty) => {
                warn!(model = MODEL_ID, "Gemini returned no analysis");
                vec![NO_ANALYSIS.to_string()]
            }
            Err(e) => {
                warn!(model = MODEL_ID, "Key-point extraction failed: {}", e);
                vec![EXTRACTION_FAILED.to_string()]
            }
        }
    }

    async fn try_extract(&self, text: &str) -> Result<Vec<String>, ExtractError> {
        let api_key = self.api_key.as_deref().ok_or(ExtractError::MissingKey)?;
        let prompt = build_prompt(text);

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&GenerateRequest {
                contents: vec![Content {
                    parts: vec![Part { text: &prompt }],
                }],
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply = response
            .json::<GenerateResponse>()
            .await?
            .into_text()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ExtractError::Empty)?;

        parse_key_points(&reply)
    }
}

pub fn build_prompt(review: &str) -> String {
    format!(
        "Analyze this review and return a JSON array of strings containing max {} key points.\n\
         Format: [\"Point 1\", \"Point 2\"]\n\
         Review: {}",
        MAX_KEY_POINTS, review
    )
}

/// Removes a surrounding markdown code fence and its optional `json` tag.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = rest.split("```").next().unwrap_or_default();
    inner.strip_prefix("json").unwrap_or(inner).trim()
}

fn parse_key_points(reply: &str) -> Result<Vec<String>, ExtractError> {
    let mut points: Vec<String> = serde_json::from_str(strip_code_fence(reply))?;
    points.truncate(MAX_KEY_POINTS);
    Ok(points)
}
