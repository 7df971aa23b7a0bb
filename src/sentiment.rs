//! Sentiment classification through the Hugging Face inference API.
//!
//! The adapter never fails: every provider problem is folded into a
//! [`Sentiment::Failed`] outcome whose label is one of the sentinel strings
//! stored alongside the review (`CFG_ERR`, `API_ERR`, `CONN_ERR`).
//! A cold-starting model is retried once after [`COLD_START_DELAY`].

use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::SentimentConfig;

pub const MODEL_ID: &str = "distilbert-base-uncased-finetuned-sst-2-english";

/// Fixed wait before the single retry of a model that is still loading.
pub const COLD_START_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Maps provider labels such as `positive` or `NEG` onto the stored set.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "positive" | "pos" => SentimentLabel::Positive,
            "negative" | "neg" => SentimentLabel::Negative,
            _ => SentimentLabel::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "POSITIVE",
            SentimentLabel::Negative => "NEGATIVE",
            SentimentLabel::Neutral => "NEUTRAL",
        }
    }
}

/// Why a classification could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No API token configured.
    Config,
    /// Provider answered with a non-success status.
    Api,
    /// Transport error or undecodable reply.
    Connection,
}

impl FailureKind {
    pub fn sentinel(&self) -> &'static str {
        match self {
            FailureKind::Config => "CFG_ERR",
            FailureKind::Api => "API_ERR",
            FailureKind::Connection => "CONN_ERR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sentiment {
    Classified { label: SentimentLabel, score: f64 },
    Failed(FailureKind),
}

impl Sentiment {
    pub fn label(&self) -> &'static str {
        match self {
            Sentiment::Classified { label, .. } => label.as_str(),
            Sentiment::Failed(kind) => kind.sentinel(),
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            Sentiment::Classified { score, .. } => *score,
            Sentiment::Failed(_) => 0.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// The inference API returns either `[[{..}]]` or `[{..}]` depending on the route.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassificationPayload {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl ClassificationPayload {
    fn into_top(self) -> Option<LabelScore> {
        let candidates = match self {
            ClassificationPayload::Nested(outer) => outer.into_iter().flatten().collect(),
            ClassificationPayload::Flat(items) => items,
        };
        candidates
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }
}

enum Attempt {
    Done(Sentiment),
    ColdStart,
}

pub struct SentimentClassifier {
    client: reqwest::Client,
    api_token: Option<String>,
    endpoint: String,
    retry_delay: Duration,
}

impl SentimentClassifier {
    pub fn new(client: reqwest::Client, config: &SentimentConfig) -> Self {
        Self {
            client,
            api_token: config.api_token.clone(),
            endpoint: format!(
                "{}/models/{}",
                config.api_base.trim_end_matches('/'),
                MODEL_ID
            ),
            retry_delay: COLD_START_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub async fn classify(&self, text: &str) -> Sentiment {
        let Some(token) = self.api_token.as_deref() else {
            warn!("HF_API_TOKEN missing, skipping sentiment classification");
            return Sentiment::Failed(FailureKind::Config);
        };

        match self.attempt(token, text).await {
            Attempt::Done(sentiment) => sentiment,
            Attempt::ColdStart => {
                info!(
                    model = MODEL_ID,
                    delay_ms = self.retry_delay.as_millis() as u64,
                    "Model is loading, retrying once"
                );
                sleep(self.retry_delay).await;
                match self.attempt(token, text).await {
                    Attempt::Done(sentiment) => sentiment,
                    Attempt::ColdStart => {
                        warn!(model = MODEL_ID, "Model still loading after retry");
                        Sentiment::Failed(FailureKind::Api)
                    }
                }
            }
        }
    }

    async fn attempt(&self, token: &str, text: &str) -> Attempt {
        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&serde_json::json!({ "inputs": text }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(model = MODEL_ID, "Sentiment request failed: {}", e);
                return Attempt::Done(Sentiment::Failed(FailureKind::Connection));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::SERVICE_UNAVAILABLE || body.to_lowercase().contains("loading") {
                return Attempt::ColdStart;
            }
            warn!(model = MODEL_ID, status = status.as_u16(), body = %body, "Sentiment API error");
            return Attempt::Done(Sentiment::Failed(FailureKind::Api));
        }

        match response.json::<ClassificationPayload>().await {
            Ok(payload) => match payload.into_top() {
                Some(top) => Attempt::Done(Sentiment::Classified {
                    label: SentimentLabel::normalize(&top.label),
                    score: top.score.clamp(0.0, 1.0),
                }),
                None => {
                    warn!(model = MODEL_ID, "Sentiment API returned no labels");
                    Attempt::Done(Sentiment::Failed(FailureKind::Connection))
                }
            },
            Err(e) => {
                warn!(model = MODEL_ID, "Sentiment parse error: {}", e);
                Attempt::Done(Sentiment::Failed(FailureKind::Connection))
            }
        }
    }
}
