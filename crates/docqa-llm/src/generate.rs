use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use docqa_core::config::Settings;
use docqa_core::traits::Generator;
use docqa_core::{Error, Result};

use crate::client::{model_path, GeminiClient};

/// Text generation through `models/{model}:generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    /// `Err` holds why no client could be built; it is reported on first use.
    client: std::result::Result<GeminiClient, String>,
    model: String,
}

impl GeminiGenerator {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self { client: Ok(client), model: model.into() }
    }

    /// Never fails: a missing credential only matters once something is generated,
    /// so commands that never call the model run without one.
    pub fn from_settings(settings: &Settings, model: impl Into<String>) -> Self {
        let client = GeminiClient::from_settings(settings).map_err(|e| match e {
            Error::InvalidConfig(msg) => msg,
            other => other.to_string(),
        });
        if let Err(reason) = &client {
            tracing::debug!(%reason, "generator has no usable client yet");
        }
        Self { client, model: model.into() }
    }

    fn client(&self) -> Result<&GeminiClient> {
        self.client.as_ref().map_err(|reason| Error::InvalidConfig(reason.clone()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Text parts of the first candidate, concatenated.
    pub fn into_text(self) -> Result<String> {
        let blocked = self.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(Error::provider(
                None,
                format!("no candidates returned (block reason: {})", blocked.as_deref().unwrap_or("none")),
            ));
        };
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            if let Some(reason) = candidate.finish_reason.filter(|r| r != "STOP") {
                return Err(Error::provider(None, format!("generation stopped early: {reason}")));
            }
        }
        Ok(text)
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        let path = format!("{}:generateContent", model_path(&self.model));
        let response: GenerateResponse = self.client()?.post_json(&path, &body).await?;
        let text = response.into_text()?;
        tracing::debug!(model = %self.model, chars = text.len(), "generation finished");
        Ok(text)
    }
}
