use std::time::Duration;

use anyhow::Context as _;
use reqwest::StatusCode;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    #[error("POST {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("OpenAI API error ({status}): {message}")]
    Api { status: StatusCode, message: String },
    #[error("parse OpenAI response: {0}")]
    Parse(String),
    #[error("OpenAI output text is empty")]
    EmptyOutput,
}

pub fn responses_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/responses")
}

/// Minimal client for the Responses API.
#[derive(Debug, Clone)]
pub struct ResponsesClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ResponsesClient {
    pub fn new(base_url: &str, api_key: impl Into<String>, model: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("build OpenAI http client")?;
        Ok(Self {
            client,
            endpoint: responses_endpoint(base_url),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn text(
        &self,
        instructions: &str,
        input: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Result<String, OpenAiError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "instructions": instructions,
            "input": input,
            "max_output_tokens": max_output_tokens,
            "text": { "format": { "type": "text" } },
            "store": false,
        });

        // GPT-5 family models reject sampling params like `temperature`.
        if !self.model.starts_with("gpt-5")
            && let Some(obj) = body.as_object_mut()
        {
            obj.insert("temperature".to_owned(), serde_json::json!(temperature));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| OpenAiError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|source| OpenAiError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            })?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or(raw);
            return Err(OpenAiError::Api { status, message });
        }

        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|err| OpenAiError::Parse(err.to_string()))?;
        extract_output_text(&value)
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn extract_output_text(value: &serde_json::Value) -> Result<String, OpenAiError> {
    let output = value
        .get("output")
        .and_then(|v| v.as_array())
        .ok_or_else(|| OpenAiError::Parse("missing `output` array in response".to_owned()))?;

    let text = output
        .iter()
        .filter(|item| item.get("type").and_then(|v| v.as_str()) == Some("message"))
        .filter_map(|item| item.get("content").and_then(|v| v.as_array()))
        .flatten()
        .filter(|part| part.get("type").and_then(|v| v.as_str()) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
        .collect::<String>();

    if text.trim().is_empty() {
        return Err(OpenAiError::EmptyOutput);
    }
    Ok(text)
}
