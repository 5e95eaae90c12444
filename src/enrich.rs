use async_trait::async_trait;

use crate::openai::{self, OpenAiError, ResponsesClient};

pub const MAX_ANALYZED_CHARS: usize = 2000;
const TRUNCATION_MARKER: &str = "... [content truncated]";

const INSTRUCTIONS: &str =
    "You are a web content analyzer that evaluates relevance and extracts key information.";

/// Annotates relevant pages. Implementations never fail: problems are
/// reported inside the returned annotation.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn analyze(&self, text: &str, keywords: &[String]) -> String;
}

/// [`Enricher`] that asks an OpenAI model for a short relevance analysis.
pub struct OpenAiEnricher {
    client: Option<ResponsesClient>,
}

impl OpenAiEnricher {
    /// Reads `OPENAI_API_KEY`, `SITESCOUT_OPENAI_BASE_URL` and
    /// `SITESCOUT_OPENAI_MODEL`. A missing key is not an error here; each
    /// analysis then reports the missing configuration instead.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .map(|key| key.trim().to_owned())
            .filter(|key| !key.is_empty());
        let base_url = std::env::var("SITESCOUT_OPENAI_BASE_URL")
            .unwrap_or_else(|_| openai::DEFAULT_BASE_URL.to_owned());
        let model = std::env::var("SITESCOUT_OPENAI_MODEL")
            .unwrap_or_else(|_| openai::DEFAULT_MODEL.to_owned());
        Self::new(&base_url, api_key, &model)
    }

    pub fn new(base_url: &str, api_key: Option<String>, model: &str) -> anyhow::Result<Self> {
        let client = match api_key {
            Some(key) => Some(ResponsesClient::new(base_url, key, model)?),
            None => {
                tracing::warn!("OPENAI_API_KEY is not set; enrichment will report an error");
                None
            }
        };
        Ok(Self { client })
    }
}

#[async_trait]
impl Enricher for OpenAiEnricher {
    async fn analyze(&self, text: &str, keywords: &[String]) -> String {
        if text.trim().is_empty() {
            return "No content to analyze".to_owned();
        }
        let Some(client) = &self.client else {
            return "Error: OpenAI API key not configured".to_owned();
        };

        let prompt = build_prompt(&truncate_content(text, MAX_ANALYZED_CHARS), keywords);
        match client.text(INSTRUCTIONS, &prompt, 0.3, 500).await {
            Ok(analysis) => analysis.trim().to_owned(),
            Err(OpenAiError::EmptyOutput) => "No analysis results returned".to_owned(),
            Err(OpenAiError::Api { status, message }) => {
                tracing::warn!(%status, %message, model = client.model(), "enrichment request rejected");
                format!("Error: API request failed - {}", status.as_u16())
            }
            Err(err @ OpenAiError::Transport { .. }) => {
                tracing::warn!(err = %err, "enrichment transport failure");
                "Error: Unable to connect to AI service".to_owned()
            }
            Err(err @ OpenAiError::Parse(_)) => {
                tracing::warn!(err = %err, "enrichment response unreadable");
                format!("Error: {err}")
            }
        }
    }
}

fn build_prompt(content: &str, keywords: &[String]) -> String {
    format!(
        "Analyze the following content and provide insights regarding its relevance to these keywords: [{}].\n\n\
         Content to analyze:\n{content}\n\n\
         Please provide a brief summary of the content, assess its relevance to the keywords, \
         and extract the 3-5 most important facts or points made in relation to those keywords.",
        keywords.join(", ")
    )
}

/// Cuts `content` to at most `max_chars` characters, preferring to end on a
/// sentence or line boundary, and marks the cut.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    let Some((limit, _)) = content.char_indices().nth(max_chars) else {
        return content.to_owned();
    };

    let head = &content[..limit];
    let cut = head
        .rfind(['.', '\n'])
        .map(|idx| idx + 1)
        .unwrap_or(limit);
    format!("{}{TRUNCATION_MARKER}", &content[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_untouched() {
        assert_eq!(truncate_content("short.", 2000), "short.");
    }

    #[test]
    fn truncates_at_sentence_boundary() {
        let content = "First sentence. Second sentence that runs long";
        assert_eq!(
            truncate_content(content, 20),
            "First sentence.... [content truncated]"
        );
    }

    #[test]
    fn truncates_at_limit_without_boundary() {
        assert_eq!(
            truncate_content("abcdefghij", 4),
            "abcd... [content truncated]"
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let content = "ééééé";
        assert_eq!(truncate_content(content, 2), "éé... [content truncated]");
    }

    #[test]
    fn prompt_mentions_keywords() {
        let prompt = build_prompt("body", &["rust".to_owned(), "tokio".to_owned()]);
        assert!(prompt.contains("[rust, tokio]"));
        assert!(prompt.contains("Content to analyze:\nbody"));
    }

    #[tokio::test]
    async fn missing_key_is_reported_in_annotation() -> anyhow::Result<()> {
        let enricher = OpenAiEnricher::new(openai::DEFAULT_BASE_URL, None, openai::DEFAULT_MODEL)?;
        assert_eq!(
            enricher.analyze("text", &[]).await,
            "Error: OpenAI API key not configured"
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_content_is_not_sent() -> anyhow::Result<()> {
        let enricher = OpenAiEnricher::new(
            "http://127.0.0.1:9/v1",
            Some("key".to_owned()),
            openai::DEFAULT_MODEL,
        )?;
        assert_eq!(enricher.analyze("  ", &[]).await, "No content to analyze");
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_service_is_reported_in_annotation() -> anyhow::Result<()> {
        let enricher = OpenAiEnricher::new(
            "http://127.0.0.1:9/v1",
            Some("key".to_owned()),
            openai::DEFAULT_MODEL,
        )?;
        assert_eq!(
            enricher.analyze("some text", &[]).await,
            "Error: Unable to connect to AI service"
        );
        Ok(())
    }
}
