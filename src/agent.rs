//! LLM agent module for summarisation.
//!
//! The model client is built once per run and shared behind the `Summarize`
//! trait; per-request construction would redo TLS and auth setup for every
//! link.

use crate::config::Config;
use async_trait::async_trait;
use rstructor::{GeminiClient, GeminiModel, LLMClient};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("model returned an empty summary")]
    EmptySummary,
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Capability for condensing page text into a short summary.
///
/// `min_len` and `max_len` bound the output length in characters.
#[async_trait]
pub trait Summarize: Send + Sync {
    async fn summarize(
        &self,
        text: &str,
        min_len: usize,
        max_len: usize,
    ) -> Result<String, AgentError>;
}

/// Gemini-backed summariser.
pub struct GeminiSummarizer {
    client: GeminiClient,
}

impl GeminiSummarizer {
    /// Build the client from config. Construct once and reuse for the run.
    pub fn from_config(config: &Config) -> Result<Self, AgentError> {
        let api_key = config.api_key()?;
        let model = parse_gemini_model(&config.summary.model);

        let client = GeminiClient::new(api_key)
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?
            .model(model);

        Ok(Self { client })
    }
}

#[async_trait]
impl Summarize for GeminiSummarizer {
    async fn summarize(
        &self,
        text: &str,
        min_len: usize,
        max_len: usize,
    ) -> Result<String, AgentError> {
        let prompt = format!(
            "Summarise the following webpage text in plain prose, between {min_len} and \
             {max_len} characters. Write in the same language as the source text. Do not \
             use markdown, lists or any preamble; output only the summary itself.\n\n---\n\n{text}"
        );

        let result = self
            .client
            .generate_with_metadata(&prompt)
            .await
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?;

        let cleaned = strip_markdown_fences(&result.text);
        if cleaned.is_empty() {
            return Err(AgentError::EmptySummary);
        }

        Ok(cleaned)
    }
}

/// Strip markdown code block wrappers some models add despite instructions
fn strip_markdown_fences(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with("```") {
        let without_prefix = match trimmed.find('\n') {
            Some(idx) => &trimmed[idx + 1..],
            None => return String::new(),
        };

        if let Some(end_idx) = without_prefix.rfind("```") {
            return without_prefix[..end_idx].trim().to_string();
        }

        return without_prefix.trim().to_string();
    }

    trimmed.to_string()
}

/// Parse a model string into a GeminiModel
fn parse_gemini_model(model: &str) -> GeminiModel {
    match model {
        "gemini-2.0-flash" => GeminiModel::Gemini20Flash,
        "gemini-2.5-flash" => GeminiModel::Gemini25Flash,
        "gemini-2.5-pro" => GeminiModel::Gemini25Pro,
        _ => GeminiModel::Gemini20Flash, // Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_blocks() {
        assert_eq!(
            strip_markdown_fences("```text\nthe summary\n```"),
            "the summary"
        );
        assert_eq!(strip_markdown_fences("```\nthe summary\n```"), "the summary");
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(strip_markdown_fences("  the summary \n"), "the summary");
    }

    #[test]
    fn unknown_model_falls_back_to_flash() {
        assert!(matches!(
            parse_gemini_model("not-a-model"),
            GeminiModel::Gemini20Flash
        ));
    }
}
