//! LLM-backed summarization: consumes a transcript `.txt` file, depends on
//! nothing of its own (it's reachable the moment a `.txt` of the right
//! shape exists), and produces a `.summary.txt` sibling.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sluice_registry::{CancellationToken, Processor};
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ESTIMATED_COST_PER_1K_CHARS: f64 = 0.0008;

#[derive(Debug, Serialize)]
struct SummarizeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<SummarizeMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct SummarizeMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponseBlock {
    text: String,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    content: Vec<SummarizeResponseBlock>,
}

/// Summarizes a text file through a chat-completion style API. Applies to
/// any `.txt` file, including transcript derivatives — `allow_derived_files`
/// stays at its default `true` since a transcript is exactly the expected
/// input.
pub struct SummarizeProcessor {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    input_extensions: Vec<String>,
}

impl SummarizeProcessor {
    pub fn from_env() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: std::env::var("SLUICE_SUMMARIZE_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            api_key: std::env::var("SLUICE_SUMMARIZE_API_KEY").ok(),
            model: std::env::var("SLUICE_SUMMARIZE_MODEL")
                .unwrap_or_else(|_| "claude-3-haiku".to_string()),
            input_extensions: vec!["txt".to_string()],
        }
    }
}

#[async_trait]
impl Processor for SummarizeProcessor {
    fn name(&self) -> &str {
        "summarize"
    }

    fn input_extensions(&self) -> &[String] {
        &self.input_extensions
    }

    fn output_ext(&self) -> &str {
        ".summary.txt"
    }

    async fn run(
        &self,
        input_path: &Path,
        _config: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> anyhow::Result<PathBuf> {
        let Some(api_key) = self.api_key.as_deref() else {
            anyhow::bail!("summarize processor not configured: SLUICE_SUMMARIZE_API_KEY unset");
        };
        if cancel.is_cancelled() {
            anyhow::bail!("cancelled before summarization started");
        }

        let transcript = tokio::fs::read_to_string(input_path).await?;
        let body = SummarizeRequest {
            model: &self.model,
            max_tokens: 512,
            messages: vec![SummarizeMessage {
                role: "user",
                content: format!("Summarize the following transcript concisely:\n\n{transcript}"),
            }],
        };

        debug!(endpoint = %self.endpoint, path = %input_path.display(), "sending summarization request");
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: SummarizeResponse = response.json().await?;
        let summary = parsed
            .content
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        let output_path = PathBuf::from(format!("{}.summary.txt", input_path.display()));
        tokio::fs::write(&output_path, summary).await?;
        Ok(output_path)
    }

    async fn estimate_cost(&self, input_path: &Path) -> Option<f64> {
        let contents = tokio::fs::read_to_string(input_path).await.ok()?;
        Some((contents.len() as f64 / 1000.0) * ESTIMATED_COST_PER_1K_CHARS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_without_api_key_fails_fast() {
        std::env::remove_var("SLUICE_SUMMARIZE_API_KEY");
        let processor = SummarizeProcessor::from_env();
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("talk.mp3.transcript.txt");
        std::fs::write(&input, "hello world").unwrap();

        let err = processor
            .run(&input, &serde_json::Value::Null, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn declares_expected_interface() {
        let processor = SummarizeProcessor::from_env();
        assert_eq!(processor.name(), "summarize");
        assert_eq!(processor.output_ext(), ".summary.txt");
        assert!(processor.allow_derived_files());
        assert!(processor.depends_on().is_empty());
    }
}
