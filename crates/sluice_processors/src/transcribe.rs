//! Speech-to-text transcription: `talk.mp3` in, `talk.mp3.transcript.txt`
//! out.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sluice_registry::{CancellationToken, Processor};
use tracing::{debug, warn};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";
/// Cost-per-minute planning figure used only by `estimate_cost`, not billed
/// anywhere; a reasonable stand-in for whatever the configured backend
/// actually charges.
const ESTIMATED_COST_PER_MB: f64 = 0.006;

#[derive(Debug, Serialize)]
struct TranscribeRequestMeta {
    model: String,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: String,
}

/// Transcribes audio files via an external speech API. Input extensions
/// and the model name are configurable per `ProcessorConfig`; the API key
/// and endpoint are read once from the environment at construction and
/// never persisted.
pub struct TranscribeProcessor {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    input_extensions: Vec<String>,
}

impl TranscribeProcessor {
    pub fn from_env() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: std::env::var("SLUICE_TRANSCRIBE_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            api_key: std::env::var("SLUICE_TRANSCRIBE_API_KEY").ok(),
            model: std::env::var("SLUICE_TRANSCRIBE_MODEL")
                .unwrap_or_else(|_| "whisper-1".to_string()),
            input_extensions: vec!["mp3".to_string(), "wav".to_string(), "m4a".to_string()],
        }
    }
}

#[async_trait]
impl Processor for TranscribeProcessor {
    fn name(&self) -> &str {
        "transcribe"
    }

    fn input_extensions(&self) -> &[String] {
        &self.input_extensions
    }

    fn output_ext(&self) -> &str {
        ".transcript.txt"
    }

    fn allow_derived_files(&self) -> bool {
        // Transcription only makes sense against an audio file dropped by
        // a human or some upstream system, never against another
        // processor's output.
        false
    }

    async fn run(
        &self,
        input_path: &Path,
        _config: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> anyhow::Result<PathBuf> {
        let Some(api_key) = self.api_key.as_deref() else {
            anyhow::bail!("transcribe processor not configured: SLUICE_TRANSCRIBE_API_KEY unset");
        };
        if cancel.is_cancelled() {
            anyhow::bail!("cancelled before transcription started");
        }

        let audio_bytes = tokio::fs::read(input_path).await?;
        let file_name = input_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());

        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio_bytes).file_name(file_name),
            );

        debug!(endpoint = %self.endpoint, path = %input_path.display(), "sending transcription request");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .timeout(Duration::from_secs(10 * 60))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let parsed: TranscribeResponse = response.json().await?;

        if cancel.is_cancelled() {
            warn!(path = %input_path.display(), "transcription completed after cancellation requested, discarding");
            anyhow::bail!("cancelled during transcription");
        }

        let output_path = PathBuf::from(format!("{}.transcript.txt", input_path.display()));
        tokio::fs::write(&output_path, parsed.text).await?;
        Ok(output_path)
    }

    async fn estimate_cost(&self, input_path: &Path) -> Option<f64> {
        let bytes = tokio::fs::metadata(input_path).await.ok()?.len();
        let megabytes = bytes as f64 / (1024.0 * 1024.0);
        Some(megabytes * ESTIMATED_COST_PER_MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_without_api_key_fails_fast() {
        std::env::remove_var("SLUICE_TRANSCRIBE_API_KEY");
        let processor = TranscribeProcessor::from_env();
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("talk.mp3");
        std::fs::write(&input, b"fake audio bytes").unwrap();

        let err = processor
            .run(&input, &serde_json::Value::Null, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn declares_expected_interface() {
        let processor = TranscribeProcessor::from_env();
        assert_eq!(processor.name(), "transcribe");
        assert_eq!(processor.output_ext(), ".transcript.txt");
        assert!(!processor.allow_derived_files());
        assert!(processor
            .input_extensions()
            .iter()
            .any(|e| e == "mp3"));
    }
}
