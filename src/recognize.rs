//! Recognition Service boundary: turn a document into marked-up text.
//!
//! The vision model does the actual reading; this module only builds the
//! request (instruction prompt + base64 document), retries transient
//! failures with exponential backoff, and scans the returned transcript
//! for figure markers. It is intentionally thin — all prompt engineering
//! lives in [`crate::prompts`].
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from vision APIs are transient and frequent.
//! Exponential backoff (`retry_backoff_ms * 2^attempt`) avoids hammering
//! a recovering endpoint: with 500 ms base and 3 retries the wait
//! sequence is 500 ms → 1 s → 2 s.
//!
//! A failed call surfaces as [`MathScanError::RecognitionFailed`] and
//! touches nothing else: the document and any previously resolved crops
//! stay intact, so retrying does not require re-upload.

use crate::config::ScanConfig;
use crate::document::ExamDocument;
use crate::error::MathScanError;
use crate::pipeline::scanner::{self, ScanOutcome};
use crate::prompts::DEFAULT_RECOGNITION_PROMPT;
use edgequake_llm::{
    ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// The recognised transcript, cleaned and scanned for figure markers.
#[derive(Debug, Clone)]
pub struct Recognition {
    /// The model's output before any cleanup.
    pub raw_text: String,
    /// The transcript after cleanup, markers still in place.
    pub cleaned_text: String,
    /// Byte offsets of each marker in `cleaned_text`, in text order.
    pub marker_positions: Vec<usize>,
}

impl Recognition {
    /// Scan arbitrary text as if it had just come back from the service.
    ///
    /// Marker identity is positional, so any change to the upstream text
    /// must go through here to reset all marker state.
    pub fn from_text(raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let ScanOutcome {
            cleaned_text,
            marker_positions,
        } = scanner::scan(&raw_text);
        Self {
            raw_text,
            cleaned_text,
            marker_positions,
        }
    }

    /// Number of figure markers awaiting a crop.
    pub fn marker_count(&self) -> usize {
        self.marker_positions.len()
    }
}

/// Send the document to the vision service and scan the transcript.
pub async fn recognize(
    document: &ExamDocument,
    config: &ScanConfig,
) -> Result<Recognition, MathScanError> {
    let provider = resolve_provider(config)?;
    let start = Instant::now();

    let prompt = config
        .recognition_prompt
        .as_deref()
        .unwrap_or(DEFAULT_RECOGNITION_PROMPT);

    let image = ImageData::new(document.to_base64(), document.kind().mime_type())
        .with_detail("high");

    let messages = vec![
        ChatMessage::system(prompt),
        ChatMessage::user_with_images("", vec![image]),
    ];

    let options = CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    };

    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Recognition retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                debug!(
                    "Recognition: {} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                let recognition = Recognition::from_text(response.content);
                info!(
                    "Recognised {} chars, {} figure markers",
                    recognition.cleaned_text.len(),
                    recognition.marker_count()
                );
                return Ok(recognition);
            }
            Err(e) => {
                let err_msg = format!("{}", e);
                warn!("Recognition attempt {} failed — {}", attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
        }
    }

    Err(MathScanError::RecognitionFailed {
        retries: config.max_retries,
        detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}

/// Resolve the vision provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is; the hook
///    tests and custom middleware go through.
/// 2. **Named provider + model** (`config.provider_name`) — reads the
///    matching API key from the environment.
/// 3. **Environment pair** (`MATHSCAN_PROVIDER` + `MATHSCAN_MODEL`).
/// 4. **Gemini preference** — when `GEMINI_API_KEY` is set, use Gemini
///    with the default model; exam transcription was tuned against it.
/// 5. **Full auto-detection** — scan all known API key variables.
fn resolve_provider(config: &ScanConfig) -> Result<Arc<dyn LLMProvider>, MathScanError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("MATHSCAN_PROVIDER"),
        std::env::var("MATHSCAN_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("gemini", model);
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| MathScanError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(provider)
}

const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, MathScanError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        MathScanError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
