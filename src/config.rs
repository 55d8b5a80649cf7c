//! Configuration types for exam scanning and cropping.
//!
//! Every knob lives in one [`ScanConfig`] struct built via its
//! [`ScanConfigBuilder`]. Keeping configuration in a single shareable value
//! makes it trivial to reuse across the recognition call, the crop session,
//! and the reassembly step, and to log it for diffing two runs.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::MathScanError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for a scan-and-crop session.
///
/// Built via [`ScanConfig::builder()`] or [`ScanConfig::default()`].
///
/// # Example
/// ```rust
/// use mathscan::ScanConfig;
///
/// let config = ScanConfig::builder()
///     .model("gemini-2.5-flash")
///     .min_selection_px(8.0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// Vision model identifier, e.g. "gemini-2.5-flash", "gpt-4.1-mini".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// Vision provider name (e.g. "gemini", "openai", "anthropic").
    /// If None along with `provider`, the provider is auto-detected from
    /// the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the recognition completion. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to what it sees on the
    /// page, which is exactly what transcription needs.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 8192.
    ///
    /// A dense exam page with many formulae can exceed 4 000 output tokens;
    /// setting this too low silently truncates the transcript mid-question.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient recognition failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s.
    pub retry_backoff_ms: u64,

    /// Custom recognition instruction. If None, uses the built-in prompt.
    pub recognition_prompt: Option<String>,

    /// Linear upscaling factor applied when rasterising PDF pages. Default: 2.0.
    ///
    /// Crops are cut from the rendered page, so the render resolution is the
    /// ceiling on crop quality. 2× keeps figure crops sharp when pasted into
    /// a document at their display size.
    pub render_scale: f32,

    /// Minimum selection edge length in display pixels. Default: 5.0.
    ///
    /// Selections with a width or height below this are rejected without
    /// creating a crop, filtering out accidental clicks during a drag.
    pub min_selection_px: f32,

    /// Display width in pixels given to embedded clipboard images. Default: 300.
    pub clipboard_image_width: u32,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 8192,
            max_retries: 3,
            retry_backoff_ms: 500,
            recognition_prompt: None,
            render_scale: 2.0,
            min_selection_px: 5.0,
            clipboard_image_width: 300,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("render_scale", &self.render_scale)
            .field("min_selection_px", &self.min_selection_px)
            .field("clipboard_image_width", &self.clipboard_image_width)
            .finish()
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ScanConfig`].
#[derive(Debug)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn recognition_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.recognition_prompt = Some(prompt.into());
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(1.0, 4.0);
        self
    }

    pub fn min_selection_px(mut self, px: f32) -> Self {
        self.config.min_selection_px = px.max(1.0);
        self
    }

    pub fn clipboard_image_width(mut self, px: u32) -> Self {
        self.config.clipboard_image_width = px.max(50);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, MathScanError> {
        let c = &self.config;
        if !(1.0..=4.0).contains(&c.render_scale) {
            return Err(MathScanError::InvalidConfig(format!(
                "render scale must be 1.0–4.0, got {}",
                c.render_scale
            )));
        }
        if c.min_selection_px < 1.0 {
            return Err(MathScanError::InvalidConfig(
                "minimum selection size must be ≥ 1px".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(MathScanError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
