//! Alternative extractor over any edgequake-llm vision provider.
//!
//! [`LlmExtractor`] sends the same page images to an OpenAI, Anthropic,
//! Gemini or local provider through `edgequake-llm`. Those providers have no
//! portable response-schema switch, so the key list travels inside the
//! system prompt ([`prompts::prompt_with_inline_schema`]) and the answer goes
//! through the same [`postprocess::parse_contract`] as the Gemini path.
//!
//! Providers authenticate from their own environment variables
//! (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, ...), so the per-run credential
//! passed to [`Extractor::extract`] only gates the run and is not forwarded.

use crate::config::QueueConfig;
use crate::contract::ContractData;
use crate::error::{ItemError, KksError};
use crate::pipeline::encode::PageImage;
use crate::pipeline::extract::{backoff_ms, Extractor};
use crate::pipeline::postprocess;
use crate::prompts;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Output budget for one record. The JSON is a few hundred tokens.
const MAX_TOKENS: usize = 4096;

/// [`Extractor`] backed by an edgequake-llm provider.
pub struct LlmExtractor {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl std::fmt::Debug for LlmExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmExtractor")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl LlmExtractor {
    /// Wrap a provider the caller already built.
    pub fn with_provider(provider: Arc<dyn LLMProvider>, config: &QueueConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Resolve a provider, from most-specific to least-specific:
    ///
    /// 1. `provider_name` (e.g. `"openai"`) with `model`
    /// 2. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
    /// 3. [`ProviderFactory::from_env`] auto-detection
    pub fn resolve(
        provider_name: Option<&str>,
        model: Option<&str>,
        config: &QueueConfig,
    ) -> Result<Self, KksError> {
        let provider = resolve_provider(provider_name, model)?;
        Ok(Self::with_provider(provider, config))
    }
}

fn build_options(temperature: f32) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(MAX_TOKENS),
        ..Default::default()
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, KksError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        KksError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn resolve_provider(
    provider_name: Option<&str>,
    model: Option<&str>,
) -> Result<Arc<dyn LLMProvider>, KksError> {
    if let Some(name) = provider_name {
        let model = model.unwrap_or("gpt-4.1-mini");
        info!("Using LLM provider '{}' with model '{}'", name, model);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| KksError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Build the chat: instruction as system message, all pages in one user turn.
fn build_messages(pages: &[PageImage]) -> Vec<ChatMessage> {
    let images: Vec<ImageData> = pages
        .iter()
        .map(|p| ImageData::new(p.data.clone(), p.mime_type))
        .collect();

    vec![
        ChatMessage::system(prompts::prompt_with_inline_schema()),
        ChatMessage::user_with_images("Extract the agreement data from these pages.", images),
    ]
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(
        &self,
        pages: &[PageImage],
        _credential: &str,
    ) -> Result<ContractData, ItemError> {
        let start = Instant::now();
        let messages = build_messages(pages);
        let options = build_options(self.temperature);
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "Extraction retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "{} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return postprocess::parse_contract(&response.content);
                }
                Err(e) => {
                    let err_msg = format!("{}", e);
                    warn!("Extraction attempt {} failed: {}", attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(ItemError::ExtractionFailed {
            retries: self.max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize) -> PageImage {
        PageImage {
            page_num: n,
            mime_type: "image/jpeg",
            data: "AAAA".to_string(),
        }
    }

    #[test]
    fn one_system_and_one_user_turn() {
        let messages = build_messages(&[page(1), page(2), page(3)]);
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn build_options_defaults() {
        let config = QueueConfig::default();
        let opts = build_options(config.temperature);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(4096));
    }
}
