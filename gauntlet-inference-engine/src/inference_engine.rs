use crate::EosTokenHandler;
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};

#[allow(unused_imports)]
use tracing::{debug, info};

/// Sampling parameters shared by all local decode loops.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub temperature: f64,
    pub top_k: Option<usize>,
    pub top_p: Option<f64>,
    pub seed: Option<u64>,
    pub repeat_penalty: f32,
    pub repeat_last_n: usize,
}

impl InferenceConfig {
    pub fn create_logits_processor(&self) -> LogitsProcessor {
        let sampling = if self.temperature <= 0. {
            Sampling::ArgMax
        } else {
            let temperature = self.temperature;
            match (self.top_k, self.top_p) {
                (None, None) => Sampling::All { temperature },
                (Some(k), None) => Sampling::TopK { k, temperature },
                (None, Some(p)) => Sampling::TopP { p, temperature },
                (Some(k), Some(p)) => Sampling::TopKThenTopP { k, p, temperature },
            }
        };
        debug!("Sampling strategy: {:?}", sampling);
        LogitsProcessor::from_sampling(self.seed.unwrap_or(42), sampling)
    }
}

/// Forward-pass surface a causal decoder model exposes to the engine.
pub trait ModelInference: Send + Sync {
    type Cache;

    fn create_cache(&self, enable_kv_cache: bool, dtype: DType, device: &Device) -> Result<Self::Cache>;
    fn forward(&self, input: &Tensor, context_index: usize, cache: &mut Self::Cache) -> Result<Tensor>;
    fn device(&self) -> &Device;
    fn dtype(&self) -> DType;
    fn use_kv_cache(&self) -> bool;
    fn eos_handler(&self) -> &EosTokenHandler;
}

pub struct InferenceEngine;

impl InferenceEngine {
    /// Runs the token loop for a causal decoder: feed the prompt, then one
    /// token at a time when the KV cache is on, stopping at EOS or after
    /// `max_tokens`. Returns only the newly generated token ids.
    pub fn generate<M: ModelInference>(
        model: &M,
        mut tokens: Vec<u32>,
        max_tokens: usize,
        config: &InferenceConfig,
    ) -> Result<Vec<u32>> {
        let mut cache = model.create_cache(model.use_kv_cache(), model.dtype(), model.device())?;
        let mut logits_processor = config.create_logits_processor();

        debug!(
            "Starting generation with {} prompt tokens, KV cache: {}",
            tokens.len(),
            model.use_kv_cache()
        );

        let mut generated_tokens = Vec::new();

        for index in 0..max_tokens {
            let (context_size, context_index) = if model.use_kv_cache() && index > 0 {
                (1, tokens.len() - 1)
            } else {
                (tokens.len(), 0)
            };

            let ctxt = &tokens[tokens.len().saturating_sub(context_size)..];
            let input = Tensor::new(ctxt, model.device())?.unsqueeze(0)?;
            let logits = model.forward(&input, context_index, &mut cache)?;
            let logits = logits.squeeze(0)?;

            let logits = if config.repeat_penalty == 1. {
                logits
            } else {
                let start_at = tokens.len().saturating_sub(config.repeat_last_n);
                candle_transformers::utils::apply_repeat_penalty(
                    &logits,
                    config.repeat_penalty,
                    &tokens[start_at..],
                )?
            };

            let next_token = logits_processor.sample(&logits)?;
            tokens.push(next_token);
            generated_tokens.push(next_token);

            if model.eos_handler().is_eos_token(next_token) {
                break;
            }
        }

        debug!("{} tokens generated", generated_tokens.len());

        Ok(generated_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_temperature(temperature: f64) -> InferenceConfig {
        InferenceConfig {
            temperature,
            top_k: None,
            top_p: None,
            seed: Some(42),
            repeat_penalty: 1.0,
            repeat_last_n: 128,
        }
    }

    #[test]
    fn test_zero_temperature_builds_processor() {
        // Greedy decoding must not depend on the seed being present.
        let mut config = config_with_temperature(0.0);
        config.seed = None;

        let _ = config.create_logits_processor();
    }

    #[test]
    fn test_positive_temperature_builds_processor() {
        let mut config = config_with_temperature(0.7);
        config.top_k = Some(40);
        config.top_p = Some(0.9);

        let _ = config.create_logits_processor();
    }
}
