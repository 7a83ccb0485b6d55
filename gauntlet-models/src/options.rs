//! Typed per-adapter views of the open configuration bag.
//!
//! Each adapter kind validates the keys it needs here, at construction, so a
//! missing field is one typed [`ModelError`] instead of a presence check
//! buried in loading code.

use crate::error::ModelError;
use crate::registry::ModelFamily;
use gauntlet_config::GauntletConfig;
use gauntlet_inference_engine::InferenceConfig;
use std::path::PathBuf;

/// Everything a candle-backed adapter needs: where the weights live and how
/// to sample from them.
#[derive(Debug)]
pub(crate) struct LocalOptions {
    pub model_dir: PathBuf,
    pub max_new_tokens: usize,
    pub dtype: Option<String>,
    pub use_flash_attn: bool,
    pub enable_kv_cache: bool,
    pub inference: InferenceConfig,
}

impl LocalOptions {
    pub fn from_config(family: ModelFamily, config: &GauntletConfig) -> Result<Self, ModelError> {
        let model_dir = config
            .model_dir
            .as_deref()
            .ok_or(ModelError::MissingModelDir { family })?;

        Ok(LocalOptions {
            model_dir: PathBuf::from(model_dir),
            max_new_tokens: config.max_new_tokens,
            dtype: config.dtype.clone(),
            use_flash_attn: config.use_flash_attn,
            enable_kv_cache: config.enable_kv_cache,
            inference: InferenceConfig {
                temperature: config.temperature,
                top_k: config.top_k,
                top_p: config.top_p,
                seed: Some(config.seed),
                repeat_penalty: config.repeat_penalty,
                repeat_last_n: config.repeat_last_n,
            },
        })
    }
}

/// Everything the hosted-chat adapter needs for one authenticated call.
pub(crate) struct RemoteOptions {
    pub api_key: String,
    pub api_base: String,
    pub temperature: f64,
    pub sleep_time: f64,
    pub api_retries: usize,
}

impl RemoteOptions {
    pub fn from_config(config: &GauntletConfig) -> Result<Self, ModelError> {
        let api_key = config
            .openai_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ModelError::MissingApiKey)?;

        Ok(RemoteOptions {
            api_key: api_key.to_string(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            sleep_time: config.sleep_time,
            api_retries: config.api_retries,
        })
    }
}
