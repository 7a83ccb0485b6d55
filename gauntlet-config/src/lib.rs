use anyhow::{Context, Error as E, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CliArgs {
    #[arg(long, env = "GAUNTLET_DEBUG", default_value_t = false)]
    debug: bool,

    /// Model identifier to benchmark (e.g. "gpt-4", "llama2-13b-chat").
    #[arg(long, env = "GAUNTLET_MODEL", default_value = "llama2-13b-chat")]
    model: String,

    /// Directory holding local model weights and tokenizer files.
    #[arg(long, env = "GAUNTLET_MODEL_DIR")]
    model_dir: Option<String>,

    /// Credential for the hosted chat API.
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_key: Option<String>,

    /// Base URL of the hosted chat API.
    #[arg(long, env = "GAUNTLET_API_BASE", default_value = "https://api.openai.com/v1")]
    api_base: String,

    /// Attempts per hosted-API predict call before giving up.
    #[arg(long, env = "GAUNTLET_API_RETRIES", default_value_t = 3)]
    api_retries: usize,

    /// The length of the sample to generate (in tokens).
    #[arg(short = 'n', long, env = "GAUNTLET_MAX_NEW_TOKENS", default_value_t = 20)]
    max_new_tokens: usize,

    /// The temperature used to generate samples.
    #[arg(long, env = "GAUNTLET_TEMPERATURE", default_value_t = 0.0)]
    temperature: f64,

    /// Seconds to sleep between failed hosted-API attempts.
    #[arg(long, env = "GAUNTLET_SLEEP_TIME", default_value_t = 3.0)]
    sleep_time: f64,

    /// Nucleus sampling probability cutoff.
    #[arg(long, env = "GAUNTLET_TOP_P")]
    top_p: Option<f64>,

    /// Only sample among the top K samples.
    #[arg(long, env = "GAUNTLET_TOP_K")]
    top_k: Option<usize>,

    /// The seed to use when generating random samples.
    #[arg(long, env = "GAUNTLET_SEED", default_value_t = 299792458)]
    seed: u64,

    /// Disable the key-value cache.
    #[arg(long, env = "GAUNTLET_ENABLE_KV_CACHE", default_value_t = true)]
    enable_kv_cache: bool,

    /// Use a different dtype than the adapter's default.
    #[arg(long, env = "GAUNTLET_DTYPE")]
    dtype: Option<String>,

    #[arg(long, env = "GAUNTLET_USE_FLASH_ATTN", default_value_t = false)]
    use_flash_attn: bool,

    /// Penalty to be applied for repeating tokens, 1. means no penalty.
    #[arg(long, env = "GAUNTLET_REPEAT_PENALTY", default_value_t = 1.0)]
    repeat_penalty: f32,

    /// The context size to consider for the repeat penalty.
    #[arg(long, env = "GAUNTLET_REPEAT_LAST_N", default_value_t = 128)]
    repeat_last_n: usize,

    #[arg(long, env = "GAUNTLET_CONFIG_FILE")]
    config_file: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GauntletConfig {
    pub debug: bool,
    pub model: String,
    pub model_dir: Option<String>,
    pub openai_key: Option<String>,
    pub api_base: String,
    pub api_retries: usize,
    pub max_new_tokens: usize,
    pub temperature: f64,
    pub sleep_time: f64,
    pub top_p: Option<f64>,
    pub top_k: Option<usize>,
    pub seed: u64,
    pub enable_kv_cache: bool,
    pub dtype: Option<String>,
    pub use_flash_attn: bool,
    pub repeat_penalty: f32,
    pub repeat_last_n: usize,
}

impl GauntletConfig {
    pub fn new() -> Result<GauntletConfig, E> {
        let args = CliArgs::parse();

        let config = if let Some(config_file) = args.config_file {
            let config_path = Path::new(&config_file);
            let content = fs::read_to_string(config_path).with_context(|| {
                format!("Config file not found: {}", config_path.to_string_lossy())
            })?;
            serde_yaml::from_str(&content).with_context(|| "Failed to deserialize YAML config")?
        } else {
            GauntletConfig {
                debug: args.debug,
                model: args.model,
                model_dir: args.model_dir,
                openai_key: args.openai_key,
                api_base: args.api_base,
                api_retries: args.api_retries,
                max_new_tokens: args.max_new_tokens,
                temperature: args.temperature,
                sleep_time: args.sleep_time,
                top_p: args.top_p,
                top_k: args.top_k,
                seed: args.seed,
                enable_kv_cache: args.enable_kv_cache,
                dtype: args.dtype,
                use_flash_attn: args.use_flash_attn,
                repeat_penalty: args.repeat_penalty,
                repeat_last_n: args.repeat_last_n,
            }
        };

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_YAML: &str = r#"
debug: false
model: "gpt-4"
model_dir: null
openai_key: "sk-test"
api_base: "https://api.openai.com/v1"
api_retries: 3
max_new_tokens: 20
temperature: 0.0
sleep_time: 3.0
top_p: null
top_k: null
seed: 299792458
enable_kv_cache: true
dtype: null
use_flash_attn: false
repeat_penalty: 1.0
repeat_last_n: 128
"#;

    #[test]
    fn test_yaml_config_deserializes() {
        let config: GauntletConfig = serde_yaml::from_str(FULL_YAML).unwrap();

        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.openai_key.as_deref(), Some("sk-test"));
        assert_eq!(config.max_new_tokens, 20);
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.sleep_time, 3.0);
        assert!(config.model_dir.is_none());
    }

    #[test]
    fn test_yaml_config_rejects_missing_fields() {
        let result = serde_yaml::from_str::<GauntletConfig>("model: \"gpt-4\"\n");

        assert!(result.is_err());
    }
}
