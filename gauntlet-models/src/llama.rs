use crate::chat_template::ChatTemplate;
use crate::options::LocalOptions;
use crate::registry::ModelFamily;
use crate::utils::{check_model_dir, device, load_safetensor_model_files, parse_dtype};
use anyhow::{Context, Error as E, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::llama;
use gauntlet_config::GauntletConfig;
use gauntlet_inference_engine::{
    EosTokenHandler, InferenceEngine, ModelInference, TextGenerator,
};
use llama::{LlamaConfig, LlamaEosToks};
use std::fs::File;
use tokenizers::Tokenizer;

#[allow(unused_imports)]
use tracing::{debug, error, info, warn};

/// Causal-decoder adapter for llama2 checkpoints. Chat-tuned variants
/// (`*-chat`) render the input through the checkpoint's chat template; base
/// variants take the text as-is.
pub struct LlamaModel {
    model: llama::Llama,
    config: llama::Config,
    tokenizer: Tokenizer,
    chat_template: Option<ChatTemplate>,
    device: Device,
    dtype: DType,
    eos_handler: EosTokenHandler,
    options: LocalOptions,
}

impl LlamaModel {
    pub fn new(config: &GauntletConfig) -> Result<Self> {
        let options = LocalOptions::from_config(ModelFamily::Llama, config)?;
        let device = device()?;
        let dtype = parse_dtype(&options.dtype, DType::F16)?;
        info!("Using device: {:?}, dtype: {:?}", device, dtype);

        check_model_dir(&options.model_dir)?;

        let safetensors_files = load_safetensor_model_files(&options.model_dir).with_context(|| {
            format!(
                "Failed to load safetensors files at {}",
                options.model_dir.display()
            )
        })?;

        let model_config_file = File::open(options.model_dir.join("config.json")).with_context(|| {
            format!(
                "Failed to open model config file at {}",
                options.model_dir.join("config.json").display()
            )
        })?;
        let llama_config: LlamaConfig = serde_json::from_reader(&model_config_file)?;

        // Flash attention is CUDA-only
        let use_flash_attn = match device {
            Device::Cuda(_) => options.use_flash_attn,
            _ => {
                if options.use_flash_attn {
                    warn!("Flash attention is only supported on CUDA, disabling");
                }
                false
            }
        };
        let llama_config = llama_config.into_config(use_flash_attn);

        let eos_handler: EosTokenHandler = match &llama_config.eos_token_id {
            Some(LlamaEosToks::Single(id)) => EosTokenHandler::Single(*id),
            Some(LlamaEosToks::Multiple(ids)) => EosTokenHandler::Multiple(ids.clone()),
            None => EosTokenHandler::None,
        };

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&safetensors_files, dtype, &device)? };
        let model = llama::Llama::load(vb, &llama_config)?;
        let tokenizer =
            Tokenizer::from_file(options.model_dir.join("tokenizer.json")).map_err(E::msg)?;

        let chat_template = if config.model.ends_with("-chat") {
            let template = ChatTemplate::from_model_dir(&options.model_dir)?;
            if template.is_none() {
                warn!(
                    "{} has no chat_template in tokenizer_config.json, prompts go in raw",
                    config.model
                );
            }
            template
        } else {
            None
        };

        Ok(LlamaModel {
            model,
            config: llama_config,
            tokenizer,
            chat_template,
            device,
            dtype,
            eos_handler,
            options,
        })
    }
}

impl ModelInference for LlamaModel {
    type Cache = llama::Cache;

    fn create_cache(&self, enable_kv_cache: bool, dtype: DType, device: &Device) -> Result<Self::Cache> {
        llama::Cache::new(enable_kv_cache, dtype, &self.config, device).map_err(E::from)
    }

    fn forward(&self, input: &Tensor, context_index: usize, cache: &mut Self::Cache) -> Result<Tensor> {
        self.model.forward(input, context_index, cache).map_err(E::from)
    }

    fn device(&self) -> &Device {
        &self.device
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn use_kv_cache(&self) -> bool {
        self.options.enable_kv_cache
    }

    fn eos_handler(&self) -> &EosTokenHandler {
        &self.eos_handler
    }
}

impl TextGenerator for LlamaModel {
    fn predict(&self, input_text: &str) -> Result<String> {
        let prompt = match &self.chat_template {
            Some(template) => template.render_user(input_text)?,
            None => input_text.to_string(),
        };

        let tokens = self
            .tokenizer
            .encode(prompt.as_str(), true)
            .map_err(E::msg)?
            .get_ids()
            .to_vec();

        let generated_tokens = InferenceEngine::generate(
            self,
            tokens,
            self.options.max_new_tokens,
            &self.options.inference,
        )?;
        let generated_text = self.tokenizer.decode(&generated_tokens, true).map_err(E::msg)?;

        Ok(generated_text)
    }
}
