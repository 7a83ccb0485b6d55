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
use tracing::{debug, info, warn};

/// Adapter for vicuna checkpoints. Vicuna is a chat-tuned llama, so the
/// weights load through the llama implementation; every input is rendered
/// through a conversation template (the checkpoint's own, or the v1.1 format
/// for checkpoints that don't embed one).
pub struct VicunaModel {
    model: llama::Llama,
    config: llama::Config,
    tokenizer: Tokenizer,
    chat_template: ChatTemplate,
    device: Device,
    dtype: DType,
    eos_handler: EosTokenHandler,
    options: LocalOptions,
}

impl VicunaModel {
    pub fn new(config: &GauntletConfig) -> Result<Self> {
        let options = LocalOptions::from_config(ModelFamily::Vicuna, config)?;
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
        let llama_config = llama_config.into_config(false);

        let eos_handler: EosTokenHandler = match &llama_config.eos_token_id {
            Some(LlamaEosToks::Single(id)) => EosTokenHandler::Single(*id),
            Some(LlamaEosToks::Multiple(ids)) => EosTokenHandler::Multiple(ids.clone()),
            None => EosTokenHandler::None,
        };

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&safetensors_files, dtype, &device)? };
        let model = llama::Llama::load(vb, &llama_config)?;
        let tokenizer =
            Tokenizer::from_file(options.model_dir.join("tokenizer.json")).map_err(E::msg)?;

        let chat_template = ChatTemplate::from_model_dir(&options.model_dir)?
            .unwrap_or_else(ChatTemplate::vicuna_v1_1);

        Ok(VicunaModel {
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

impl ModelInference for VicunaModel {
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

impl TextGenerator for VicunaModel {
    fn predict(&self, input_text: &str) -> Result<String> {
        let prompt = self.chat_template.render_user(input_text)?;

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
