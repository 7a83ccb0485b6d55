use crate::options::LocalOptions;
use crate::registry::ModelFamily;
use crate::utils::{check_model_dir, device, load_safetensor_model_files, parse_dtype};
use anyhow::{Context, Error as E, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::t5;
use gauntlet_config::GauntletConfig;
use gauntlet_inference_engine::{EosTokenHandler, TextGenerator};
use std::fs::File;
use std::sync::Mutex;
use tokenizers::Tokenizer;

#[allow(unused_imports)]
use tracing::{debug, info, warn};

/// Encoder-decoder adapter for the flan-t5 checkpoint.
///
/// The t5 implementation keeps its KV cache inside the model, so the model
/// sits behind a mutex and the cache is cleared at the start of every call.
pub struct FlanT5Model {
    model: Mutex<t5::T5ForConditionalGeneration>,
    t5_config: t5::Config,
    tokenizer: Tokenizer,
    device: Device,
    eos_handler: EosTokenHandler,
    options: LocalOptions,
}

impl FlanT5Model {
    pub fn new(config: &GauntletConfig) -> Result<Self> {
        let options = LocalOptions::from_config(ModelFamily::FlanT5, config)?;
        let device = device()?;
        // flan-t5 checkpoints ship f32 weights
        let dtype = parse_dtype(&options.dtype, DType::F32)?;
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
        let t5_config: t5::Config = serde_json::from_reader(&model_config_file)?;

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&safetensors_files, dtype, &device)? };
        let model = t5::T5ForConditionalGeneration::load(vb, &t5_config)?;
        let tokenizer =
            Tokenizer::from_file(options.model_dir.join("tokenizer.json")).map_err(E::msg)?;

        let eos_handler = EosTokenHandler::Single(t5_config.eos_token_id as u32);

        Ok(FlanT5Model {
            model: Mutex::new(model),
            t5_config,
            tokenizer,
            device,
            eos_handler,
            options,
        })
    }
}

impl TextGenerator for FlanT5Model {
    fn predict(&self, input_text: &str) -> Result<String> {
        let tokens = self
            .tokenizer
            .encode(input_text, true)
            .map_err(E::msg)?
            .get_ids()
            .to_vec();
        let input_ids = Tensor::new(&tokens[..], &self.device)?.unsqueeze(0)?;

        let mut model = self
            .model
            .lock()
            .map_err(|_| E::msg("t5 model mutex poisoned"))?;
        model.clear_kv_cache();
        let encoder_output = model.encode(&input_ids)?;

        let mut logits_processor = self.options.inference.create_logits_processor();
        let start_token = self
            .t5_config
            .decoder_start_token_id
            .unwrap_or(self.t5_config.pad_token_id) as u32;
        let mut output_token_ids = vec![start_token];

        for index in 0..self.options.max_new_tokens {
            let decoder_token_ids = if index == 0 || !self.t5_config.use_cache {
                Tensor::new(output_token_ids.as_slice(), &self.device)?.unsqueeze(0)?
            } else {
                let last_token = output_token_ids[output_token_ids.len() - 1];
                Tensor::new(&[last_token], &self.device)?.unsqueeze(0)?
            };

            let logits = model.decode(&decoder_token_ids, &encoder_output)?.squeeze(0)?;
            let logits = if self.options.inference.repeat_penalty == 1. {
                logits
            } else {
                let start_at = output_token_ids
                    .len()
                    .saturating_sub(self.options.inference.repeat_last_n);
                candle_transformers::utils::apply_repeat_penalty(
                    &logits,
                    self.options.inference.repeat_penalty,
                    &output_token_ids[start_at..],
                )?
            };

            let next_token = logits_processor.sample(&logits)?;
            if self.eos_handler.is_eos_token(next_token) {
                break;
            }
            output_token_ids.push(next_token);
        }

        debug!("{} tokens generated", output_token_ids.len() - 1);

        let generated_text = self
            .tokenizer
            .decode(&output_token_ids[1..], true)
            .map_err(E::msg)?;

        Ok(generated_text)
    }
}
