//! Model registry, backend adapters, and the [`LlmModel`] facade.
//!
//! A caller holds one [`LlmModel`]; construction resolves the identifier to a
//! family, builds exactly one backend adapter for it, and every
//! [`LlmModel::predict`] call forwards to that adapter.

pub mod registry;

mod chat_template;
mod dataset;
mod error;
mod flan_t5;
mod llama;
mod openai;
mod options;
mod ul2;
mod utils;
mod vicuna;

pub use dataset::{RawDataset, Scorer};
pub use error::ModelError;
pub use flan_t5::FlanT5Model;
pub use gauntlet_inference_engine::TextGenerator;
pub use llama::LlamaModel;
pub use openai::OpenAiModel;
pub use registry::{ModelFamily, model_list};
pub use ul2::Ul2Model;
pub use vicuna::VicunaModel;

use anyhow::Result;
use gauntlet_config::GauntletConfig;
use std::collections::BTreeMap;

#[allow(unused_imports)]
use tracing::{debug, info, warn};

/// The facade a benchmark run holds: one adapter, chosen by identifier at
/// construction and never changed afterwards.
pub struct LlmModel {
    model: String,
    family: ModelFamily,
    generator: Box<dyn TextGenerator>,
    dataset: Option<RawDataset>,
}

impl LlmModel {
    pub fn new(config: &GauntletConfig) -> Result<LlmModel> {
        let family = ModelFamily::resolve(&config.model)
            .ok_or_else(|| ModelError::UnsupportedModel(config.model.clone()))?;

        if config.temperature > 0.0 {
            warn!(
                "temperature is {}, results may not be reproducible",
                config.temperature
            );
        }

        info!("Creating {} adapter for {}", family, config.model);
        let generator: Box<dyn TextGenerator> = match family {
            ModelFamily::FlanT5 => Box::new(FlanT5Model::new(config)?),
            ModelFamily::Llama => Box::new(LlamaModel::new(config)?),
            ModelFamily::OpenAi => Box::new(OpenAiModel::new(config)?),
            ModelFamily::Vicuna => Box::new(VicunaModel::new(config)?),
            ModelFamily::Ul2 => Box::new(Ul2Model::new(config)?),
        };

        Ok(LlmModel {
            model: config.model.clone(),
            family,
            generator,
            dataset: None,
        })
    }

    /// Forwards arbitrary text to the configured backend and returns its
    /// decoded output.
    pub fn predict(&self, input_text: &str) -> Result<String> {
        self.generator.predict(input_text)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    /// The static family table; see [`registry::model_list`].
    pub fn model_list() -> BTreeMap<&'static str, &'static [&'static str]> {
        registry::model_list()
    }

    /// Attaches the dataset a following [`LlmModel::score_dataset`] call
    /// iterates.
    pub fn set_dataset(&mut self, dataset: RawDataset) {
        self.dataset = Some(dataset);
    }

    /// Runs `predict` once per dataset item and hands the raw outputs to the
    /// scoring collaborator. Fails fast when no dataset is attached.
    pub fn score_dataset(&self, prompt: &str, scorer: &dyn Scorer) -> Result<f64> {
        let dataset = self.dataset.as_ref().ok_or(ModelError::DatasetNotAttached)?;
        let input_texts = scorer.prepare(prompt, dataset)?;

        let mut raw_preds = Vec::with_capacity(input_texts.len());
        for (index, input_text) in input_texts.iter().enumerate() {
            debug!("Predicting item {}/{}", index + 1, input_texts.len());
            raw_preds.push(self.generator.predict(input_text)?);
        }

        scorer.score(dataset, raw_preds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config_for(model: &str) -> GauntletConfig {
        GauntletConfig {
            debug: false,
            model: model.to_string(),
            model_dir: None,
            openai_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            api_retries: 3,
            max_new_tokens: 20,
            temperature: 0.0,
            sleep_time: 3.0,
            top_p: None,
            top_k: None,
            seed: 299792458,
            enable_kv_cache: true,
            dtype: None,
            use_flash_attn: false,
            repeat_penalty: 1.0,
            repeat_last_n: 128,
        }
    }

    fn stub_facade(generator: Box<dyn TextGenerator>) -> LlmModel {
        LlmModel {
            model: "stub".to_string(),
            family: ModelFamily::Llama,
            generator,
            dataset: None,
        }
    }

    struct EchoModel;

    impl TextGenerator for EchoModel {
        fn predict(&self, input_text: &str) -> Result<String> {
            Ok(format!("echo: {input_text}"))
        }
    }

    struct CountingModel {
        calls: Arc<AtomicUsize>,
    }

    impl TextGenerator for CountingModel {
        fn predict(&self, _input_text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("pred".to_string())
        }
    }

    struct PassthroughScorer;

    impl Scorer for PassthroughScorer {
        fn prepare(&self, prompt: &str, dataset: &RawDataset) -> Result<Vec<String>> {
            Ok(dataset
                .items
                .iter()
                .map(|item| format!("{prompt} {item}"))
                .collect())
        }

        fn score(&self, _dataset: &RawDataset, raw_preds: Vec<String>) -> Result<f64> {
            Ok(raw_preds.len() as f64)
        }
    }

    #[test]
    fn test_unsupported_model_is_rejected() {
        let err = LlmModel::new(&config_for("mistral-7b")).unwrap_err();

        match err.downcast_ref::<ModelError>() {
            Some(ModelError::UnsupportedModel(model)) => assert_eq!(model, "mistral-7b"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_local_families_require_model_dir() {
        let cases = [
            ("google/flan-t5-large", ModelFamily::FlanT5),
            ("llama2-7b", ModelFamily::Llama),
            ("vicuna-13b", ModelFamily::Vicuna),
            ("google/flan-ul2", ModelFamily::Ul2),
        ];

        for (model, expected_family) in cases {
            let err = LlmModel::new(&config_for(model)).unwrap_err();
            match err.downcast_ref::<ModelError>() {
                Some(ModelError::MissingModelDir { family }) => {
                    assert_eq!(*family, expected_family, "wrong family for {model}")
                }
                other => panic!("unexpected error for {model}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_remote_family_requires_api_key() {
        for model in ["gpt-3.5-turbo", "gpt-4"] {
            let err = LlmModel::new(&config_for(model)).unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<ModelError>(),
                    Some(ModelError::MissingApiKey)
                ),
                "unexpected error for {model}"
            );
        }
    }

    #[test]
    fn test_stubbed_predict_is_deterministic() {
        let model = stub_facade(Box::new(EchoModel));

        assert_eq!(model.predict("hello").unwrap(), "echo: hello");
        assert_eq!(
            model.predict("hello").unwrap(),
            model.predict("hello").unwrap()
        );
    }

    #[test]
    fn test_model_list_exposes_all_families() {
        let table = LlmModel::model_list();

        assert_eq!(table.len(), 5);
        assert!(table["gpt"].contains(&"gpt-4"));
        assert!(table["llama"].contains(&"llama2-13b-chat"));
    }

    #[test]
    fn test_score_dataset_requires_attached_dataset() {
        let model = stub_facade(Box::new(EchoModel));

        let err = model.score_dataset("classify:", &PassthroughScorer).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::DatasetNotAttached)
        ));
    }

    #[test]
    fn test_score_dataset_predicts_once_per_item() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut model = stub_facade(Box::new(CountingModel {
            calls: Arc::clone(&calls),
        }));
        model.set_dataset(RawDataset::new(
            "sst2",
            vec![
                "a masterpiece".to_string(),
                "dreadful".to_string(),
                "fine, I suppose".to_string(),
            ],
        ));

        let score = model.score_dataset("classify:", &PassthroughScorer).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(score, 3.0);
    }
}
