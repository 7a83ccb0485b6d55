//! Static registry of supported model identifiers, grouped by family.
//!
//! Each family maps onto exactly one adapter implementation; the facade
//! dispatches with an exhaustive `match` on [`ModelFamily`].

use std::collections::BTreeMap;
use std::fmt;

pub const FLAN_T5_MODELS: &[&str] = &["google/flan-t5-large"];

pub const LLAMA_MODELS: &[&str] = &[
    "llama2-7b",
    "llama2-7b-chat",
    "llama2-13b",
    "llama2-13b-chat",
    "llama2-70b",
    "llama2-70b-chat",
];

pub const GPT_MODELS: &[&str] = &["gpt-3.5-turbo", "gpt-4"];

pub const VICUNA_MODELS: &[&str] = &["vicuna-7b", "vicuna-13b", "vicuna-13b-v1.3"];

pub const UL2_MODELS: &[&str] = &["google/flan-ul2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    FlanT5,
    Llama,
    OpenAi,
    Vicuna,
    Ul2,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 5] = [
        ModelFamily::FlanT5,
        ModelFamily::Llama,
        ModelFamily::OpenAi,
        ModelFamily::Vicuna,
        ModelFamily::Ul2,
    ];

    /// Maps an identifier to its family. Checked in a fixed priority order,
    /// first match wins; unknown identifiers resolve to `None`.
    pub fn resolve(model: &str) -> Option<ModelFamily> {
        if model == FLAN_T5_MODELS[0] {
            Some(ModelFamily::FlanT5)
        } else if LLAMA_MODELS.contains(&model) {
            Some(ModelFamily::Llama)
        } else if GPT_MODELS.contains(&model) {
            Some(ModelFamily::OpenAi)
        } else if VICUNA_MODELS.contains(&model) {
            Some(ModelFamily::Vicuna)
        } else if UL2_MODELS.contains(&model) {
            Some(ModelFamily::Ul2)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::FlanT5 => "t5",
            ModelFamily::Llama => "llama",
            ModelFamily::OpenAi => "gpt",
            ModelFamily::Vicuna => "vicuna",
            ModelFamily::Ul2 => "ul2",
        }
    }

    pub fn members(&self) -> &'static [&'static str] {
        match self {
            ModelFamily::FlanT5 => FLAN_T5_MODELS,
            ModelFamily::Llama => LLAMA_MODELS,
            ModelFamily::OpenAi => GPT_MODELS,
            ModelFamily::Vicuna => VICUNA_MODELS,
            ModelFamily::Ul2 => UL2_MODELS,
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The full family table, for introspection and listing. Not consulted by
/// dispatch, which goes through [`ModelFamily::resolve`].
pub fn model_list() -> BTreeMap<&'static str, &'static [&'static str]> {
    ModelFamily::ALL
        .iter()
        .map(|family| (family.name(), family.members()))
        .collect()
}
