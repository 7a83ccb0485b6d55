use crate::registry::ModelFamily;
use thiserror::Error;

/// Construction and precondition failures surfaced by the facade and the
/// adapters. All of these are fatal at the point they occur; none is retried.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model `{0}` is not supported")]
    UnsupportedModel(String),

    #[error("model_dir is required for {family} models")]
    MissingModelDir { family: ModelFamily },

    #[error("openai_key is required for hosted chat models")]
    MissingApiKey,

    #[error("no dataset attached; call set_dataset before score_dataset")]
    DatasetNotAttached,

    #[error("chat completion failed after {attempts} attempts: {last_error}")]
    ApiExhausted { attempts: usize, last_error: String },
}
