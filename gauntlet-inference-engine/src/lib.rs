pub mod eos;
pub mod inference_engine;
pub mod textgenerator;

pub use eos::EosTokenHandler;
pub use inference_engine::{InferenceConfig, InferenceEngine, ModelInference};
pub use textgenerator::TextGenerator;
