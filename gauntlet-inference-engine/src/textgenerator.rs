use anyhow::Result;

/// Common prediction contract implemented by every backend adapter.
///
/// Takes arbitrary input text, returns whatever decoded text the backend
/// produced for it. Truncation and special-token handling are the backend's
/// business.
pub trait TextGenerator: Send + Sync {
    fn predict(&self, input_text: &str) -> Result<String>;
}
