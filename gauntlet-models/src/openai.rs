use crate::error::ModelError;
use crate::options::RemoteOptions;
use anyhow::{Result, bail};
use gauntlet_config::GauntletConfig;
use gauntlet_inference_engine::TextGenerator;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[allow(unused_imports)]
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Adapter for the hosted chat-completions API. One blocking HTTP call per
/// attempt, up to `api_retries` attempts with a jittered sleep in between;
/// when the budget is spent the last failure surfaces as
/// [`ModelError::ApiExhausted`].
pub struct OpenAiModel {
    client: reqwest::blocking::Client,
    model: String,
    options: RemoteOptions,
}

impl OpenAiModel {
    pub fn new(config: &GauntletConfig) -> Result<Self> {
        let options = RemoteOptions::from_config(config)?;

        if options.sleep_time <= 0.0 {
            warn!(
                "sleep_time is {}, failed calls will be retried almost immediately",
                options.sleep_time
            );
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(OpenAiModel {
            client,
            model: config.model.clone(),
            options,
        })
    }

    fn chat_completion(&self, input_text: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.options.api_base);
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: input_text,
            }],
            temperature: self.options.temperature,
        };

        debug!("Sending chat completion request to {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.options.api_key)
            .json(&payload)
            .send()?;

        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            bail!("chat completion request failed ({code}): {body}");
        }

        let response: ChatResponse = response.json()?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(|message| message.content);

        match content {
            Some(content) => Ok(content),
            None => bail!("chat completion response has no content"),
        }
    }
}

impl TextGenerator for OpenAiModel {
    fn predict(&self, input_text: &str) -> Result<String> {
        let attempts = self.options.api_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.chat_completion(input_text) {
                Ok(content) => return Ok(content),
                Err(err) => {
                    warn!("Chat completion attempt {attempt}/{attempts} failed: {err:#}");
                    last_error = format!("{err:#}");
                    if attempt < attempts {
                        std::thread::sleep(jittered_delay(self.options.sleep_time));
                    }
                }
            }
        }

        Err(ModelError::ApiExhausted {
            attempts,
            last_error,
        }
        .into())
    }
}

/// The configured delay plus a sub-second random offset.
fn jittered_delay(sleep_time: f64) -> Duration {
    Duration::from_secs_f64(sleep_time.max(0.0) + rand::random::<f64>())
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn remote_config(api_base: &str, sleep_time: f64, api_retries: usize) -> GauntletConfig {
        GauntletConfig {
            debug: false,
            model: "gpt-4".to_string(),
            model_dir: None,
            openai_key: Some("sk-test".to_string()),
            api_base: api_base.to_string(),
            api_retries,
            max_new_tokens: 20,
            temperature: 0.0,
            sleep_time,
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

    #[test]
    fn test_jittered_delay_stays_in_range() {
        for _ in 0..64 {
            let delay = jittered_delay(3.0);
            assert!(delay >= Duration::from_secs_f64(3.0));
            assert!(delay < Duration::from_secs_f64(4.0));
        }
    }

    #[test]
    fn test_jittered_delay_clamps_negative_base() {
        let delay = jittered_delay(-2.0);
        assert!(delay < Duration::from_secs(1));
    }

    #[test]
    fn test_unreachable_endpoint_sleeps_then_fails() {
        // Nothing listens on port 1, so every attempt fails outright; the
        // call must still block for at least one configured delay before the
        // typed failure comes back.
        let config = remote_config("http://127.0.0.1:1", 0.2, 2);
        let model = OpenAiModel::new(&config).unwrap();

        let started = Instant::now();
        let err = model.predict("hello").unwrap_err();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs_f64(0.2), "no sleep happened");
        match err.downcast_ref::<ModelError>() {
            Some(ModelError::ApiExhausted { attempts, .. }) => assert_eq!(*attempts, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_api_key_is_fatal_at_construction() {
        let mut config = remote_config("http://127.0.0.1:1", 0.0, 1);
        config.openai_key = None;

        let err = OpenAiModel::new(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::MissingApiKey)
        ));
    }
}
