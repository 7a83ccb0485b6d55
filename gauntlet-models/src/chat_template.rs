//! Chat-template rendering for instruction-tuned checkpoints.
//!
//! Chat-tuned weights expect their conversation format, not raw text; the
//! template ships in the checkpoint's `tokenizer_config.json`. Rendering goes
//! through minijinja with the same context shape the upstream tooling uses
//! (`messages`, `bos_token`, `add_generation_prompt`).

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Deserialize;
use serde_json::{Value, json};
use std::fs::File;
use std::path::Path;

/// Conversation format used by vicuna v1.1 checkpoints, which predate
/// templates embedded in `tokenizer_config.json`.
const VICUNA_V1_1_TEMPLATE: &str = "{{ bos_token }}A chat between a curious user and an artificial intelligence assistant. The assistant gives helpful, detailed, and polite answers to the user's questions.{% for message in messages %}{% if message.role == 'user' %} USER: {{ message.content }}{% elif message.role == 'assistant' %} ASSISTANT: {{ message.content }}</s>{% endif %}{% endfor %}{% if add_generation_prompt %} ASSISTANT:{% endif %}";

#[derive(Debug, Deserialize)]
struct TokenizerConfig {
    chat_template: Option<String>,
    bos_token: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ChatTemplate {
    template: String,
    bos_token: String,
}

impl ChatTemplate {
    /// Loads the template a checkpoint ships in `tokenizer_config.json`.
    /// Returns `None` when the file or the `chat_template` field is absent.
    pub fn from_model_dir(model_dir: &Path) -> Result<Option<ChatTemplate>> {
        let config_path = model_dir.join("tokenizer_config.json");
        if !config_path.exists() {
            return Ok(None);
        }

        let config_file = File::open(&config_path)?;
        let tokenizer_config: TokenizerConfig = serde_json::from_reader(&config_file)?;

        let Some(template) = tokenizer_config.chat_template else {
            return Ok(None);
        };

        Ok(Some(ChatTemplate {
            template,
            bos_token: parse_bos_token(tokenizer_config.bos_token),
        }))
    }

    pub fn vicuna_v1_1() -> ChatTemplate {
        ChatTemplate {
            template: VICUNA_V1_1_TEMPLATE.to_string(),
            bos_token: "<s>".to_string(),
        }
    }

    /// Renders a single user turn, asking the model for its reply.
    pub fn render_user(&self, content: &str) -> Result<String> {
        let mut template_env = Environment::new();
        let template_key = "prompt";
        template_env.add_template(template_key, self.template.as_str())?;

        let messages = vec![json!({"role": "user", "content": content})];

        let template = template_env.get_template(template_key)?;
        let rendered = template.render(context! {
            messages => messages,
            bos_token => self.bos_token.as_str(),
            add_generation_prompt => true,
        })?;

        Ok(rendered)
    }
}

/// `bos_token` is either a plain string or an added-token object with a
/// `content` field, depending on the checkpoint's vintage.
fn parse_bos_token(value: Option<Value>) -> String {
    match value {
        Some(Value::String(token)) => token,
        Some(Value::Object(map)) => map
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_vicuna_template_wraps_user_turn() {
        let template = ChatTemplate::vicuna_v1_1();

        let rendered = template.render_user("What is the capital of Wyoming?").unwrap();
        assert!(rendered.starts_with("<s>A chat between"));
        assert!(rendered.contains("USER: What is the capital of Wyoming?"));
        assert!(rendered.ends_with("ASSISTANT:"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let template = ChatTemplate::vicuna_v1_1();

        assert_eq!(
            template.render_user("hello").unwrap(),
            template.render_user("hello").unwrap()
        );
    }

    #[test]
    fn test_template_loaded_from_tokenizer_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = File::create(dir.path().join("tokenizer_config.json")).unwrap();
        config
            .write_all(
                br#"{"bos_token": "<s>",
                     "chat_template": "{{ bos_token }}[INST] {{ messages[0].content }} [/INST]"}"#,
            )
            .unwrap();

        let template = ChatTemplate::from_model_dir(dir.path()).unwrap().unwrap();
        assert_eq!(template.render_user("hi").unwrap(), "<s>[INST] hi [/INST]");
    }

    #[test]
    fn test_bos_token_as_added_token_object() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = File::create(dir.path().join("tokenizer_config.json")).unwrap();
        config
            .write_all(
                br#"{"bos_token": {"content": "<s>", "lstrip": false},
                     "chat_template": "{{ bos_token }}{{ messages[0].content }}"}"#,
            )
            .unwrap();

        let template = ChatTemplate::from_model_dir(dir.path()).unwrap().unwrap();
        assert_eq!(template.render_user("hi").unwrap(), "<s>hi");
    }

    #[test]
    fn test_missing_template_field_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = File::create(dir.path().join("tokenizer_config.json")).unwrap();
        config.write_all(br#"{"bos_token": "<s>"}"#).unwrap();

        assert!(ChatTemplate::from_model_dir(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();

        assert!(ChatTemplate::from_model_dir(dir.path()).unwrap().is_none());
    }
}
