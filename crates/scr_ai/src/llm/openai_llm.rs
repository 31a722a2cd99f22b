use scr_core::config::ModelConfig;
use scr_core::error::{AppError, LLM_REQUEST_FAILED};
use serde::{Deserialize, Serialize};

use super::Llm;
use crate::openai::ApiClient;

#[derive(Debug, Clone)]
pub struct OpenAiLlm {
    client: ApiClient,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiLlm {
    pub fn new(client: ApiClient, cfg: &ModelConfig) -> Self {
        Self {
            client,
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl Llm for OpenAiLlm {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError> {
        let req = ChatRequest {
            model,
            messages: vec![ChatRequestMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let resp: ChatResponse = self
            .client
            .post_json("chat/completions", &req, LLM_REQUEST_FAILED)
            .map_err(|e| {
                let details = format!("model={model}; {}", e.details.as_deref().unwrap_or(""));
                e.with_details(details)
            })?;

        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(AppError::new(LLM_REQUEST_FAILED, "Model response was empty")
                .with_details(format!("model={model}")));
        }
        Ok(text)
    }
}
