use crate::config::{BackendConfig, BackendKind};
use anyhow::{Context, Result, bail};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};
use async_openai::{Client, config::OpenAIConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything the backend needs to produce one answer
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub prompt: &'a str,
    pub thinking: bool,
    /// Context window cap for the call
    pub context_size: u32,
}

/// A model-serving API that turns a prompt into text
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, request: &GenerateRequest<'_>) -> Result<String>;
}

/// Build the backend selected in the configuration
pub fn from_config(config: &BackendConfig) -> Result<Box<dyn ModelBackend>> {
    match config.kind {
        BackendKind::Ollama => Ok(Box::new(OllamaBackend::new(config)?)),
        BackendKind::OpenAi => Ok(Box::new(OpenAiBackend::new(config)?)),
    }
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    think: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorResponse {
    error: String,
}

/// Backend for a local Ollama server
pub struct OllamaBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl OllamaBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    async fn generate(&self, request: &GenerateRequest<'_>) -> Result<String> {
        let body = OllamaGenerateRequest {
            model: request.model,
            system: request.system,
            prompt: request.prompt,
            stream: false,
            think: request.thinking,
            options: OllamaOptions {
                num_ctx: request.context_size,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach Ollama at {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<OllamaErrorResponse>(&text) {
                Ok(err) => err.error,
                Err(_) => text,
            };
            bail!("Ollama returned {}: {}", status, message);
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .await
            .context("Failed to decode Ollama response")?;
        Ok(parsed.response)
    }
}

/// Backend for an OpenAI-compatible chat completions API.
///
/// The context cap is sent as the completion token limit. Thinking mode cannot be
/// toggled through this API.
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
}

impl OpenAiBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let env_var = config
            .env_var_api_key
            .as_deref()
            .context("backend.env_var_api_key is required for the openai backend")?;
        let api_key = std::env::var(env_var)
            .with_context(|| format!("Environment variable {} not found", env_var))?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&config.endpoint);

        Ok(Self {
            client: Client::with_config(openai_config),
        })
    }

    fn build_request(request: &GenerateRequest<'_>) -> Result<CreateChatCompletionRequest> {
        let system_message: ChatCompletionRequestMessage =
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.to_string())
                .build()
                .context("Failed to build system message")?
                .into();

        let user_message: ChatCompletionRequestMessage =
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt.to_string())
                .build()
                .context("Failed to build user message")?
                .into();

        CreateChatCompletionRequestArgs::default()
            .model(request.model)
            .messages([system_message, user_message])
            .max_tokens(request.context_size)
            .build()
            .context("Failed to build chat completion request")
    }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    async fn generate(&self, request: &GenerateRequest<'_>) -> Result<String> {
        if request.thinking {
            tracing::debug!(model = request.model, "thinking flag ignored by openai backend");
        }

        let response = self
            .client
            .chat()
            .create(Self::build_request(request)?)
            .await
            .context("Chat completion request failed")?;

        Ok(response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn request() -> GenerateRequest<'static> {
        GenerateRequest {
            model: "qwen3:14b",
            system: "Be brief.",
            prompt: "=== TASK ===\nInput: 2+2\nOutput:",
            thinking: true,
            context_size: 512,
        }
    }

    fn ollama_config(endpoint: String) -> BackendConfig {
        BackendConfig {
            endpoint,
            ..BackendConfig::default()
        }
    }

    #[tokio::test]
    async fn test_ollama_sends_generate_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(Matcher::PartialJson(json!({
                "model": "qwen3:14b",
                "system": "Be brief.",
                "prompt": "=== TASK ===\nInput: 2+2\nOutput:",
                "stream": false,
                "think": true,
                "options": { "num_ctx": 512 }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"model":"qwen3:14b","response":"4","done":true}"#)
            .create_async()
            .await;

        let backend = OllamaBackend::new(&ollama_config(server.url())).unwrap();
        let output = backend.generate(&request()).await.unwrap();

        assert_eq!(output, "4");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ollama_trailing_slash_in_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_body(r#"{"response":"ok"}"#)
            .create_async()
            .await;

        let backend = OllamaBackend::new(&ollama_config(format!("{}/", server.url()))).unwrap();
        assert_eq!(backend.generate(&request()).await.unwrap(), "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ollama_error_status_surfaces_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(404)
            .with_body(r#"{"error":"model 'qwen3:14b' not found"}"#)
            .create_async()
            .await;

        let backend = OllamaBackend::new(&ollama_config(server.url())).unwrap();
        let err = backend.generate(&request()).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("404"));
        assert!(message.contains("model 'qwen3:14b' not found"));
    }

    #[tokio::test]
    async fn test_ollama_malformed_body_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let backend = OllamaBackend::new(&ollama_config(server.url())).unwrap();
        let err = backend.generate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to decode Ollama response"));
    }

    #[test]
    fn test_openai_backend_requires_key_variable_name() {
        let config = BackendConfig {
            kind: BackendKind::OpenAi,
            ..BackendConfig::default()
        };
        let err = OpenAiBackend::new(&config).err().unwrap();
        assert!(err.to_string().contains("env_var_api_key"));
    }

    #[test]
    fn test_openai_backend_missing_env_var() {
        let config = BackendConfig {
            kind: BackendKind::OpenAi,
            env_var_api_key: Some("PROMPT_EVAL_TEST_MISSING_KEY".to_string()),
            ..BackendConfig::default()
        };

        unsafe {
            std::env::remove_var("PROMPT_EVAL_TEST_MISSING_KEY");
        }

        let err = OpenAiBackend::new(&config).err().unwrap();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_openai_request_caps_tokens_at_context_size() {
        let built = OpenAiBackend::build_request(&request()).unwrap();
        assert_eq!(built.model, "qwen3:14b");
        assert_eq!(built.messages.len(), 2);
        assert_eq!(built.max_tokens, Some(512));
    }
}
