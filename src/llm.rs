use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::error::MatrixGptError;
use crate::llm_types::{Role, TranscriptEntry};

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// One completion for the whole transcript; returns the reply text.
    async fn complete(&self, transcript: &[TranscriptEntry]) -> Result<String, MatrixGptError>;
}

pub fn create_provider(config: &Config) -> Box<dyn LlmProvider> {
    match config.llm_provider.trim().to_lowercase().as_str() {
        "anthropic" => Box::new(AnthropicProvider::new(config)),
        _ => Box::new(OpenAiProvider::new(config)),
    }
}

fn non_empty(text: String) -> Result<String, MatrixGptError> {
    if text.trim().is_empty() {
        return Err(MatrixGptError::LlmApi("model returned an empty completion".into()));
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// Anthropic provider
// ---------------------------------------------------------------------------

pub struct AnthropicProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(config: &Config) -> Self {
        AnthropicProvider {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            base_url: config
                .llm_base_url
                .clone()
                .unwrap_or_else(|| "https://api.anthropic.com/v1/messages".into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicApiError {
    error: AnthropicApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, transcript: &[TranscriptEntry]) -> Result<String, MatrixGptError> {
        let (system, messages) = translate_transcript_to_anthropic(transcript);
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": messages,
        });

        let response = self
            .http
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            if let Ok(api_err) = serde_json::from_str::<AnthropicApiError>(&text) {
                return Err(MatrixGptError::LlmApi(format!(
                    "{}: {}",
                    api_err.error.error_type, api_err.error.message
                )));
            }
            return Err(MatrixGptError::LlmApi(format!("HTTP {status}: {text}")));
        }

        let parsed: AnthropicResponse = serde_json::from_str(&text).map_err(|e| {
            MatrixGptError::LlmApi(format!("Failed to parse response: {e}\nBody: {text}"))
        })?;
        non_empty(collect_anthropic_text(parsed))
    }
}

fn collect_anthropic_text(response: AnthropicResponse) -> String {
    response
        .content
        .into_iter()
        .filter(|b| b.block_type == "text")
        .filter_map(|b| b.text)
        .collect::<Vec<_>>()
        .join("")
}

/// Split system entries out and shape the rest the way the Messages API
/// accepts them: same-role runs merged, first turn from the user.
fn translate_transcript_to_anthropic(
    transcript: &[TranscriptEntry],
) -> (String, Vec<serde_json::Value>) {
    let system = transcript
        .iter()
        .filter(|e| e.role == Role::System)
        .map(|e| e.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut turns: Vec<(&'static str, String)> = Vec::new();
    for entry in transcript.iter().filter(|e| e.role != Role::System) {
        let role = if entry.role == Role::Assistant {
            "assistant"
        } else {
            "user"
        };
        if turns.is_empty() && role == "assistant" {
            continue;
        }
        match turns.last_mut() {
            Some((last_role, text)) if *last_role == role => {
                text.push_str("\n\n");
                text.push_str(&entry.text);
            }
            _ => turns.push((role, entry.text.clone())),
        }
    }

    let messages = turns
        .into_iter()
        .map(|(role, text)| json!({"role": role, "content": text}))
        .collect();
    (system, messages)
}

// ---------------------------------------------------------------------------
// OpenAI-compatible provider  (OpenAI, OpenRouter, DeepSeek, Groq, Ollama …)
// ---------------------------------------------------------------------------

pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
    chat_url: String,
}

impl OpenAiProvider {
    pub fn new(config: &Config) -> Self {
        let default_base = if config.llm_provider == "ollama" {
            "http://localhost:11434/v1"
        } else {
            "https://api.openai.com/v1"
        };
        let base = config.llm_base_url.as_deref().unwrap_or(default_base);
        let chat_url = format!("{}/chat/completions", base.trim_end_matches('/'));

        OpenAiProvider {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            chat_url,
        }
    }
}

// --- OpenAI response types ---

#[derive(Debug, Deserialize)]
struct OaiResponse {
    choices: Vec<OaiChoice>,
}

#[derive(Debug, Deserialize)]
struct OaiChoice {
    message: OaiMessage,
}

#[derive(Debug, Deserialize)]
struct OaiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OaiErrorResponse {
    error: OaiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OaiErrorDetail {
    message: String,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, transcript: &[TranscriptEntry]) -> Result<String, MatrixGptError> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": translate_transcript_to_oai(transcript),
        });
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }

        let mut req = self
            .http
            .post(&self.chat_url)
            .header("Content-Type", "application/json")
            .json(&body);
        if !self.api_key.trim().is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }
        let response = req.send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<OaiErrorResponse>(&text) {
                return Err(MatrixGptError::LlmApi(err.error.message));
            }
            return Err(MatrixGptError::LlmApi(format!("HTTP {status}: {text}")));
        }

        let oai: OaiResponse = serde_json::from_str(&text).map_err(|e| {
            MatrixGptError::LlmApi(format!("Failed to parse OpenAI response: {e}\nBody: {text}"))
        })?;
        non_empty(first_choice_text(oai))
    }
}

fn first_choice_text(oai: OaiResponse) -> String {
    oai.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default()
}

fn translate_transcript_to_oai(transcript: &[TranscriptEntry]) -> Vec<serde_json::Value> {
    transcript
        .iter()
        .map(|entry| {
            let role = match entry.role {
                Role::System => "system",
                Role::Human => "user",
                Role::Assistant => "assistant",
            };
            json!({"role": role, "content": entry.text})
        })
        .collect()
}
