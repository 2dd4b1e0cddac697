use async_trait::async_trait;
use eyre::{Result, bail, eyre};
use log::debug;
use serde_json::Value;

use crate::config::Config;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Anthropic requires an explicit output budget
const ANTHROPIC_DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Prompt in, text out
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Anthropic,
    OpenAi,
}

impl Provider {
    pub fn for_model(model: &str) -> Self {
        if model.starts_with("claude") {
            Provider::Anthropic
        } else if model.starts_with("gemini") {
            Provider::Gemini
        } else {
            Provider::OpenAi
        }
    }
}

/// Build the generator for `model`, taking its API key from the config
pub fn from_config(client: reqwest::Client, config: &Config, model: &str) -> Result<Box<dyn TextGenerator>> {
    let generator: Box<dyn TextGenerator> = match Provider::for_model(model) {
        Provider::Gemini => {
            let key = config
                .gemini_api_key
                .clone()
                .ok_or_else(|| eyre!("GEMINI_API_KEY not set (required for Gemini models)"))?;
            Box::new(GeminiGenerator::new(client, key, model))
        }
        Provider::Anthropic => {
            let key = config
                .anthropic_api_key
                .clone()
                .ok_or_else(|| eyre!("ANTHROPIC_API_KEY not set (required for Claude models)"))?;
            Box::new(AnthropicGenerator::new(client, key, model))
        }
        Provider::OpenAi => {
            let key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| eyre!("OPENAI_API_KEY not set (required for OpenAI models)"))?;
            Box::new(OpenAiGenerator::new(client, key, model))
        }
    };
    Ok(generator)
}

async fn send_json(provider: &str, req: reqwest::RequestBuilder, body: &Value) -> Result<Value> {
    let resp = req.header("Content-Type", "application/json").json(body).send().await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("{provider} API returned {status}: {body}");
    }

    Ok(resp.json().await?)
}

pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
    pub fn new(client: reqwest::Client, api_key: String, model: &str) -> Self {
        Self {
            client,
            api_key,
            model: model.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        debug!("Generating via Gemini API with model {}", self.model);

        let mut generation_config = serde_json::Map::new();
        if let Some(max_tokens) = request.max_tokens {
            generation_config.insert("maxOutputTokens".into(), max_tokens.into());
        }
        if let Some(temperature) = request.temperature {
            generation_config.insert("temperature".into(), temperature.into());
        }

        let mut body = serde_json::json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{"text": request.prompt}]
                }
            ],
            "generationConfig": generation_config
        });
        if let Some(system) = &request.system {
            body["systemInstruction"] = serde_json::json!({"parts": [{"text": system}]});
        }

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let json = send_json("Gemini", self.client.post(url).header("x-goog-api-key", &self.api_key), &body).await?;
        extract_gemini_text(&json)
    }
}

fn extract_gemini_text(json: &Value) -> Result<String> {
    if let Some(parts) = json.pointer("/candidates/0/content/parts").and_then(|p| p.as_array()) {
        let text: String = parts.iter().filter_map(|p| p.get("text")?.as_str()).collect();
        if !text.is_empty() {
            return Ok(text);
        }
    }
    if let Some(reason) = json.pointer("/promptFeedback/blockReason").and_then(|r| r.as_str()) {
        bail!("Gemini blocked the prompt: {reason}");
    }
    bail!("unexpected Gemini API response format");
}

pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicGenerator {
    pub fn new(client: reqwest::Client, api_key: String, model: &str) -> Self {
        Self {
            client,
            api_key,
            model: model.to_string(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        debug!("Generating via Anthropic API with model {}", self.model);

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
            "messages": [
                {
                    "role": "user",
                    "content": request.prompt
                }
            ]
        });
        if let Some(system) = &request.system {
            body["system"] = system.as_str().into();
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = temperature.into();
        }

        let req = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01");
        let json = send_json("Anthropic", req, &body).await?;
        extract_anthropic_text(&json)
    }
}

/// Joins the `text` blocks of a Messages API reply, skipping thinking and
/// tool blocks. A reply with no text reports its `stop_reason`.
fn extract_anthropic_text(json: &Value) -> Result<String> {
    let blocks = json.get("content").and_then(|c| c.as_array()).map(Vec::as_slice).unwrap_or_default();
    let text = blocks
        .iter()
        .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|block| block.get("text")?.as_str())
        .collect::<String>();
    if !text.trim().is_empty() {
        return Ok(text);
    }

    match json.get("stop_reason").and_then(|r| r.as_str()) {
        Some("refusal") => bail!("Anthropic declined to answer"),
        Some("max_tokens") => bail!("Anthropic ran out of tokens before producing text"),
        Some(reason) => bail!("Anthropic returned no text (stop_reason: {reason})"),
        None => bail!("unexpected Anthropic API response format"),
    }
}

pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiGenerator {
    pub fn new(client: reqwest::Client, api_key: String, model: &str) -> Self {
        Self {
            client,
            api_key,
            model: model.to_string(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        debug!("Generating via OpenAI API with model {}", self.model);

        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": request.prompt}));

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = temperature.into();
        }

        let req = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key);
        let json = send_json("OpenAI", req, &body).await?;
        extract_openai_text(&json)
    }
}

/// Reads the first choice of a chat completion. `content` may be a plain
/// string or a list of typed parts; a `refusal` wins over both.
fn extract_openai_text(json: &Value) -> Result<String> {
    let Some(choice) = json.pointer("/choices/0") else {
        bail!("unexpected OpenAI API response format");
    };
    let message = choice.get("message").unwrap_or(&Value::Null);

    if let Some(refusal) = message.get("refusal").and_then(|r| r.as_str()) {
        bail!("OpenAI refused: {refusal}");
    }

    let text = match message.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter(|part| matches!(part.get("type").and_then(|t| t.as_str()), Some("text" | "output_text")))
            .filter_map(|part| part.get("text")?.as_str())
            .collect(),
        _ => String::new(),
    };
    if !text.trim().is_empty() {
        return Ok(text);
    }

    match choice.get("finish_reason").and_then(|r| r.as_str()) {
        Some(reason) => bail!("OpenAI returned no text (finish_reason: {reason})"),
        None => bail!("unexpected OpenAI API response format"),
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    #[test]
    fn test_provider_for_model() {
        assert_eq!(Provider::for_model("claude-sonnet-4-6"), Provider::Anthropic);
        assert_eq!(Provider::for_model("claude-3-opus-20240229"), Provider::Anthropic);
        assert_eq!(Provider::for_model("gemini-2.0-flash"), Provider::Gemini);
        assert_eq!(Provider::for_model("gpt-4o"), Provider::OpenAi);
        assert_eq!(Provider::for_model("gpt-4o-mini"), Provider::OpenAi);
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = Config::default();
        let err = from_config(reqwest::Client::new(), &config, "gemini-2.0-flash").err().unwrap();
        assert!(err.to_string().contains("GEMINI_API_KEY"));

        let config = Config {
            anthropic_api_key: Some("sk-ant-test".to_string()),
            ..Default::default()
        };
        assert!(from_config(reqwest::Client::new(), &config, "claude-sonnet-4-6").is_ok());
        assert!(from_config(reqwest::Client::new(), &config, "gpt-4o").is_err());
    }

    #[test]
    fn test_extract_gemini_text() {
        let json = serde_json::json!({
            "candidates": [
                {
                    "content": {
                        "role": "model",
                        "parts": [{"text": "Heading\n\n"}, {"text": "Body."}]
                    },
                    "finishReason": "STOP"
                }
            ]
        });
        assert_eq!(extract_gemini_text(&json).unwrap(), "Heading\n\nBody.");
    }

    #[test]
    fn test_extract_gemini_text_blocked() {
        let json = serde_json::json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = extract_gemini_text(&json).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_extract_anthropic_text_skips_non_text_blocks() {
        let json = serde_json::json!({
            "content": [
                {"type": "thinking", "thinking": "The video covers two topics."},
                {"type": "text", "text": "First topic. "},
                {"type": "tool_use", "id": "toolu_1", "name": "lookup", "input": {}},
                {"type": "text", "text": "Second topic."}
            ],
            "stop_reason": "end_turn"
        });
        assert_eq!(extract_anthropic_text(&json).unwrap(), "First topic. Second topic.");
    }

    #[test]
    fn test_extract_anthropic_text_reports_stop_reason() {
        let refused = serde_json::json!({"content": [], "stop_reason": "refusal"});
        assert_eq!(extract_anthropic_text(&refused).unwrap_err().to_string(), "Anthropic declined to answer");

        let truncated = serde_json::json!({
            "content": [{"type": "thinking", "thinking": "..."}],
            "stop_reason": "max_tokens"
        });
        assert!(extract_anthropic_text(&truncated).unwrap_err().to_string().contains("ran out of tokens"));

        let whitespace = serde_json::json!({"content": [{"type": "text", "text": "  "}], "stop_reason": "end_turn"});
        assert!(extract_anthropic_text(&whitespace).unwrap_err().to_string().contains("end_turn"));

        let malformed = serde_json::json!({"error": "nope"});
        assert!(extract_anthropic_text(&malformed).unwrap_err().to_string().contains("unexpected"));
    }

    #[test]
    fn test_extract_openai_text_from_content_parts() {
        let json = serde_json::json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": [
                        {"type": "text", "text": "Part one, "},
                        {"type": "image_url", "image_url": {"url": "https://example.com/x.png"}},
                        {"type": "output_text", "text": "part two."}
                    ]
                },
                "finish_reason": "stop"
            }]
        });
        assert_eq!(extract_openai_text(&json).unwrap(), "Part one, part two.");
    }

    #[test]
    fn test_extract_openai_text_refusal_and_filtering() {
        let refused = serde_json::json!({
            "choices": [{
                "message": {"role": "assistant", "content": null, "refusal": "I can't help with that."},
                "finish_reason": "stop"
            }]
        });
        assert_eq!(
            extract_openai_text(&refused).unwrap_err().to_string(),
            "OpenAI refused: I can't help with that."
        );

        let filtered = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": null}, "finish_reason": "content_filter"}]
        });
        assert!(extract_openai_text(&filtered).unwrap_err().to_string().contains("content_filter"));

        let no_choices = serde_json::json!({"choices": []});
        assert!(extract_openai_text(&no_choices).unwrap_err().to_string().contains("unexpected"));
    }

    #[tokio::test]
    async fn test_gemini_request() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "contents": [{"parts": [{"text": "Summarize this"}]}],
                "generationConfig": {"maxOutputTokens": 500}
            })))
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"A summary"}]}}]}"#)
            .create_async()
            .await;

        let generator = GeminiGenerator::new(reqwest::Client::new(), "test-key".to_string(), "gemini-2.0-flash")
            .with_base_url(&server.url());
        let text = generator
            .generate(&GenerationRequest::new("Summarize this").max_tokens(500).temperature(0.7))
            .await
            .unwrap();
        assert_eq!(text, "A summary");
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
            .create_async()
            .await;

        let generator =
            OpenAiGenerator::new(reqwest::Client::new(), "bad".to_string(), "gpt-4o").with_base_url(&server.url());
        let err = generator.generate(&GenerationRequest::new("hi")).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("OpenAI API returned 401"));
        assert!(msg.contains("Incorrect API key provided"));
    }

    #[tokio::test]
    async fn test_anthropic_request_shape() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-ant")
            .match_header("anthropic-version", "2023-06-01")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "claude-sonnet-4-6",
                "max_tokens": 4096,
                "system": "Be brief."
            })))
            .with_body(r#"{"content":[{"type":"text","text":"Brief."}]}"#)
            .create_async()
            .await;

        let generator = AnthropicGenerator::new(reqwest::Client::new(), "sk-ant".to_string(), "claude-sonnet-4-6")
            .with_base_url(&server.url());
        let request = GenerationRequest {
            system: Some("Be brief.".to_string()),
            ..GenerationRequest::new("Summarize")
        };
        assert_eq!(generator.generate(&request).await.unwrap(), "Brief.");
    }
}
