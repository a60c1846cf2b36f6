use std::time::Duration;

use canary_extract::{GenerationError, GenerationRequest, OutputContract, TextGenerator};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::retry::{is_retryable_http_error, new_request_id, next_backoff_ms, should_retry_status};

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Error)]
/// Enumerates supported `OpenAiSetupError` values.
pub enum OpenAiSetupError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("invalid {header} header: {source}")]
    InvalidHeader {
        header: &'static str,
        source: reqwest::header::InvalidHeaderValue,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
/// Public struct `OpenAiGeneratorConfig` used to construct [`OpenAiGenerator`].
pub struct OpenAiGeneratorConfig {
    pub api_base: String,
    pub api_key: String,
    pub organization: Option<String>,
    pub request_timeout_ms: u64,
    pub max_retries: usize,
}

impl OpenAiGeneratorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            api_key: api_key.into(),
            organization: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone)]
/// Blocking chat-completions client implementing [`TextGenerator`].
pub struct OpenAiGenerator {
    client: reqwest::blocking::Client,
    config: OpenAiGeneratorConfig,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiGeneratorConfig) -> Result<Self, OpenAiSetupError> {
        if config.api_key.trim().is_empty() {
            return Err(OpenAiSetupError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|source| OpenAiSetupError::InvalidHeader {
                header: "authorization",
                source,
            })?,
        );
        if let Some(org) = &config.organization {
            headers.insert(
                "OpenAI-Organization",
                HeaderValue::from_str(org).map_err(|source| OpenAiSetupError::InvalidHeader {
                    header: "OpenAI-Organization",
                    source,
                })?,
            );
        }

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiGeneratorConfig {
        &self.config
    }

    fn chat_completions_url(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            return base.to_string();
        }

        format!("{base}/chat/completions")
    }

    fn post_with_retries(&self, body: &Value) -> Result<String, GenerationError> {
        let url = self.chat_completions_url();
        let max_retries = self.config.max_retries;

        for attempt in 0..=max_retries {
            let response = self
                .client
                .post(&url)
                .header("x-canary-request-id", new_request_id())
                .header("x-canary-retry-attempt", attempt.to_string())
                .json(body)
                .send();

            match response {
                Ok(response) => {
                    let status = response.status();
                    let raw = response.text().map_err(map_transport_error)?;
                    if status.is_success() {
                        return Ok(raw);
                    }
                    if attempt < max_retries && should_retry_status(status.as_u16()) {
                        let backoff_ms = next_backoff_ms(attempt);
                        tracing::debug!(
                            status = status.as_u16(),
                            attempt,
                            backoff_ms,
                            "retrying chat completion"
                        );
                        std::thread::sleep(Duration::from_millis(backoff_ms));
                        continue;
                    }
                    return Err(GenerationError::Unavailable(format!(
                        "openai status {}: {raw}",
                        status.as_u16()
                    )));
                }
                Err(error) => {
                    if attempt < max_retries && is_retryable_http_error(&error) {
                        let backoff_ms = next_backoff_ms(attempt);
                        tracing::debug!(
                            error = %error,
                            attempt,
                            backoff_ms,
                            "retrying chat completion after transport error"
                        );
                        std::thread::sleep(Duration::from_millis(backoff_ms));
                        continue;
                    }
                    return Err(map_transport_error(error));
                }
            }
        }

        Err(GenerationError::Unavailable(
            "request retry loop terminated unexpectedly".to_string(),
        ))
    }
}

impl TextGenerator for OpenAiGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = build_chat_request_body(request);
        let raw = self.post_with_retries(&body)?;
        parse_chat_response(&raw)
    }
}

fn map_transport_error(error: reqwest::Error) -> GenerationError {
    if error.is_timeout() {
        GenerationError::Timeout(error.to_string())
    } else {
        GenerationError::Unavailable(error.to_string())
    }
}

fn build_chat_request_body(request: &GenerationRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": [
            {"role": "system", "content": request.system_prompt},
            {"role": "user", "content": to_openai_user_content(request)},
        ],
    });

    if let OutputContract::Strict { name, schema } = &request.contract {
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": name,
                "schema": schema,
                "strict": true,
            },
        });
    }

    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }

    body
}

fn to_openai_user_content(request: &GenerationRequest) -> Value {
    if request.user.image_refs.is_empty() {
        return Value::String(request.user.text.clone());
    }

    let mut parts = vec![json!({"type": "text", "text": request.user.text})];
    parts.extend(request.user.image_refs.iter().map(|url| {
        json!({
            "type": "image_url",
            "image_url": { "url": url },
        })
    }));
    Value::Array(parts)
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<Value>,
    refusal: Option<String>,
}

fn parse_chat_response(raw: &str) -> Result<String, GenerationError> {
    let parsed: OpenAiChatResponse = serde_json::from_str(raw).map_err(|error| {
        GenerationError::Unavailable(format!("invalid chat completion envelope: {error}"))
    })?;
    let choice = parsed.choices.into_iter().next().ok_or_else(|| {
        GenerationError::Unavailable("response contained no choices".to_string())
    })?;

    let text = content_text(choice.message.content.as_ref());
    if text.trim().is_empty() {
        if let Some(refusal) = choice.message.refusal.filter(|value| !value.trim().is_empty()) {
            return Err(GenerationError::Unavailable(format!(
                "model refused the request: {refusal}"
            )));
        }
    }
    Ok(text)
}

fn content_text(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(Value::as_object)
            .filter(|part| part.get("type").and_then(Value::as_str).unwrap_or("text") == "text")
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use canary_extract::{
        GenerationError, GenerationRequest, OutputContract, UserContent,
    };
    use serde_json::json;

    use super::{
        build_chat_request_body, parse_chat_response, OpenAiGenerator, OpenAiGeneratorConfig,
        OpenAiSetupError,
    };

    fn request(contract: OutputContract, image_refs: Vec<String>) -> GenerationRequest {
        GenerationRequest {
            model: "gpt-4.1-mini".to_string(),
            system_prompt: "system".to_string(),
            user: UserContent {
                text: "Title: VPN down".to_string(),
                image_refs,
            },
            contract,
            max_tokens: Some(512),
            temperature: Some(0.2),
        }
    }

    #[test]
    fn unit_strict_contract_requests_json_schema_response_format() {
        let body = build_chat_request_body(&request(
            OutputContract::Strict {
                name: "ticket_summary".to_string(),
                schema: json!({"type": "object"}),
            },
            Vec::new(),
        ));
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "ticket_summary");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Title: VPN down");
        assert_eq!(body["max_tokens"], 512);
    }

    #[test]
    fn unit_free_text_contract_omits_response_format_and_attaches_images() {
        let body = build_chat_request_body(&request(
            OutputContract::FreeText,
            vec!["https://cdn.example.com/1.png".to_string()],
        ));
        assert!(body.get("response_format").is_none());
        let content = body["messages"][1]["content"].as_array().expect("content parts");
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "https://cdn.example.com/1.png");
    }

    #[test]
    fn unit_parse_chat_response_reads_string_and_part_content() {
        let plain = parse_chat_response(
            &json!({"choices": [{"message": {"content": "hello"}}]}).to_string(),
        )
        .expect("plain");
        assert_eq!(plain, "hello");

        let parts = parse_chat_response(
            &json!({"choices": [{"message": {"content": [
                {"type": "text", "text": "a"},
                {"type": "text", "text": "b"}
            ]}}]})
            .to_string(),
        )
        .expect("parts");
        assert_eq!(parts, "ab");
    }

    #[test]
    fn regression_parse_chat_response_reports_refusals_and_bad_envelopes() {
        let refusal = parse_chat_response(
            &json!({"choices": [{"message": {"content": null, "refusal": "cannot help"}}]})
                .to_string(),
        )
        .expect_err("refusal");
        assert!(matches!(refusal, GenerationError::Unavailable(ref detail) if detail.contains("cannot help")));

        let empty = parse_chat_response(&json!({"choices": []}).to_string()).expect_err("no choices");
        assert_eq!(empty.kind(), "unavailable");
        assert!(parse_chat_response("<html>").is_err());
    }

    #[test]
    fn unit_generator_requires_api_key() {
        let error = OpenAiGenerator::new(OpenAiGeneratorConfig::new("  ")).expect_err("missing key");
        assert!(matches!(error, OpenAiSetupError::MissingApiKey));
    }
}
