//! Ollama provider: streamed completions over the local HTTP API.
//!
//! Message-list payloads go to `/api/chat`, flattened prompts to
//! `/api/generate`. Both endpoints stream newline-delimited JSON; each line
//! may carry an answer fragment, a thinking fragment, both, or neither, and
//! a line with `done: true` terminates the stream.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ollachat_core::{ChatPayload, ChatProvider, ChatRequest, ProviderError, StreamEvent, WireMessage};

pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: "http://localhost:11434".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct SamplingOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

impl SamplingOptions {
    fn from_request(request: &ChatRequest) -> Self {
        Self {
            temperature: request.temperature,
            stop: request.stop.clone(),
            num_predict: (request.max_tokens > 0).then_some(request.max_tokens),
        }
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
    stream: bool,
    #[serde(skip_serializing_if = "is_false")]
    think: bool,
    options: SamplingOptions,
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "is_false")]
    think: bool,
    options: SamplingOptions,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One decoded stream line, endpoint-independent.
#[derive(Debug)]
struct StreamDelta {
    answer: String,
    thinking: Option<String>,
    done: bool,
}

#[derive(Deserialize, Default)]
struct ChatLineMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<ChatLineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct GenerateLine {
    #[serde(default)]
    response: String,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

fn parse_chat_line(line: &str) -> Result<StreamDelta, ProviderError> {
    let parsed: ChatLine = serde_json::from_str(line)
        .map_err(|source| ProviderError::Decode(format!("{source}: {line}")))?;
    if let Some(error) = parsed.error {
        return Err(ProviderError::Stream(error));
    }

    let message = parsed.message.unwrap_or_default();
    Ok(StreamDelta {
        answer: message.content,
        thinking: message.thinking,
        done: parsed.done,
    })
}

fn parse_generate_line(line: &str) -> Result<StreamDelta, ProviderError> {
    let parsed: GenerateLine = serde_json::from_str(line)
        .map_err(|source| ProviderError::Decode(format!("{source}: {line}")))?;
    if let Some(error) = parsed.error {
        return Err(ProviderError::Stream(error));
    }

    Ok(StreamDelta {
        answer: parsed.response,
        thinking: parsed.thinking,
        done: parsed.done,
    })
}

impl OllamaProvider {
    async fn send(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<(String, reqwest::Response), ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                url: url.clone(),
                message: source.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok((url, response))
    }

    async fn drain(
        &self,
        url: &str,
        response: reqwest::Response,
        parse: fn(&str) -> Result<StreamDelta, ProviderError>,
        on_event: &mut (dyn FnMut(StreamEvent) + Send),
    ) -> Result<(), ProviderError> {
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| ProviderError::Request {
                url: url.to_string(),
                message: source.to_string(),
            })?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let delta = parse(line)?;
                if let Some(thinking) = delta.thinking {
                    if !thinking.is_empty() {
                        on_event(StreamEvent::Thinking(thinking));
                    }
                }
                if !delta.answer.is_empty() {
                    on_event(StreamEvent::Answer(delta.answer));
                }
                if delta.done {
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest,
        on_event: &mut (dyn FnMut(StreamEvent) + Send),
    ) -> Result<(), ProviderError> {
        let options = SamplingOptions::from_request(request);

        match &request.payload {
            ChatPayload::Messages(messages) => {
                debug!(model = %request.model, messages = messages.len(), "streaming /api/chat");
                let body = ChatBody {
                    model: &request.model,
                    messages,
                    stream: true,
                    think: request.think,
                    options,
                };
                let (url, response) = self.send("/api/chat", &body).await?;
                self.drain(&url, response, parse_chat_line, on_event).await
            }
            ChatPayload::Prompt(prompt) => {
                debug!(model = %request.model, prompt_len = prompt.len(), "streaming /api/generate");
                let body = GenerateBody {
                    model: &request.model,
                    prompt,
                    stream: true,
                    think: request.think,
                    options,
                };
                let (url, response) = self.send("/api/generate", &body).await?;
                self.drain(&url, response, parse_generate_line, on_event)
                    .await
            }
        }
    }
}
