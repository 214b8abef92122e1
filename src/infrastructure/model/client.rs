//! Streaming completion client for OpenAI-compatible chat backends.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::retry::RetryPolicy;
use super::stream::{
    ChunkChoice, ChunkDelta, CompletionChunk, FunctionDelta, StreamDecoder, ToolCallDelta,
};
use super::types::{ModelError, TurnResult};
use crate::config::LlmConfig;
use crate::domain::types::{ChatMessage, ReasoningBlock, TokenUsage};

const DONE_MARKER: &str = "[DONE]";

/// Seam between the agent loop and the model backend. The production
/// implementation is [`LlmClient`]; tests script it.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run one model turn over the full trajectory, offering the given tool
    /// schemas, and return the finalized result.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<TurnResult, ModelError>;
}

#[derive(Serialize)]
struct CompletionPayload<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
    presence_penalty: f64,
    frequency_penalty: f64,
    enable_thinking: bool,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [Value],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel_tool_calls: Option<bool>,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    #[serde(default)]
    message: ResponseMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    reasoning_details: Option<Vec<ReasoningBlock>>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default)]
    call_type: Option<String>,
    #[serde(default)]
    function: FunctionDelta,
}

/// Completion client owning the network call: transport selection,
/// whole-call deadline, and retry with exponential backoff on
/// transport-transient failures.
pub struct LlmClient {
    http: Client,
    config: LlmConfig,
    retry: RetryPolicy,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self::with_retry(config, RetryPolicy::default())
    }

    pub fn with_retry(config: LlmConfig, retry: RetryPolicy) -> Self {
        Self {
            http: Client::new(),
            config,
            retry,
        }
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    fn payload<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        tools: &'a [Value],
        stream: bool,
    ) -> CompletionPayload<'a> {
        CompletionPayload {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            top_p: 1.0,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            enable_thinking: self.config.enable_thinking,
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
            tools,
            tool_choice: (!tools.is_empty()).then_some("auto"),
            parallel_tool_calls: (!tools.is_empty()).then_some(true),
        }
    }

    async fn complete_once(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<TurnResult, ModelError> {
        if self.config.stream {
            self.complete_streaming(messages, tools).await
        } else {
            self.complete_single_shot(messages, tools).await
        }
    }

    async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<TurnResult, ModelError> {
        let request = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&self.payload(messages, tools, true));

        let mut source = EventSource::new(request)
            .map_err(|err| ModelError::Stream(format!("failed to open event stream: {err}")))?;
        let mut decoder = StreamDecoder::new();

        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(message)) => {
                    if message.data == DONE_MARKER {
                        break;
                    }
                    match serde_json::from_str::<CompletionChunk>(&message.data) {
                        Ok(chunk) => decoder.apply(&chunk),
                        Err(err) => {
                            debug!(error = %err, "skipping undecodable stream fragment");
                        }
                    }
                }
                Err(EventSourceError::StreamEnded) => break,
                Err(EventSourceError::InvalidStatusCode(status, response)) => {
                    source.close();
                    return Err(status_error(status.as_u16(), response).await);
                }
                Err(EventSourceError::Transport(err)) => {
                    source.close();
                    return Err(ModelError::Network(err));
                }
                Err(err) => {
                    source.close();
                    return Err(ModelError::Stream(err.to_string()));
                }
            }
        }
        source.close();

        decoder.finish()
    }

    /// Single-shot transport: one response object, decoded as a degenerate
    /// one-fragment stream so argument repair and slot ordering are applied
    /// uniformly.
    async fn complete_single_shot(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<TurnResult, ModelError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&self.payload(messages, tools, false))
            .send()
            .await?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(status_error(status, response).await);
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|err| ModelError::InvalidResponse(format!("malformed body: {err}")))?;
        decode_single_shot(body)
    }
}

fn decode_single_shot(body: CompletionResponse) -> Result<TurnResult, ModelError> {
    let usage = body.usage;
    let message = body
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| ModelError::InvalidResponse("response contained no choices".into()))?;

    let tool_calls = message.tool_calls.map(|calls| {
        calls
            .into_iter()
            .enumerate()
            .map(|(position, call)| ToolCallDelta {
                index: position as u32,
                id: call.id,
                call_type: call.call_type,
                function: Some(call.function),
            })
            .collect()
    });

    let mut decoder = StreamDecoder::new();
    decoder.apply(&CompletionChunk {
        choices: vec![ChunkChoice {
            delta: ChunkDelta {
                content: message.content,
                reasoning_content: message.reasoning_content,
                reasoning: message.reasoning,
                reasoning_details: message.reasoning_details,
                tool_calls,
            },
            finish_reason: None,
        }],
        usage,
    });
    decoder.finish()
}

async fn status_error(status: u16, response: reqwest::Response) -> ModelError {
    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        return ModelError::RateLimited { retry_after };
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "(no body)".to_string());
    ModelError::Api { status, message }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<TurnResult, ModelError> {
        let deadline = Duration::from_secs_f64(self.config.timeout_secs);
        let mut attempt = 0u32;
        loop {
            info!(
                model = self.config.model.as_str(),
                messages = messages.len(),
                tools = tools.len(),
                streaming = self.config.stream,
                attempt,
                "requesting completion"
            );

            let outcome = match tokio::time::timeout(deadline, self.complete_once(messages, tools))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ModelError::Timeout(deadline)),
            };

            match outcome {
                Ok(turn) => {
                    info!(
                        content_chars = turn.content.len(),
                        reasoning_chars = turn.reasoning.aggregated_text.len(),
                        tool_calls = turn.tool_calls.len(),
                        total_tokens = turn.usage.map(|u| u.total_tokens).unwrap_or_default(),
                        "completion finished"
                    );
                    return Ok(turn);
                }
                Err(err) if self.retry.should_retry(&err, attempt) => {
                    let delay = self.retry.delay_for(&err, attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient completion failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(error = %err, "completion failed");
                    return Err(err);
                }
            }
        }
    }
}
