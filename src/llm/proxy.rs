//! Upstream request lifecycle for the `/submit_llm` proxy.
//!
//! The streaming path wires [`LineParser`] -> [`decode_line`] ->
//! [`TokenCoalescer`] and re-emits a normalized `data:` frame stream over a
//! bounded channel. The bounded channel provides backpressure from a slow
//! downstream client back to the upstream connection; when the client
//! disconnects the receiver drops, sends fail, and the task returns, releasing
//! the upstream connection.

use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::config::LlmApiConfig;

use super::coalesce::TokenCoalescer;
use super::sse::{decode_line, DecodedEvent, LineParser, DONE_SENTINEL};

/// Channel capacity for in-flight output events.
const EVENT_BUFFER_SIZE: usize = 32;

/// Downstream request body for `/submit_llm`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitLlmRequest {
    pub system_message: String,
    pub prompt: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_tokens: u32,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

/// One chat message in the upstream request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// Upstream chat-completions request. Built once per downstream call,
/// immutable thereafter.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_tokens: u32,
    pub stream: bool,
}

/// Build the upstream request shared by the streaming and non-streaming
/// branches.
pub fn build_chat_request(config: &LlmApiConfig, req: &SubmitLlmRequest) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages: vec![
            ChatMessage {
                role: "system",
                content: req.system_message.clone(),
            },
            ChatMessage {
                role: "user",
                content: req.prompt.clone(),
            },
        ],
        temperature: req.temperature,
        top_p: req.top_p,
        top_k: req.top_k,
        max_tokens: req.max_tokens,
        stream: req.stream,
    }
}

/// A downstream-visible frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// Joined batch of coalesced tokens.
    Tokens(String),
    /// Terminal `[DONE]` marker.
    Done,
    /// Error surfaced inside the data channel.
    Error(String),
}

impl OutputEvent {
    /// Render the event as a wire frame: `data:<payload>\n\n`.
    pub fn into_frame(self) -> String {
        match self {
            OutputEvent::Tokens(text) => format!("data:{}\n\n", text),
            OutputEvent::Done => format!("data:{}\n\n", DONE_SENTINEL),
            OutputEvent::Error(msg) => format!("data:Error: {}\n\n", msg),
        }
    }
}

/// Error from the non-streaming completion path.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("{0}")]
    Transport(String),

    #[error("Invalid response format")]
    InvalidBody,
}

/// Run a streaming completion, producing a finite sequence of output events.
///
/// The sequence is not restartable: transport failures before or during the
/// stream yield exactly one `Error` event and then end. A stream that closes
/// without the `[DONE]` sentinel is treated as implicit completion, flushing
/// buffered tokens and ending cleanly so downstream callers never hang.
pub fn stream_completion(
    client: reqwest::Client,
    url: String,
    idle_timeout: Option<Duration>,
    request: ChatRequest,
) -> ReceiverStream<OutputEvent> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER_SIZE);

    tokio::spawn(async move {
        run_stream(client, url, idle_timeout, request, tx).await;
    });

    ReceiverStream::new(rx)
}

async fn run_stream(
    client: reqwest::Client,
    url: String,
    idle_timeout: Option<Duration>,
    request: ChatRequest,
    tx: mpsc::Sender<OutputEvent>,
) {
    let response = match client.post(&url).json(&request).send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!("Upstream LLM request failed: {}", e);
            let _ = tx.send(OutputEvent::Error(e.to_string())).await;
            return;
        }
    };

    let response = match response.error_for_status() {
        Ok(resp) => resp,
        Err(e) => {
            warn!("Upstream LLM returned error status: {}", e);
            let _ = tx.send(OutputEvent::Error(e.to_string())).await;
            return;
        }
    };

    let mut upstream = response.bytes_stream();
    let mut parser = LineParser::new();
    let mut coalescer = TokenCoalescer::new();

    loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, upstream.next()).await {
                Ok(item) => item,
                Err(_) => {
                    warn!("Upstream LLM stream idle for {:?}, closing", limit);
                    let _ = tx
                        .send(OutputEvent::Error("Upstream stream timed out".to_string()))
                        .await;
                    return;
                }
            },
            None => upstream.next().await,
        };

        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                warn!("Upstream LLM stream error: {}", e);
                let _ = tx.send(OutputEvent::Error(e.to_string())).await;
                return;
            }
            // Upstream closed without [DONE]: implicit completion.
            None => break,
        };

        let lines = match parser.feed(&chunk) {
            Ok(lines) => lines,
            Err(e) => {
                warn!("Upstream LLM stream is not valid UTF-8: {}", e);
                let _ = tx
                    .send(OutputEvent::Error(
                        "Invalid encoding in upstream stream".to_string(),
                    ))
                    .await;
                return;
            }
        };

        for line in lines {
            match forward_line(&line, &mut coalescer, &tx).await {
                LineOutcome::Continue => {}
                LineOutcome::Finished => return,
            }
        }
    }

    // Flush a trailing partial line (no terminating newline) before the
    // final coalescer flush.
    if let Some(line) = parser.take_remainder() {
        match forward_line(&line, &mut coalescer, &tx).await {
            LineOutcome::Continue => {}
            LineOutcome::Finished => return,
        }
    }

    if let Some(tokens) = coalescer.flush() {
        let _ = tx.send(OutputEvent::Tokens(tokens)).await;
    }
    debug!("Upstream LLM stream ended without sentinel");
}

enum LineOutcome {
    Continue,
    /// The stream is complete or the downstream client is gone.
    Finished,
}

async fn forward_line(
    line: &str,
    coalescer: &mut TokenCoalescer,
    tx: &mpsc::Sender<OutputEvent>,
) -> LineOutcome {
    match decode_line(line) {
        Some(DecodedEvent::Delta(content)) => {
            if let Some(tokens) = coalescer.push(&content) {
                if tx.send(OutputEvent::Tokens(tokens)).await.is_err() {
                    return LineOutcome::Finished;
                }
            }
        }
        Some(DecodedEvent::Malformed(raw)) => {
            // A single bad frame is recoverable; report it and keep going.
            warn!("Malformed upstream frame: {}", raw);
            if tx
                .send(OutputEvent::Error("Invalid response format".to_string()))
                .await
                .is_err()
            {
                return LineOutcome::Finished;
            }
        }
        Some(DecodedEvent::Done) => {
            // Trailing tokens flush before the terminal marker.
            if let Some(tokens) = coalescer.flush() {
                if tx.send(OutputEvent::Tokens(tokens)).await.is_err() {
                    return LineOutcome::Finished;
                }
            }
            let _ = tx.send(OutputEvent::Done).await;
            return LineOutcome::Finished;
        }
        None => {}
    }
    LineOutcome::Continue
}

/// Run a blocking (non-streaming) completion and return the parsed upstream
/// JSON body.
pub async fn complete(
    client: &reqwest::Client,
    url: &str,
    request: &ChatRequest,
) -> Result<Value, CompletionError> {
    let response = client
        .post(url)
        .json(request)
        .send()
        .await
        .map_err(|e| CompletionError::Transport(e.to_string()))?
        .error_for_status()
        .map_err(|e| CompletionError::Transport(e.to_string()))?;

    let body = response
        .text()
        .await
        .map_err(|e| CompletionError::Transport(e.to_string()))?;

    serde_json::from_str(&body).map_err(|_| CompletionError::InvalidBody)
}
