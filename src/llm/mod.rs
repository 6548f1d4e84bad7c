//! Streaming proxy to the upstream LLM chat-completions endpoint.
//!
//! The proxy forwards a chat request upstream, incrementally parses the SSE
//! token stream, re-buffers tokens to reduce frontend chattiness, and re-emits
//! a normalized `data:` frame stream to the original caller. All state is
//! scoped to one downstream call; nothing survives across requests.

pub mod coalesce;
pub mod proxy;
pub mod sse;

pub use coalesce::TokenCoalescer;
pub use proxy::{
    build_chat_request, complete, stream_completion, ChatRequest, CompletionError, OutputEvent,
    SubmitLlmRequest,
};
pub use sse::{decode_line, DecodedEvent, LineParser};
