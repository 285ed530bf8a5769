//! OpenAI-compatible streaming chat client.
//!
//! Speaks the `/chat/completions` SSE protocol: the response body is a
//! sequence of `data: {json}` frames carrying token deltas, closed by a
//! `data: [DONE]` frame. Frames are parsed incrementally as body bytes
//! arrive, so tokens reach the caller with no buffering beyond line
//! framing.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use rag_types::GenerationSettings;

use crate::error::GenerationError;
use crate::generator::{Generator, TokenStream};

/// Configuration for the remote generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,
    /// Chat model (e.g., "gpt-4")
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// API key
    pub api_key: SecretString,
    /// Connect timeout; the body itself may stream for much longer
    pub connect_timeout: Duration,
}

impl GeneratorConfig {
    pub fn from_settings(
        settings: &GenerationSettings,
        base_url: impl Into<String>,
        api_key: SecretString,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            api_key,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Generator backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiGenerator {
    client: Client,
    config: GeneratorConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    stream: bool,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| GenerationError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn stream(&self, prompt: &str) -> Result<TokenStream, GenerationError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let request = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            stream: true,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        debug!(model = %self.config.model, "Generation stream opened");

        Ok(sse_token_stream(Box::pin(response.bytes_stream())))
    }
}

struct SseState<S> {
    bytes: S,
    buf: String,
    pending: VecDeque<String>,
    done: bool,
}

/// Turn a raw SSE byte stream into a token stream. The `[DONE]` frame
/// is the only clean ending; a body that ends without it (proxy closing
/// the connection) is a truncation and surfaces as a stream error.
fn sse_token_stream<S, B, E>(bytes: S) -> TokenStream
where
    S: futures::Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = SseState {
        bytes,
        buf: String::new(),
        pending: VecDeque::new(),
        done: false,
    };

    let stream = futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(token) = st.pending.pop_front() {
                return Some((Ok(token), st));
            }
            if st.done {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    st.buf.push_str(&String::from_utf8_lossy(chunk.as_ref()));
                    drain_frames(&mut st.buf, &mut st.pending, &mut st.done);
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(GenerationError::Stream(e.to_string())), st));
                }
                None => {
                    st.done = true;
                    return Some((Err(GenerationError::Stream(
                        "stream ended before the final frame".to_string(),
                    )), st));
                }
            }
        }
    });

    Box::pin(stream)
}

/// Pull complete `data:` frames out of the line buffer. Frames that do
/// not parse (comments, keep-alives) are skipped.
fn drain_frames(buf: &mut String, pending: &mut VecDeque<String>, done: &mut bool) {
    while let Some(pos) = buf.find('\n') {
        let line: String = buf.drain(..=pos).collect();
        let line = line.trim();
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            *done = true;
            continue;
        }
        match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) => {
                if let Some(token) = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                {
                    if !token.is_empty() {
                        pending.push_back(token);
                    }
                }
            }
            Err(e) => debug!(error = %e, "Skipping unparseable stream frame"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(content: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{content}\"}}}}]}}\n"
        )
    }

    #[test]
    fn test_drain_frames_in_order() {
        let mut buf = String::new();
        buf.push_str(&frame("Hej"));
        buf.push_str(&frame(" där"));
        let mut pending = VecDeque::new();
        let mut done = false;

        drain_frames(&mut buf, &mut pending, &mut done);

        assert_eq!(pending, VecDeque::from(["Hej".to_string(), " där".to_string()]));
        assert!(!done);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame_stays_buffered() {
        let mut buf = String::from("data: {\"choices\":[{\"delta\":{\"con");
        let mut pending = VecDeque::new();
        let mut done = false;

        drain_frames(&mut buf, &mut pending, &mut done);
        assert!(pending.is_empty());
        assert!(!buf.is_empty());

        buf.push_str("tent\":\"!\"}}]}\n");
        drain_frames(&mut buf, &mut pending, &mut done);
        assert_eq!(pending.pop_front().unwrap(), "!");
    }

    #[test]
    fn test_done_frame_ends_stream() {
        let mut buf = String::from("data: [DONE]\n");
        let mut pending = VecDeque::new();
        let mut done = false;

        drain_frames(&mut buf, &mut pending, &mut done);
        assert!(done);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_done_frame_closes_the_token_stream() {
        let body = format!("{}data: [DONE]\n", frame("Hej"));
        let chunks: Vec<Result<Vec<u8>, std::convert::Infallible>> = vec![Ok(body.into_bytes())];
        let mut stream = sse_token_stream(Box::pin(futures::stream::iter(chunks)));

        assert_eq!(stream.next().await.unwrap().unwrap(), "Hej");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_eof_without_done_is_a_stream_error() {
        let chunks: Vec<Result<Vec<u8>, std::convert::Infallible>> =
            vec![Ok(frame("Hej").into_bytes()), Ok(frame(" där").into_bytes())];
        let mut stream = sse_token_stream(Box::pin(futures::stream::iter(chunks)));

        assert_eq!(stream.next().await.unwrap().unwrap(), "Hej");
        assert_eq!(stream.next().await.unwrap().unwrap(), " där");
        assert!(matches!(
            stream.next().await.unwrap(),
            Err(GenerationError::Stream(_))
        ));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_garbage_and_empty_deltas_skipped() {
        let mut buf = String::new();
        buf.push_str(": keep-alive\n");
        buf.push_str("data: not json\n");
        buf.push_str("data: {\"choices\":[{\"delta\":{}}]}\n");
        buf.push_str(&frame("ok"));
        let mut pending = VecDeque::new();
        let mut done = false;

        drain_frames(&mut buf, &mut pending, &mut done);
        assert_eq!(pending, VecDeque::from(["ok".to_string()]));
    }
}
