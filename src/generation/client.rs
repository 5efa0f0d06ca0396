//! Gemini generation client
//!
//! Streaming uses `streamGenerateContent?alt=sse`. The response body is parsed
//! lazily as the consumer polls; no task is spawned, so dropping the returned
//! [`GenerationStream`] drops the HTTP response and closes the connection.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::{GenerateContentRequest, GenerateContentResponse};
use crate::config::GoogleConfig;
use crate::core::{GenerationOptions, GenerationProvider, GenerationStream, Prompt};
use crate::error::{Error, Result};
use crate::gemini;

/// Gemini API client for text generation
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
    options: GenerationOptions,
}

impl GeminiClient {
    /// Create a new client; fails fast when the API key is absent
    pub fn new(config: &GoogleConfig) -> Result<Self> {
        Ok(GeminiClient {
            client: gemini::http_client(config)?,
            base_url: config.base_url.clone(),
            model: config.generation_model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            options: GenerationOptions::default(),
        })
    }

    /// Sampling options sent with every request
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    async fn send(
        &self,
        method: &str,
        prompt: &Prompt,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let url = gemini::endpoint(&self.base_url, &self.model, method);
        let body = GenerateContentRequest::new(prompt, &self.options);

        debug!(model = %self.model, turns = prompt.turns.len(), "Sending generation request");

        let mut request = self.client.post(&url).json(&body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::generation_unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, "Generation request rejected");
            return Err(gemini::status_error("generation", status, &text));
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationProvider for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let response = self.send("generateContent", prompt, Some(self.timeout)).await?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::generation_unavailable(e.to_string()))?;

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedResponse(format!("generation payload: {}", e)))?;

        if let Some(err) = parsed.error {
            return Err(Error::generation_unavailable(err.message));
        }
        if parsed.candidates.is_empty() {
            let reason = parsed.block_reason().unwrap_or("no candidates returned");
            return Err(Error::MalformedResponse(format!("empty generation: {}", reason)));
        }
        if let Some(reason) = parsed.stopped_early() {
            warn!(model = %self.model, reason, "Generation stopped early");
            return Err(stopped_early(reason));
        }
        if parsed.finish_reason() == Some("MAX_TOKENS") {
            warn!(model = %self.model, "Generation hit the output token limit");
        }

        let text = parsed.text();
        info!(model = %self.model, chars = text.len(), "Generation complete");
        Ok(text)
    }

    async fn stream(&self, prompt: &Prompt) -> Result<GenerationStream> {
        let response = self
            .send("streamGenerateContent?alt=sse", prompt, None)
            .await?;
        Ok(sse_fragments(response.bytes_stream()))
    }
}

/// Largest incomplete SSE event held in memory before the stream is rejected
const MAX_EVENT_BYTES: usize = 1024 * 1024;

fn stopped_early(reason: &str) -> Error {
    Error::generation_unavailable(format!("generation stopped early: {}", reason))
}

type ByteStream<B> = Pin<Box<dyn Stream<Item = reqwest::Result<B>> + Send>>;

struct SseState<B> {
    body: ByteStream<B>,
    buffer: Vec<u8>,
    scanned: usize,
    pending: VecDeque<Result<String>>,
    done: bool,
}

/// Turn an SSE byte stream into text fragments.
///
/// Bytes are buffered until a full event is available, so multi-byte
/// characters split across chunks are decoded intact.
fn sse_fragments<S, B>(body: S) -> GenerationStream
where
    S: Stream<Item = reqwest::Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        buffer: Vec::new(),
        scanned: 0,
        pending: VecDeque::new(),
        done: false,
    };

    GenerationStream::new(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(chunk.as_ref());
                    while let Some(event) = take_event(&mut state.buffer, &mut state.scanned) {
                        state.pending.extend(parse_event(&event));
                    }
                    if state.buffer.len() > MAX_EVENT_BYTES {
                        state.done = true;
                        state.pending.push_back(Err(Error::MalformedResponse(format!(
                            "stream event exceeds {} bytes",
                            MAX_EVENT_BYTES
                        ))));
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    state.pending.push_back(Err(Error::generation_unavailable(
                        format!("stream interrupted: {}", e),
                    )));
                }
                None => {
                    state.done = true;
                    let rest = std::mem::take(&mut state.buffer);
                    state.pending.extend(parse_event(&rest));
                }
            }
        }
    }))
}

/// Split the first complete event (terminated by a blank line) off the buffer.
///
/// `scanned` is how much of the buffer is known to hold no separator, so each
/// chunk only searches the bytes it added.
fn take_event(buffer: &mut Vec<u8>, scanned: &mut usize) -> Option<Vec<u8>> {
    let start = scanned.saturating_sub(3);
    let window = &buffer[start..];
    let lf = find(window, b"\n\n").map(|i| (start + i, 2));
    let crlf = find(window, b"\r\n\r\n").map(|i| (start + i, 4));
    let (end, sep) = match (lf, crlf) {
        (Some(a), Some(b)) => {
            if a.0 <= b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => {
            *scanned = buffer.len();
            return None;
        }
    };

    let event = buffer[..end].to_vec();
    buffer.drain(..end + sep);
    *scanned = 0;
    Some(event)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Decode one event into stream items.
///
/// Keep-alives, comments and frames without text yield nothing. A frame that
/// ends the answer early yields its text, then a terminal error.
fn parse_event(event: &[u8]) -> Vec<Result<String>> {
    let event = match std::str::from_utf8(event) {
        Ok(s) => s,
        Err(e) => {
            return vec![Err(Error::MalformedResponse(format!(
                "invalid UTF-8 in stream: {}",
                e
            )))]
        }
    };

    let data: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect();
    if data.is_empty() {
        return Vec::new();
    }
    let data = data.join("\n");
    if data.trim() == "[DONE]" {
        return Vec::new();
    }

    let frame: GenerateContentResponse = match serde_json::from_str(&data) {
        Ok(frame) => frame,
        Err(e) => return vec![Err(Error::MalformedResponse(format!("stream frame: {}", e)))],
    };

    if let Some(err) = frame.error {
        return vec![Err(Error::generation_unavailable(err.message))];
    }
    if let Some(reason) = frame.block_reason() {
        return vec![Err(Error::MalformedResponse(format!("response blocked: {}", reason)))];
    }

    let mut items = Vec::new();
    let text = frame.text();
    if !text.is_empty() {
        items.push(Ok(text));
    }
    if let Some(reason) = frame.stopped_early() {
        warn!(reason, "Generation stream stopped early");
        items.push(Err(stopped_early(reason)));
    } else if frame.finish_reason() == Some("MAX_TOKENS") {
        warn!("Generation stream hit the output token limit");
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Generated, Message};
    use secrecy::SecretString;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> GoogleConfig {
        GoogleConfig {
            api_key: SecretString::from("test-key".to_string()),
            base_url: base_url.to_string(),
            ..GoogleConfig::default()
        }
    }

    fn prompt() -> Prompt {
        Prompt {
            system: "Answer from reviews.".into(),
            turns: vec![Message::user("Who teaches algorithms best?")],
        }
    }

    fn frame(text: &str) -> String {
        format!(
            "data: {}\r\n\r\n",
            serde_json::json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
        )
    }

    fn chunks(parts: Vec<Vec<u8>>) -> impl Stream<Item = reqwest::Result<Vec<u8>>> + Send {
        futures::stream::iter(parts.into_iter().map(Ok))
    }

    #[tokio::test]
    async fn test_complete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "systemInstruction": {"parts": [{"text": "Answer from reviews."}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Dr. Smith."}]}}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        match client.generate(&prompt(), false).await.unwrap() {
            Generated::Text(text) => assert_eq!(text, "Dr. Smith."),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        assert!(matches!(
            client.complete(&prompt()).await,
            Err(Error::UpstreamUnavailable { service: "generation", .. })
        ));
        assert!(matches!(
            client.stream(&prompt()).await,
            Err(Error::UpstreamUnavailable { service: "generation", .. })
        ));
    }

    #[tokio::test]
    async fn test_stream_reassembles_fragments() {
        let server = MockServer::start().await;
        let body = [frame("Hi"), frame(" there"), frame("!")].concat();
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        let stream = client.stream(&prompt()).await.unwrap();
        let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;
        assert_eq!(fragments, vec!["Hi", " there", "!"]);
    }

    #[tokio::test]
    async fn test_stream_error_frame_is_terminal() {
        let server = MockServer::start().await;
        let body = format!(
            "{}data: {}\n\n{}",
            frame("Partial"),
            serde_json::json!({"error": {"code": 503, "message": "overloaded"}}),
            frame("never seen"),
        );
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        let mut stream = client.stream(&prompt()).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "Partial");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("overloaded"));
        assert!(stream.next().await.is_none());
        assert!(stream.is_closed());
    }

    #[tokio::test]
    async fn test_split_multibyte_character() {
        let event = frame("Müller");
        let bytes = event.into_bytes();
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let (head, tail) = bytes.split_at(split);

        let text = sse_fragments(chunks(vec![head.to_vec(), tail.to_vec()]))
            .collect_text()
            .await
            .unwrap();
        assert_eq!(text, "Müller");
    }

    #[tokio::test]
    async fn test_unparsable_frame_is_malformed() {
        let stream = sse_fragments(chunks(vec![b"data: {not json}\n\n".to_vec()]));
        let items: Vec<Result<String>> = stream.collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_complete_stopped_early_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Dr. Smith is"}]},
                    "finishReason": "RECITATION"
                }]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        let err = client.complete(&prompt()).await.unwrap_err();
        assert!(err.to_string().contains("RECITATION"));
    }

    #[tokio::test]
    async fn test_stream_safety_stop_is_terminal_error() {
        let stop = format!(
            "data: {}\n\n",
            serde_json::json!({"candidates": [{"finishReason": "SAFETY"}]})
        );
        let mut stream = sse_fragments(chunks(vec![
            frame("Dr. Smith is").into_bytes(),
            stop.into_bytes(),
        ]));

        assert_eq!(stream.next().await.unwrap().unwrap(), "Dr. Smith is");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_safety_stop_fails_collected_text() {
        let stop = format!(
            "data: {}\n\n",
            serde_json::json!({"candidates": [{
                "content": {"parts": [{"text": " great"}]},
                "finishReason": "OTHER"
            }]})
        );
        let result = sse_fragments(chunks(vec![
            frame("Dr. Smith is").into_bytes(),
            stop.into_bytes(),
        ]))
        .collect_text()
        .await;
        assert!(matches!(result, Err(Error::UpstreamUnavailable { service: "generation", .. })));
    }

    #[tokio::test]
    async fn test_stream_max_tokens_ends_cleanly() {
        let last = format!(
            "data: {}\n\n",
            serde_json::json!({"candidates": [{
                "content": {"parts": [{"text": " lectures"}]},
                "finishReason": "MAX_TOKENS"
            }]})
        );
        let text = sse_fragments(chunks(vec![frame("Clear").into_bytes(), last.into_bytes()]))
            .collect_text()
            .await
            .unwrap();
        assert_eq!(text, "Clear lectures");
    }

    #[tokio::test]
    async fn test_oversized_event_is_malformed() {
        let open = b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"".to_vec();
        let filler = vec![b'x'; MAX_EVENT_BYTES];
        let items: Vec<Result<String>> = sse_fragments(chunks(vec![open, filler]))
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::MalformedResponse(ref m)) if m.contains("exceeds")));
    }

    #[test]
    fn test_take_event_across_chunks() {
        let mut buffer = b"data: a\r\n".to_vec();
        let mut scanned = 0;
        assert!(take_event(&mut buffer, &mut scanned).is_none());
        assert_eq!(scanned, buffer.len());

        buffer.extend_from_slice(b"\r\ndata: b\n\n");
        assert_eq!(take_event(&mut buffer, &mut scanned).unwrap(), b"data: a");
        assert_eq!(scanned, 0);
        assert_eq!(take_event(&mut buffer, &mut scanned).unwrap(), b"data: b");
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_trailing_event_without_blank_line() {
        let stream = sse_fragments(chunks(vec![
            b": keep-alive\n\n".to_vec(),
            br#"data: {"candidates":[{"content":{"parts":[{"text":"end"}]}}]}"#.to_vec(),
        ]));
        assert_eq!(stream.collect_text().await.unwrap(), "end");
    }
}
