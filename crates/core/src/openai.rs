//! OpenAI-compatible chat client with streaming support.
//!
//! The client speaks the `chat/completions` wire contract against any
//! OpenAI-compatible endpoint. It picks one of two request strategies per
//! call: vision-capable models receive the image directly as a data-URL
//! content part; text-only models get a prior extraction sub-call that
//! transcribes the question with a fixed vision model, and then reason over
//! the transcript.
//!
//! Streaming responses arrive as `data: `-prefixed event lines. Frames that
//! fail to parse are expected at chunk boundaries and skipped; the `[DONE]`
//! sentinel is a no-op — termination is driven by stream closure.

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models;
use futures::{Stream, StreamExt};
use log::debug;
use serde::{Deserialize, Serialize};

const MAX_TOKENS: u32 = 4096;

const ANSWER_SYSTEM_PROMPT: &str = "You are a professional question-solving assistant. \
Carefully analyze the question in the image and give a detailed solution.\n\n\
Requirements:\n\
1. First identify the question content and type\n\
2. List the solution approach and the key knowledge points\n\
3. Give detailed solution steps\n\
4. Summarize the final answer\n\n\
Present the solution in a clear format.";

const ANSWER_INSTRUCTION: &str = "Analyze this question and give a detailed solution.";

const EXTRACTION_INSTRUCTION: &str = "Transcribe all text in this image exactly, keeping \
the original formatting. Output only the transcribed text, with no extra commentary.";

/// Message roles of the chat wire contract.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message: plain text or a list of content parts.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
    pub detail: ImageDetail,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    High,
    Auto,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }
}

/// Embeds a base64 JPEG payload as a high-detail data-URL image part.
fn image_part(image_base64: &str) -> ContentPart {
    ContentPart::ImageUrl {
        image_url: ImageUrl {
            url: format!("data:image/jpeg;base64,{image_base64}"),
            detail: ImageDetail::High,
        },
    }
}

/// Request for a vision-capable model: the image goes along directly.
fn vision_messages(image_base64: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(ANSWER_SYSTEM_PROMPT),
        ChatMessage::user_parts(vec![
            image_part(image_base64),
            ContentPart::Text {
                text: ANSWER_INSTRUCTION.to_string(),
            },
        ]),
    ]
}

/// Request for a text-only model, built over the extracted question text.
fn reasoning_messages(question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(ANSWER_SYSTEM_PROMPT),
        ChatMessage::user_text(format!(
            "Please answer the following question:\n\n{question}"
        )),
    ]
}

/// Single-message transcription request for the extraction sub-call.
fn extraction_messages(image_base64: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user_parts(vec![
        image_part(image_base64),
        ContentPart::Text {
            text: EXTRACTION_INSTRUCTION.to_string(),
        },
    ])]
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

/// Client for an OpenAI-compatible inference endpoint.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Answers the question shown in the image.
    ///
    /// Vision-capable models receive the image directly. Text-only models
    /// trigger exactly one extraction sub-call first; its failure aborts the
    /// whole operation. When `on_partial` is supplied the outer request
    /// streams, and the callback receives the *cumulative* answer text after
    /// each delta, in arrival order.
    pub async fn answer_question(
        &self,
        image_base64: &str,
        model_id: &str,
        on_partial: Option<&mut (dyn FnMut(&str) + Send)>,
        cancel: &CancelToken,
    ) -> Result<String> {
        let messages = if models::supports_vision(model_id) {
            vision_messages(image_base64)
        } else {
            let question = self.extract_question(image_base64, cancel).await?;
            reasoning_messages(&question)
        };

        match on_partial {
            Some(on_partial) => self.stream_chat(&messages, model_id, on_partial, cancel).await,
            None => self.chat(&messages, model_id, cancel).await,
        }
    }

    /// Transcribes the question text from the image with the fixed
    /// extraction model. Non-streaming; blocks the outer call.
    pub async fn extract_question(
        &self,
        image_base64: &str,
        cancel: &CancelToken,
    ) -> Result<String> {
        let messages = extraction_messages(image_base64);
        self.chat(&messages, models::EXTRACTION_MODEL, cancel).await
    }

    /// Non-streaming chat completion. Returns the first choice's content,
    /// or an empty string if the response carries none.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
        cancel: &CancelToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let response = self.send_request(messages, model, false).await?;
        let parsed: ChatResponse = response.json().await?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    /// Streaming chat completion. Invokes `on_partial` with the cumulative
    /// text after every delta and returns the full answer once the stream
    /// closes.
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
        on_partial: &mut (dyn FnMut(&str) + Send),
        cancel: &CancelToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let response = self.send_request(messages, model, true).await?;
        let stream = response.bytes_stream().map(|chunk| chunk.map_err(AppError::from));
        consume_sse_stream(stream, on_partial, cancel).await
    }

    /// Probes the endpoint with a models listing. Returns true only on a
    /// 2xx response; every failure, transport errors included, is false.
    pub async fn test_connection(&self) -> bool {
        let request = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await;
        match request {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn send_request(
        &self,
        messages: &[ChatMessage],
        model: &str,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let body = ChatRequest {
            model,
            messages,
            max_tokens: MAX_TOKENS,
            stream: stream.then_some(true),
        };

        debug!("POST {}/chat/completions model={model} stream={stream}", self.base_url);
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::api(status.as_u16(), body));
        }
        Ok(response)
    }
}

/// Reassembles event lines from raw transport chunks and owns the growing
/// answer. The answer only ever grows; it is discarded with the accumulator
/// on failure.
struct StreamAccumulator {
    pending: Vec<u8>,
    content: String,
}

impl StreamAccumulator {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
            content: String::new(),
        }
    }

    /// Feeds one chunk; returns the newline-terminated lines it completed.
    /// Bytes after the last newline stay buffered, so frames split across
    /// chunk boundaries reassemble instead of being dropped.
    fn push_bytes(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let rest = self.pending.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.pending, rest);
            line.pop();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    fn append(&mut self, delta: &str) -> &str {
        self.content.push_str(delta);
        &self.content
    }

    fn into_content(self) -> String {
        self.content
    }
}

/// Extracts the delta text carried by one event line, if any.
///
/// Blank lines and lines without the `data: ` prefix are separators. The
/// `[DONE]` sentinel is a no-op. Payloads that fail to parse are skipped:
/// malformed frames are an expected artifact of chunked transport.
fn delta_from_line(line: &str) -> Option<String> {
    let payload = line.trim().strip_prefix("data: ")?;
    if payload == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk.choices.into_iter().next().and_then(|c| c.delta.content),
        Err(e) => {
            debug!("skipping unparseable stream frame: {e}");
            None
        }
    }
}

/// Drives an event stream to completion, growing the accumulator and
/// reporting the cumulative text after each delta.
///
/// A stream that closes without content yields an empty string, not an
/// error. Transport errors propagate; the token is checked at every chunk.
async fn consume_sse_stream<S, B>(
    mut stream: S,
    on_partial: &mut (dyn FnMut(&str) + Send),
    cancel: &CancelToken,
) -> Result<String>
where
    S: Stream<Item = Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    let mut accumulator = StreamAccumulator::new();
    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let chunk = chunk?;
        for line in accumulator.push_bytes(chunk.as_ref()) {
            if let Some(delta) = delta_from_line(&line) {
                on_partial(accumulator.append(&delta));
            }
        }
    }
    Ok(accumulator.into_content())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&str]) -> Vec<Result<Vec<u8>>> {
        parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect()
    }

    fn delta_frame(text: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{text}\"}},\"finish_reason\":null}}]}}\n\n"
        )
    }

    #[tokio::test]
    async fn reports_cumulative_text_in_arrival_order() {
        let input = chunks(&[&delta_frame("The answer"), &delta_frame(" is 42."), "data: [DONE]\n\n"]);
        let mut seen: Vec<String> = Vec::new();
        let mut on_partial = |text: &str| seen.push(text.to_string());

        let result = consume_sse_stream(stream::iter(input), &mut on_partial, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(result, "The answer is 42.");
        assert_eq!(seen, vec!["The answer", "The answer is 42."]);
        for pair in seen.windows(2) {
            assert!(pair[1].starts_with(&pair[0]));
            assert!(pair[1].len() >= pair[0].len());
        }
    }

    #[tokio::test]
    async fn done_only_stream_yields_empty_string() {
        let input = chunks(&["data: [DONE]\n\n"]);
        let mut calls = 0usize;
        let mut on_partial = |_: &str| calls += 1;

        let result = consume_sse_stream(stream::iter(input), &mut on_partial, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(result, "");
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn frame_split_across_chunks_is_reassembled() {
        let frame = delta_frame("split across the wire");
        let (head, tail) = frame.split_at(25);
        let input = chunks(&[head, tail]);
        let mut on_partial = |_: &str| {};

        let result = consume_sse_stream(stream::iter(input), &mut on_partial, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(result, "split across the wire");
    }

    #[tokio::test]
    async fn malformed_frames_and_foreign_lines_are_skipped() {
        let input = chunks(&[
            ": keep-alive\n",
            "event: ping\n",
            "data: {truncated\n",
            &delta_frame("ok"),
        ]);
        let mut on_partial = |_: &str| {};

        let result = consume_sse_stream(stream::iter(input), &mut on_partial, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(result, "ok");
    }

    #[tokio::test]
    async fn cancelled_token_aborts_the_read_loop() {
        let input = chunks(&[&delta_frame("never seen")]);
        let token = CancelToken::new();
        token.cancel();
        let mut on_partial = |_: &str| {};

        let result = consume_sse_stream(stream::iter(input), &mut on_partial, &token).await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[test]
    fn vision_request_carries_image_and_system_prompt() {
        let messages = vision_messages("QUJD");
        let json = serde_json::to_value(&messages).unwrap();

        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[1]["role"], "user");
        assert_eq!(json[1]["content"][0]["type"], "image_url");
        let url = json[1]["content"][0]["image_url"]["url"].as_str().unwrap();
        assert_eq!(url, "data:image/jpeg;base64,QUJD");
        assert_eq!(json[1]["content"][0]["image_url"]["detail"], "high");
        assert_eq!(json[1]["content"][1]["type"], "text");
    }

    #[test]
    fn reasoning_request_is_text_only() {
        let messages = reasoning_messages("What is 2 + 2?");
        let json = serde_json::to_value(&messages).unwrap();

        assert_eq!(json.as_array().unwrap().len(), 2);
        let user_content = json[1]["content"].as_str().unwrap();
        assert!(user_content.contains("What is 2 + 2?"));
        assert!(!serde_json::to_string(&messages).unwrap().contains("image_url"));
    }

    #[test]
    fn extraction_request_is_a_single_user_message() {
        let messages = extraction_messages("QUJD");
        assert_eq!(messages.len(), 1);
        let json = serde_json::to_value(&messages).unwrap();
        assert_eq!(json[0]["role"], "user");
        assert_eq!(json[0]["content"][0]["type"], "image_url");
    }

    #[test]
    fn request_body_matches_the_wire_contract() {
        let messages = reasoning_messages("q");
        let body = ChatRequest {
            model: "o1",
            messages: &messages,
            max_tokens: MAX_TOKENS,
            stream: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "o1");
        assert_eq!(json["max_tokens"], 4096);
        assert!(json.get("stream").is_none());

        let body = ChatRequest {
            model: "o1",
            messages: &messages,
            max_tokens: MAX_TOKENS,
            stream: Some(true),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn stream_chunk_parses_delta_content() {
        let delta = delta_from_line(delta_frame("hi").trim_end());
        assert_eq!(delta.as_deref(), Some("hi"));
        assert_eq!(delta_from_line("data: [DONE]"), None);
        assert_eq!(delta_from_line(""), None);
        assert_eq!(
            delta_from_line("data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}"),
            None
        );
    }
}
